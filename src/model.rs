//! Data-access seam the route handlers dispatch over.
//!
//! A [`Model`] wraps one resource (one table, in the Postgres implementation)
//! and exposes the capability set the handlers need. Mutating calls take the
//! transaction handle explicitly so they participate in the request's unit of
//! work; reads run outside it. Failures surface as `Err`, never return codes.

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Attribute bag for insert/update: column name to JSON value.
pub type Attrs = Map<String, Value>;

#[async_trait]
pub trait Model: Send + Sync {
    /// Transaction handle; owned by one request dispatch, never reused after
    /// commit or rollback.
    type Tx: Send;

    /// Name of the primary-key column, for existence filters.
    fn pk_column(&self) -> &str;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), AppError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), AppError>;

    /// All rows, in whatever order the backing store yields them.
    async fn fetch_all(&self) -> Result<Vec<Value>, AppError>;

    /// One row by primary key, or None.
    async fn fetch_by_id(&self, id: &Value) -> Result<Option<Value>, AppError>;

    /// Count of rows where `column = value`.
    async fn count_where(&self, column: &str, value: &Value) -> Result<u64, AppError>;

    /// Insert a new row from `attrs`; returns the saved row.
    async fn insert(&self, attrs: &Attrs, tx: &mut Self::Tx) -> Result<Value, AppError>;

    /// Apply `attrs` to the row with the given id; columns absent from
    /// `attrs` are left unchanged. Returns the updated row.
    async fn update(&self, id: &Value, attrs: &Attrs, tx: &mut Self::Tx)
        -> Result<Value, AppError>;

    /// Delete the row with the given id.
    async fn delete(&self, id: &Value, tx: &mut Self::Tx) -> Result<(), AppError>;
}

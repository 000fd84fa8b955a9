//! PostgreSQL-backed [`Model`] over one introspected table.

use crate::error::AppError;
use crate::model::{Attrs, Model};
use crate::schema::Table;
use crate::sql::{self, PgValue, Query};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// One instance per request, addressing a single table.
pub struct TableModel {
    pool: PgPool,
    table: Arc<Table>,
}

impl TableModel {
    pub fn new(pool: PgPool, table: Arc<Table>) -> Self {
        TableModel { pool, table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    async fn fetch_all_rows(&self, q: &Query) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgValue::from(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn fetch_optional_row(&self, q: &Query) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgValue::from(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(decode_row))
    }

    async fn returning_one_tx(
        &self,
        q: &Query,
        conn: &mut PgConnection,
    ) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgValue::from(p));
        }
        let row = query.fetch_optional(&mut *conn).await?;
        Ok(row.as_ref().map(decode_row))
    }
}

#[async_trait]
impl Model for TableModel {
    type Tx = Transaction<'static, Postgres>;

    fn pk_column(&self) -> &str {
        &self.table.pk_column
    }

    async fn begin(&self) -> Result<Self::Tx, AppError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), AppError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), AppError> {
        Ok(tx.rollback().await?)
    }

    async fn fetch_all(&self) -> Result<Vec<Value>, AppError> {
        let q = sql::select_all(&self.table);
        self.fetch_all_rows(&q).await
    }

    async fn fetch_by_id(&self, id: &Value) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(&self.table, id);
        self.fetch_optional_row(&q).await
    }

    async fn count_where(&self, column: &str, value: &Value) -> Result<u64, AppError> {
        let q = sql::count_by(&self.table, column, value);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgValue::from(p));
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn insert(&self, attrs: &Attrs, tx: &mut Self::Tx) -> Result<Value, AppError> {
        let q = sql::insert(&self.table, attrs);
        self.returning_one_tx(&q, &mut *tx)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, id: &Value, attrs: &Attrs, tx: &mut Self::Tx) -> Result<Value, AppError> {
        let q = sql::update(&self.table, id, attrs);
        self.returning_one_tx(&q, &mut *tx)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn delete(&self, id: &Value, tx: &mut Self::Tx) -> Result<(), AppError> {
        let q = sql::delete(&self.table, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgValue::from(p));
        }
        query.execute(&mut **tx).await?;
        Ok(())
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), decode_cell(row, name));
    }
    Value::Object(map)
}

fn decode_cell(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

//! Shared application state for all routes.

use crate::schema::Schema;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Introspected once at startup; restart to pick up schema changes.
    pub schema: Arc<Schema>,
    /// Prefix for Location URLs on created resources (e.g. "/api").
    pub base_url: String,
}

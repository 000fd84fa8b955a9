//! Demo server: introspects the database pointed to by DATABASE_URL and
//! serves generic CRUD routes for every table under /api.

use axum::Router;
use restable::{common_routes, introspect, resource_routes, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("restable=info".parse()?))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/restable".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let db_schema = std::env::var("DB_SCHEMA").unwrap_or_else(|_| "public".into());
    let schema = introspect(&pool, &db_schema).await?;
    for table in &schema.tables {
        tracing::info!(table = %table.name, pk = %table.pk_column, "serving");
    }

    let state = AppState {
        pool,
        schema: Arc::new(schema),
        base_url: "/api".into(),
    };

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", resource_routes(state))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

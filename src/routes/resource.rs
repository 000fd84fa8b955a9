//! Generic resource routes over the introspected schema.
//!
//! Uses parameterized paths so one route set serves every table; each
//! request resolves its table by path segment, builds the matching
//! [`RouteHandler`], and runs the dispatch lifecycle.

use crate::error::{AppError, SchemaError};
use crate::handler::{HandlerKind, RouteHandler, UrlFor};
use crate::model::Attrs;
use crate::pg::TableModel;
use crate::reply::Reply;
use crate::schema::{PkType, Table};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(index).post(create))
        .route(
            "/:table/:id",
            get(show).patch(update).delete(destroy),
        )
        .route("/:table/:id/exists", get(exists))
        .with_state(state)
}

fn handler_for(
    state: &AppState,
    path_segment: &str,
    kind: HandlerKind,
) -> Result<(RouteHandler<TableModel>, Arc<Table>), AppError> {
    let table = state
        .schema
        .table_by_path(path_segment)
        .ok_or_else(|| SchemaError::UnknownTable(path_segment.to_string()))?;
    let table = Arc::new(table.clone());
    let url_for = url_builder(state, &table);
    let handler = RouteHandler::new(
        kind,
        TableModel::new(state.pool.clone(), table.clone()),
        url_for,
    );
    Ok((handler, table))
}

/// Location-URL builder for created resources: `{base}/{path}/{pk}`.
fn url_builder(state: &AppState, table: &Arc<Table>) -> UrlFor {
    let prefix = format!(
        "{}/{}",
        state.base_url.trim_end_matches('/'),
        table.path_segment
    );
    let pk = table.pk_column.clone();
    Arc::new(move |row: &Value| match &row[pk.as_str()] {
        Value::String(s) => format!("{}/{}", prefix, s),
        other => format!("{}/{}", prefix, other),
    })
}

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str)
                .map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str
                .parse()
                .map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

fn body_to_attrs(value: Value) -> Result<Attrs, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn id_params(table: &Table, id_str: &str) -> Result<Attrs, AppError> {
    let id = parse_id(id_str, &table.pk_type)?;
    let mut params = Attrs::new();
    params.insert("id".into(), id);
    Ok(params)
}

async fn index(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Reply, AppError> {
    let (handler, _) = handler_for(&state, &table, HandlerKind::Index)?;
    handler.run(Attrs::new()).await
}

async fn create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<Reply, AppError> {
    let (handler, _) = handler_for(&state, &table, HandlerKind::Create)?;
    handler.run(body_to_attrs(body)?).await
}

async fn show(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Reply, AppError> {
    let (handler, table) = handler_for(&state, &table, HandlerKind::Show)?;
    let params = id_params(&table, &id)?;
    handler.run(params).await
}

async fn update(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Reply, AppError> {
    let (handler, table) = handler_for(&state, &table, HandlerKind::Update)?;
    let mut params = body_to_attrs(body)?;
    // The path id wins; a payload id is stripped again in the handler.
    params.append(&mut id_params(&table, &id)?);
    handler.run(params).await
}

async fn destroy(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Reply, AppError> {
    let (handler, table) = handler_for(&state, &table, HandlerKind::Destroy)?;
    let params = id_params(&table, &id)?;
    handler.run(params).await
}

async fn exists(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Reply, AppError> {
    let (handler, table) = handler_for(&state, &table, HandlerKind::Exists)?;
    let params = id_params(&table, &id)?;
    handler.run(params).await
}

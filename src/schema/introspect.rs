//! Build the runtime schema from information_schema.

use crate::error::SchemaError;
use crate::schema::types::{infer_pk_type, Column, Schema, Table};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

const TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT table_name, column_name, data_type, udt_name, is_nullable, column_default \
     FROM information_schema.columns WHERE table_schema = $1 ORDER BY table_name, ordinal_position";

const PK_SQL: &str = "SELECT kcu.table_name, kcu.column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
     WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY' \
     ORDER BY kcu.table_name, kcu.ordinal_position";

/// Introspect all base tables in `schema_name` into a routable [`Schema`].
///
/// Tables without exactly one primary-key column are skipped with a warning;
/// the generic handlers address rows by a single pk.
pub async fn introspect(pool: &PgPool, schema_name: &str) -> Result<Schema, SchemaError> {
    let table_names = load_table_names(pool, schema_name).await?;
    let pk_by_table = load_primary_keys(pool, schema_name).await?;
    let columns_by_table = load_columns(pool, schema_name).await?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let pk_cols = pk_by_table.get(&name).map(Vec::as_slice).unwrap_or(&[]);
        let [pk_column] = pk_cols else {
            tracing::warn!(table = %name, pk_columns = pk_cols.len(), "skipping table without a single-column primary key");
            continue;
        };
        let raw_columns = columns_by_table.get(&name).map(Vec::as_slice).unwrap_or(&[]);
        let pk_raw = raw_columns
            .iter()
            .find(|c| c.name == *pk_column)
            .ok_or_else(|| SchemaError::NoPrimaryKey { table: name.clone() })?;
        let pk_type = infer_pk_type(&pk_raw.data_type);

        let columns = raw_columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                nullable: c.nullable,
                has_default: c.has_default,
                cast: cast_type(schema_name, &c.data_type, &c.udt_name),
                is_pk: c.name == *pk_column,
            })
            .collect();

        tables.push(Table {
            schema_name: schema_name.to_string(),
            path_segment: name.clone(),
            name,
            pk_column: pk_column.clone(),
            pk_type,
            columns,
        });
    }

    tracing::info!(tables = tables.len(), schema = %schema_name, "schema introspected");
    Ok(Schema::new(tables))
}

struct RawColumn {
    name: String,
    data_type: String,
    udt_name: String,
    nullable: bool,
    has_default: bool,
}

async fn load_table_names(pool: &PgPool, schema_name: &str) -> Result<Vec<String>, SchemaError> {
    tracing::debug!(sql = TABLES_SQL, "query");
    sqlx::query_scalar::<_, String>(TABLES_SQL)
        .bind(schema_name)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::Introspect(e.to_string()))
}

async fn load_columns(
    pool: &PgPool,
    schema_name: &str,
) -> Result<HashMap<String, Vec<RawColumn>>, SchemaError> {
    tracing::debug!(sql = COLUMNS_SQL, "query");
    let rows = sqlx::query(COLUMNS_SQL)
        .bind(schema_name)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::Introspect(e.to_string()))?;

    let mut out: HashMap<String, Vec<RawColumn>> = HashMap::new();
    for row in rows {
        let table: String = row
            .try_get("table_name")
            .map_err(|e| SchemaError::Introspect(e.to_string()))?;
        let nullable: String = row
            .try_get("is_nullable")
            .map_err(|e| SchemaError::Introspect(e.to_string()))?;
        let default: Option<String> = row
            .try_get("column_default")
            .map_err(|e| SchemaError::Introspect(e.to_string()))?;
        let column = RawColumn {
            name: row
                .try_get("column_name")
                .map_err(|e| SchemaError::Introspect(e.to_string()))?,
            data_type: row
                .try_get("data_type")
                .map_err(|e| SchemaError::Introspect(e.to_string()))?,
            udt_name: row
                .try_get("udt_name")
                .map_err(|e| SchemaError::Introspect(e.to_string()))?,
            nullable: nullable == "YES",
            has_default: default.is_some(),
        };
        out.entry(table).or_default().push(column);
    }
    Ok(out)
}

async fn load_primary_keys(
    pool: &PgPool,
    schema_name: &str,
) -> Result<HashMap<String, Vec<String>>, SchemaError> {
    tracing::debug!(sql = PK_SQL, "query");
    let rows = sqlx::query(PK_SQL)
        .bind(schema_name)
        .fetch_all(pool)
        .await
        .map_err(|e| SchemaError::Introspect(e.to_string()))?;

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let table: String = row
            .try_get("table_name")
            .map_err(|e| SchemaError::Introspect(e.to_string()))?;
        let column: String = row
            .try_get("column_name")
            .map_err(|e| SchemaError::Introspect(e.to_string()))?;
        out.entry(table).or_default().push(column);
    }
    Ok(out)
}

/// SQL cast for placeholders so string-typed JSON values bind correctly.
fn cast_type(schema_name: &str, data_type: &str, udt_name: &str) -> Option<String> {
    let lower = data_type.to_lowercase();
    if lower == "timestamp with time zone" {
        Some("timestamptz".into())
    } else if lower.starts_with("timestamp") {
        Some("timestamp".into())
    } else if lower == "date" {
        Some("date".into())
    } else if lower.contains("uuid") {
        Some("uuid".into())
    } else if lower == "numeric" {
        Some("numeric".into())
    } else if lower == "user-defined" {
        // Schema-qualified custom type (e.g. an enum); cast so text binds.
        Some(format!("{}.{}", schema_name, udt_name))
    } else {
        None
    }
}

//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from an
//! introspected table.

use crate::model::Attrs;
use crate::schema::Table;
use serde_json::Value;

/// SQL text plus the values to bind, in placeholder order.
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    fn new() -> Self {
        Query {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Quote identifier for PostgreSQL (safe: names come from introspection).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(table: &Table) -> String {
    format!("{}.{}", quoted(&table.schema_name), quoted(&table.name))
}

/// Placeholder with the column's cast when it needs one (e.g. `$1::uuid`).
fn placeholder(table: &Table, column: &str, n: usize) -> String {
    table
        .column(column)
        .and_then(|c| c.cast.as_deref())
        .map(|t| format!("${}::{}", n, t))
        .unwrap_or_else(|| format!("${}", n))
}

/// SELECT list: custom-typed and numeric columns cast to text so sqlx can
/// hand them back as strings.
fn select_columns(table: &Table) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            match c.cast.as_deref() {
                Some(t) if t.contains('.') || t == "numeric" => format!("{}::text", q),
                _ => q,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT all rows, pk order.
pub fn select_all(table: &Table) -> Query {
    let mut q = Query::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        select_columns(table),
        qualified(table),
        quoted(&table.pk_column)
    );
    q
}

/// SELECT one row by primary key.
pub fn select_by_id(table: &Table, id: &Value) -> Query {
    let mut q = Query::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_columns(table),
        qualified(table),
        quoted(&table.pk_column),
        placeholder(table, &table.pk_column, n)
    );
    q
}

/// COUNT rows where `column = value`.
pub fn count_by(table: &Table, column: &str, value: &Value) -> Query {
    let mut q = Query::new();
    let n = q.push_param(value.clone());
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = {}",
        qualified(table),
        quoted(column),
        placeholder(table, column, n)
    );
    q
}

/// INSERT from `attrs`, RETURNING the saved row.
///
/// The pk is written only when `attrs` provides it; columns with a DB
/// default are omitted when absent so the default applies.
pub fn insert(table: &Table, attrs: &Attrs) -> Query {
    let mut q = Query::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let val = attrs.get(&c.name).cloned();
        if val.is_none() && (c.is_pk || c.has_default) {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(table, &c.name, n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified(table),
        cols.join(", "),
        placeholders.join(", "),
        select_columns(table)
    );
    q
}

/// UPDATE by id: SET only columns present in `attrs` (pk never written),
/// RETURNING the merged row. With nothing to set, falls back to a SELECT so
/// the caller still gets the current row.
pub fn update(table: &Table, id: &Value, attrs: &Attrs) -> Query {
    let mut q = Query::new();
    let mut sets = Vec::new();
    for c in &table.columns {
        if c.is_pk {
            continue;
        }
        let Some(v) = attrs.get(&c.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), placeholder(table, &c.name, n)));
    }
    if sets.is_empty() {
        return select_by_id(table, id);
    }
    if table.has_column("updated_at") && !attrs.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let n = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified(table),
        sets.join(", "),
        quoted(&table.pk_column),
        placeholder(table, &table.pk_column, n),
        select_columns(table)
    );
    q
}

/// DELETE by primary key.
pub fn delete(table: &Table, id: &Value) -> Query {
    let mut q = Query::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified(table),
        quoted(&table.pk_column),
        placeholder(table, &table.pk_column, n)
    );
    q
}

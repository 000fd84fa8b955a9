//! Schema model flattened for runtime use.

use std::collections::HashMap;

/// Primary key type, for parsing path ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding
    /// string values; None when the bare placeholder binds correctly.
    pub cast: Option<String>,
    pub is_pk: bool,
}

#[derive(Clone, Debug)]
pub struct Table {
    pub schema_name: String,
    pub name: String,
    /// URL path segment the table is served under (the table name).
    pub path_segment: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    table_by_path: HashMap<String, usize>,
}

impl Schema {
    pub fn new(tables: Vec<Table>) -> Self {
        let table_by_path = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.path_segment.clone(), i))
            .collect();
        Schema {
            tables,
            table_by_path,
        }
    }

    pub fn table_by_path(&self, path: &str) -> Option<&Table> {
        self.table_by_path.get(path).map(|&i| &self.tables[i])
    }
}

/// Infer the pk wire type from an information_schema data type.
pub(crate) fn infer_pk_type(data_type: &str) -> PkType {
    let lower = data_type.to_lowercase();
    if lower.contains("uuid") {
        PkType::Uuid
    } else if lower.contains("bigint") {
        PkType::BigInt
    } else if lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        Table {
            schema_name: "public".into(),
            name: name.into(),
            path_segment: name.into(),
            pk_column: "id".into(),
            pk_type: PkType::BigInt,
            columns: vec![Column {
                name: "id".into(),
                nullable: false,
                has_default: true,
                cast: None,
                is_pk: true,
            }],
        }
    }

    #[test]
    fn lookup_by_path_segment() {
        let schema = Schema::new(vec![table("users"), table("orders")]);
        assert_eq!(schema.table_by_path("orders").unwrap().name, "orders");
        assert!(schema.table_by_path("missing").is_none());
    }

    #[test]
    fn pk_type_inference() {
        assert_eq!(infer_pk_type("uuid"), PkType::Uuid);
        assert_eq!(infer_pk_type("bigint"), PkType::BigInt);
        assert_eq!(infer_pk_type("integer"), PkType::Int);
        assert_eq!(infer_pk_type("smallint"), PkType::Int);
        assert_eq!(infer_pk_type("character varying"), PkType::Text);
    }
}

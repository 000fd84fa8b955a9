//! Introspected database schema: tables, columns, primary keys.

mod introspect;
mod types;

pub use introspect::introspect;
pub use types::{Column, PkType, Schema, Table};

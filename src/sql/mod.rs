//! Parameterized SQL building and value binding for the table model.

mod bind;
mod builder;

pub use bind::PgValue;
pub use builder::{count_by, delete, insert, select_all, select_by_id, update, Query};

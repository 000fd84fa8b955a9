//! Restable: schema-driven REST backend library.

pub mod error;
pub mod handler;
pub mod model;
pub mod pg;
pub mod reply;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;

pub use error::{AppError, SchemaError};
pub use handler::{Gate, HandlerKind, Prepared, RouteHandler, UrlFor};
pub use model::{Attrs, Model};
pub use pg::TableModel;
pub use reply::Reply;
pub use routes::{common_routes, resource_routes};
pub use schema::{introspect, Column, PkType, Schema, Table};
pub use state::AppState;

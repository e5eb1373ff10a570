//! Store access layer.
//!
//! This module provides store access functionality:
//! - Per-request relational connections
//! - Schema introspection and array-type inference
//! - Query execution for relational statements and document expressions
//! - Type mappings from driver rows to JSON
//! - Connection dispatch macro for reducing code duplication

pub mod connection;
pub mod document;
pub mod executor;
pub mod inference;
#[macro_use]
pub mod macros;
pub mod schema;
pub mod sql_validator;
pub mod types;

pub use connection::DbConnection;
pub use document::{DocumentSchemaMode, DocumentStore, MongoStore, describe_documents};
pub use executor::QueryExecutor;
pub use schema::SchemaInspector;

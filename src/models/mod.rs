//! Data models for the nl2query server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod document;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{StoreKind, mask_credentials};
pub use document::{DocumentExpression, DocumentOperation, FindSpec, JsonMap};
pub use query::{Dialect, GeneratedQuery, QueryKind, QueryResult};
pub use schema::{FieldDescriptor, SchemaDescription, TypeTag};

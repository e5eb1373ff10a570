//! MCP tool implementations.
//!
//! This module contains all tool handlers:
//! - `ask`: Answer a question end to end
//! - `generate_query`: Produce a query without running it
//! - `execute_query`: Run a query on a dialect's store
//! - `describe_schema`: Introspect a dialect's store
//! - `list_dialects`: List configured dialects
//! - `format`: Text renderings of record sets

pub mod ask;
pub mod format;
pub mod schema;

pub use ask::{
    AskInput, AskOutput, AskToolHandler, ExecuteQueryInput, ExecuteQueryOutput,
    GenerateQueryInput, GenerateQueryOutput, ResultOutput,
};
pub use format::OutputFormat;
pub use schema::{
    DescribeSchemaInput, DescribeSchemaOutput, DialectInfo, ListDialectsOutput, SchemaToolHandler,
};

//! nl2query Library
//!
//! This library turns natural-language questions into SQL (MySQL, PostgreSQL,
//! SQLite) or MongoDB queries through a language model, runs them, and
//! exposes the pipeline as MCP (Model Context Protocol) tools.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{NlqError, NlqResult};
pub use mcp::NlqService;
pub use pipeline::QueryPipeline;

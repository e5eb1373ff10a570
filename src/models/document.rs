//! Parsed document-store expressions.
//!
//! Operands are JSON objects in their written key order. Extended JSON
//! wrappers such as `{"$oid": "..."}` are passed through untouched; the
//! document store decides how to interpret them.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

pub type JsonMap = Map<String, JsonValue>;

/// A validated `db[<collection>].<operation>(...)` expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentExpression {
    pub collection: String,
    pub operation: DocumentOperation,
}

/// Cursor query with optional modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindSpec {
    pub filter: JsonMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<JsonMap>,
    /// Field to direction (1 or -1), in priority order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl FindSpec {
    pub fn with_filter(filter: JsonMap) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentOperation {
    Find(FindSpec),
    FindOne {
        filter: JsonMap,
        #[serde(skip_serializing_if = "Option::is_none")]
        projection: Option<JsonMap>,
    },
    Aggregate {
        pipeline: Vec<JsonMap>,
    },
    CountDocuments {
        filter: JsonMap,
    },
    Distinct {
        field: String,
        filter: JsonMap,
    },
}

impl DocumentOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Find(_) => "find",
            Self::FindOne { .. } => "find_one",
            Self::Aggregate { .. } => "aggregate",
            Self::CountDocuments { .. } => "count_documents",
            Self::Distinct { .. } => "distinct",
        }
    }
}

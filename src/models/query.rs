//! Query-related data models.
//!
//! This module defines the dialects a question can target, the tagged query
//! produced by the pipeline, and the normalized execution result.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Target query language and store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Relational-primary store (MySQL, or SQLite for local use)
    #[default]
    MySql,
    /// Relational-secondary store
    Postgres,
    /// Document store
    MongoDb,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::MongoDb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::MongoDb => "mongodb",
        }
    }

    /// Get the display name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::MongoDb => "MongoDB",
        }
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, Self::MongoDb)
    }

    /// The query kind this dialect's store executes.
    pub fn query_kind(&self) -> QueryKind {
        if self.is_relational() {
            QueryKind::Relational
        } else {
            QueryKind::Document
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mongodb" | "mongo" | "nosql" => Ok(Self::MongoDb),
            other => Err(format!(
                "Unknown dialect '{}'. Expected one of: mysql, postgres, mongodb",
                other
            )),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which store family a generated query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Relational,
    Document,
}

/// A candidate query tagged with the store family it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum GeneratedQuery {
    Relational(String),
    Document(String),
}

impl GeneratedQuery {
    pub fn new(kind: QueryKind, text: impl Into<String>) -> Self {
        match kind {
            QueryKind::Relational => Self::Relational(text.into()),
            QueryKind::Document => Self::Document(text.into()),
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Relational(_) => QueryKind::Relational,
            Self::Document(_) => QueryKind::Document,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Relational(text) | Self::Document(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Relational(text) | Self::Document(text) => text,
        }
    }
}

/// Normalized outcome of executing a generated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    /// Result set with column names in display order.
    Records {
        columns: Vec<String>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
    },
    /// Statement without a result set.
    RowsAffected { rows_affected: u64 },
    /// Generation or execution failure reported as data.
    Error { message: String },
}

impl QueryResult {
    /// Build a record set, deriving columns from the rows' keys in first-seen order.
    pub fn from_rows(rows: Vec<serde_json::Map<String, JsonValue>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self::Records { columns, rows }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Number of rows returned or affected.
    pub fn row_count(&self) -> u64 {
        match self {
            Self::Records { rows, .. } => rows.len() as u64,
            Self::RowsAffected { rows_affected } => *rows_affected,
            Self::Error { .. } => 0,
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Records { rows, .. } => match rows.len() {
                1 => "1 row returned.".to_string(),
                n => format!("{} rows returned.", n),
            },
            Self::RowsAffected { rows_affected } => format!("{} rows affected.", rows_affected),
            Self::Error { message } => format!("Error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!(" mongo ".parse::<Dialect>().unwrap(), Dialect::MongoDb);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_query_kind() {
        assert_eq!(Dialect::MySql.query_kind(), QueryKind::Relational);
        assert_eq!(Dialect::Postgres.query_kind(), QueryKind::Relational);
        assert_eq!(Dialect::MongoDb.query_kind(), QueryKind::Document);
    }

    #[test]
    fn test_generated_query_serialization() {
        let q = GeneratedQuery::Relational("SELECT 1".to_string());
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({"kind": "relational", "text": "SELECT 1"})
        );
    }

    #[test]
    fn test_from_rows_collects_columns_in_first_seen_order() {
        let rows = vec![
            json!({"name": "Alice", "age": 20}).as_object().unwrap().clone(),
            json!({"name": "Bob", "major": "math"}).as_object().unwrap().clone(),
        ];
        let QueryResult::Records { columns, rows } = QueryResult::from_rows(rows) else {
            panic!("expected records");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(columns.len(), 3);
        assert!(columns.contains(&"major".to_string()));
        assert_eq!(columns.last().unwrap(), "major");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            QueryResult::RowsAffected { rows_affected: 3 }.summary(),
            "3 rows affected."
        );
        assert_eq!(QueryResult::from_rows(Vec::new()).summary(), "0 rows returned.");
        assert!(QueryResult::error("boom").is_error());
    }

    #[test]
    fn test_query_result_tagging() {
        let value = serde_json::to_value(QueryResult::RowsAffected { rows_affected: 2 }).unwrap();
        assert_eq!(value, json!({"status": "rows_affected", "rows_affected": 2}));
    }
}

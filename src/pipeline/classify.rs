//! Query classification.
//!
//! Tags a repaired candidate with the store family that will run it. The
//! result always matches the dialect's own store: unrecognized text falls
//! back to the dialect tag instead of being rejected.

use crate::models::{Dialect, GeneratedQuery, QueryKind};
use tracing::{debug, warn};

/// Leading keywords recognized as relational statements.
pub const RELATIONAL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "create", "drop", "show", "describe",
];

/// Substrings recognized as document-store operations.
pub const DOCUMENT_MARKERS: &[&str] = &[".find(", ".aggregate("];

/// True if the text starts with one of [`RELATIONAL_KEYWORDS`], ignoring case.
pub fn has_relational_keyword(query: &str) -> bool {
    let head = query.trim_start();
    RELATIONAL_KEYWORDS.iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}

/// True if the text contains one of [`DOCUMENT_MARKERS`].
pub fn has_document_marker(query: &str) -> bool {
    DOCUMENT_MARKERS.iter().any(|m| query.contains(m))
}

/// Tag `query` for `dialect`.
pub fn classify(query: &str, dialect: Dialect) -> GeneratedQuery {
    match dialect.query_kind() {
        QueryKind::Relational => {
            if has_relational_keyword(query) {
                debug!(%dialect, "Classified as relational statement");
            } else {
                warn!(%dialect, "Unrecognized leading keyword, treating as relational");
            }
            GeneratedQuery::Relational(query.to_string())
        }
        QueryKind::Document => {
            if has_document_marker(query) {
                debug!(%dialect, "Classified as document expression");
            } else {
                warn!(%dialect, "No find/aggregate marker, treating as document expression");
            }
            GeneratedQuery::Document(query.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_relational() {
        assert_eq!(
            classify("SELECT * FROM customers;", Dialect::MySql),
            GeneratedQuery::Relational("SELECT * FROM customers;".to_string())
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert!(has_relational_keyword("select 1"));
        assert!(has_relational_keyword("  Show tables"));
        assert!(has_relational_keyword("DESCRIBE users"));
        assert!(!has_relational_keyword("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!has_relational_keyword("sel"));
    }

    #[test]
    fn test_unknown_keyword_falls_back_to_relational() {
        let q = classify("WITH x AS (SELECT 1) SELECT * FROM x", Dialect::Postgres);
        assert_eq!(q.kind(), QueryKind::Relational);
    }

    #[test]
    fn test_find_and_aggregate_are_document() {
        let q = classify("db[\"students\"].find({})", Dialect::MongoDb);
        assert_eq!(q.kind(), QueryKind::Document);
        let q = classify("db.orders.aggregate([])", Dialect::MongoDb);
        assert_eq!(q.kind(), QueryKind::Document);
    }

    #[test]
    fn test_document_dialect_never_yields_relational() {
        let q = classify("SELECT * FROM students", Dialect::MongoDb);
        assert_eq!(q.kind(), QueryKind::Document);
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        assert!(!has_relational_keyword("é"));
        assert!(!has_relational_keyword("选择所有客户"));
    }
}

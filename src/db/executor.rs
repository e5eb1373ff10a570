//! Query execution engine.
//!
//! Runs a classified query against the store that serves its dialect and
//! normalizes the outcome into a [`QueryResult`].
//!
//! # Relational
//!
//! The text is split into statements first. When every statement is a read,
//! each runs in turn and the last one's rows are returned. Otherwise all
//! statements run inside one transaction, which is committed, and the summed
//! affected-row count is returned.
//!
//! # Document
//!
//! The expression is parsed (never evaluated) and dispatched to the matching
//! [`DocumentStore`] operation.

use crate::db::connection::DbConnection;
use crate::db::document::DocumentStore;
use crate::db::sql_validator::{StatementKind, split_statements, statement_kind};
use crate::db::types::RowToJson;
use crate::error::{NlqError, NlqResult};
use crate::models::{DocumentOperation, JsonMap, QueryKind, QueryResult};
use crate::pipeline::document_expr::parse_document_expression;
use serde_json::Value as JsonValue;
use sqlx::{Column, Connection, Executor};
use std::time::Instant;
use tracing::debug;

/// Stateless executor for generated queries.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute relational text on an open connection.
    pub async fn execute_relational(conn: &mut DbConnection, sql: &str) -> NlqResult<QueryResult> {
        let start = Instant::now();
        let statements = split_statements(sql, conn.store_kind())?;
        let all_reads = statements
            .iter()
            .all(|s| statement_kind(s, conn.store_kind()) == StatementKind::Read);

        debug!(
            store = %conn.store_kind(),
            statements = statements.len(),
            read_only = all_reads,
            "Executing relational query"
        );

        let result = if all_reads {
            let mut last = QueryResult::from_rows(Vec::new());
            for statement in &statements {
                last = Self::fetch_records(conn, statement).await?;
            }
            last
        } else {
            let rows_affected = Self::execute_in_transaction(conn, &statements).await?;
            QueryResult::RowsAffected { rows_affected }
        };

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            summary = %result.summary(),
            "Relational query finished"
        );
        Ok(result)
    }

    /// Run one read statement and collect every row.
    async fn fetch_records(conn: &mut DbConnection, statement: &str) -> NlqResult<QueryResult> {
        let (columns, rows) = crate::with_connection!(conn, c => {
            let rows = (&mut *c).fetch_all(statement).await?;
            let columns = match rows.first() {
                Some(row) => row.column_names(),
                // No row to read names from; ask the driver for the shape
                None => (&mut *c)
                    .describe(statement)
                    .await
                    .map(|d| d.columns().iter().map(|col| col.name().to_string()).collect())
                    .unwrap_or_default(),
            };
            let rows: Vec<JsonMap> = rows.iter().map(RowToJson::to_json_map).collect();
            (columns, rows)
        });

        Ok(QueryResult::Records { columns, rows })
    }

    /// Run statements in one committed transaction; returns total affected rows.
    async fn execute_in_transaction(
        conn: &mut DbConnection,
        statements: &[String],
    ) -> NlqResult<u64> {
        crate::with_connection!(conn, c => {
            let mut tx = c.begin().await?;
            let mut total = 0u64;
            for statement in statements {
                let done = (&mut *tx).execute(statement.as_str()).await?;
                total += done.rows_affected();
            }
            tx.commit().await?;
            Ok(total)
        })
    }

    /// Parse and evaluate a document expression against `store`.
    pub async fn execute_document<S: DocumentStore>(
        store: &S,
        text: &str,
    ) -> NlqResult<QueryResult> {
        let expression = parse_document_expression(text)?;
        let collection = expression.collection.as_str();

        debug!(
            collection,
            operation = expression.operation.name(),
            "Evaluating document expression"
        );

        let rows = match &expression.operation {
            DocumentOperation::Find(spec) => store.find(collection, spec).await?,
            DocumentOperation::FindOne { filter, projection } => store
                .find_one(collection, filter, projection.as_ref())
                .await?
                .into_iter()
                .collect(),
            DocumentOperation::Aggregate { pipeline } => {
                store.aggregate(collection, pipeline).await?
            }
            DocumentOperation::CountDocuments { filter } => {
                let count = store.count_documents(collection, filter).await?;
                vec![single_field("count", JsonValue::from(count))]
            }
            DocumentOperation::Distinct { field, filter } => store
                .distinct(collection, field, filter)
                .await?
                .into_iter()
                .map(|value| single_field(field, value))
                .collect(),
        };

        Ok(QueryResult::from_rows(rows))
    }
}

fn single_field(name: &str, value: JsonValue) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(name.to_string(), value);
    map
}

/// Error for a query whose kind does not match the store it was routed to.
pub fn kind_mismatch(expected: QueryKind, got: QueryKind) -> NlqError {
    NlqError::internal(format!("{:?} query routed to a {:?} store", got, expected))
}

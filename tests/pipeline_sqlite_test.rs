//! End-to-end pipeline tests over a temporary SQLite file.
//!
//! The model is replaced by a scripted gateway, so every stage after the
//! model call runs for real: extraction, repair, classification, execution.

use nl2query::config::Config;
use nl2query::db::{DbConnection, QueryExecutor};
use nl2query::error::{NlqError, NlqResult};
use nl2query::llm::ModelGateway;
use nl2query::models::{Dialect, GeneratedQuery, QueryKind, QueryResult, TypeTag};
use nl2query::pipeline::{ChatMessage, ConfiguredStores, PipelineOptions, QueryPipeline};
use nl2query::tools::ask::{AskInput, AskToolHandler, ExecuteQueryInput};
use nl2query::tools::format::OutputFormat;
use nl2query::tools::schema::{DescribeSchemaInput, SchemaToolHandler};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Replies with a fixed text and records every request.
struct ScriptedGateway {
    reply: NlqResult<String>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGateway {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(NlqError::model("HTTP 503: unavailable", "retry later")),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ModelGateway for ScriptedGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> NlqResult<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(NlqError::model(e.to_string(), "retry later")),
        }
    }
}

/// Create a seeded SQLite file and return its URL.
async fn setup_db() -> String {
    let temp_file = NamedTempFile::new().unwrap();
    // Keep the temp file alive - prevent deletion when function returns
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let url = format!("sqlite:{}", db_path);

    let mut conn = DbConnection::open(&url).await.unwrap();
    QueryExecutor::execute_relational(
        &mut conn,
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO customers (id, name) VALUES (1, 'Alice'), (2, 'Bob');
         CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT, courses TEXT);
         INSERT INTO students (id, name, courses) VALUES
             (1, 'Alice', '[\"math\", \"art\"]'),
             (2, 'Bob', '[\"music\"]');",
    )
    .await
    .unwrap();
    conn.close().await;
    url
}

fn pipeline(url: &str, gateway: ScriptedGateway) -> Arc<QueryPipeline<ScriptedGateway, ConfiguredStores>> {
    let config = Config {
        mysql_url: Some(url.to_string()),
        ..Config::default()
    };
    let stores = ConfiguredStores::from_config(&config).unwrap();
    Arc::new(QueryPipeline::new(gateway, stores, PipelineOptions::default()))
}

#[tokio::test]
async fn test_show_all_customers() {
    let url = setup_db().await;
    let pipeline = pipeline(
        &url,
        ScriptedGateway::replying("Here you go:\n```sql\nSELECT * FROM customers;\n```\n"),
    );

    let answer = pipeline.ask("show all customers", Dialect::MySql).await.unwrap();
    assert_eq!(
        answer.query,
        Some(GeneratedQuery::Relational("SELECT * FROM customers;".to_string()))
    );
    let QueryResult::Records { columns, rows } = answer.result else {
        panic!("expected records, got {:?}", answer.result);
    };
    assert_eq!(columns, vec!["id", "name"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["name"], json!("Bob"));
}

#[tokio::test]
async fn test_prompt_carries_schema_and_question() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("SELECT 1"));
    pipeline.ask("who takes math?", Dialect::MySql).await.unwrap();

    let seen = pipeline_gateway_requests(&pipeline);
    assert_eq!(seen.len(), 1);
    let system = &seen[0][0].content;
    assert!(system.contains("MySQL"));
    assert!(system.contains("\"customers\""));
    assert!(system.contains("array<string>"));
    assert_eq!(seen[0][1].content, "who takes math?");
}

fn pipeline_gateway_requests(
    pipeline: &QueryPipeline<ScriptedGateway, ConfiguredStores>,
) -> Vec<Vec<ChatMessage>> {
    pipeline.gateway().seen.lock().unwrap().clone()
}

#[tokio::test]
async fn test_bad_sql_becomes_error_result() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("SELECT * FROM nowhere"));

    let answer = pipeline.ask("show everything", Dialect::MySql).await.unwrap();
    assert!(answer.query.is_some());
    let QueryResult::Error { message } = answer.result else {
        panic!("expected error result");
    };
    assert!(message.contains("nowhere"));
}

#[tokio::test]
async fn test_empty_model_output_becomes_error_result() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("```sql\n```"));

    let answer = pipeline.ask("show everything", Dialect::MySql).await.unwrap();
    assert_eq!(answer.query, None);
    assert!(answer.result.is_error());
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::failing());

    let err = pipeline.ask("show everything", Dialect::MySql).await.unwrap_err();
    assert!(matches!(err, NlqError::Model { .. }));
}

#[tokio::test]
async fn test_generate_does_not_execute() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("DELETE FROM customers"));

    let query = pipeline.generate("remove all customers", Dialect::MySql).await.unwrap();
    assert_eq!(query.kind(), QueryKind::Relational);

    let count = GeneratedQuery::Relational("SELECT COUNT(*) AS n FROM customers".to_string());
    let QueryResult::Records { rows, .. } = pipeline.execute(&count, Dialect::MySql).await.unwrap()
    else {
        panic!("expected records");
    };
    assert_eq!(rows[0]["n"], json!(2));
}

#[tokio::test]
async fn test_blank_question_is_invalid_input() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("SELECT 1"));
    let err = pipeline.generate("   ", Dialect::MySql).await.unwrap_err();
    assert!(matches!(err, NlqError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_unconfigured_dialect_propagates() {
    let url = setup_db().await;
    let pipeline = pipeline(&url, ScriptedGateway::replying("SELECT 1"));
    let err = pipeline.ask("anything", Dialect::Postgres).await.unwrap_err();
    assert!(matches!(err, NlqError::Configuration { .. }));
}

#[tokio::test]
async fn test_execute_tool_write_then_read_as_csv() {
    let url = setup_db().await;
    let handler = AskToolHandler::new(pipeline(&url, ScriptedGateway::replying("")));

    let write = handler
        .execute_query(ExecuteQueryInput {
            query: "INSERT INTO customers (id, name) VALUES (3, 'Carol'); UPDATE customers SET name = 'Al' WHERE id = 1;".to_string(),
            dialect: Dialect::MySql,
            format: OutputFormat::Json,
        })
        .await
        .unwrap();
    assert_eq!(
        write.output.result,
        Some(QueryResult::RowsAffected { rows_affected: 2 })
    );

    let read = handler
        .execute_query(ExecuteQueryInput {
            query: "SELECT id, name FROM customers ORDER BY id".to_string(),
            dialect: Dialect::MySql,
            format: OutputFormat::Csv,
        })
        .await
        .unwrap();
    assert_eq!(
        read.output.formatted.as_deref(),
        Some("id,name\n1,Al\n2,Bob\n3,Carol\n")
    );
}

#[tokio::test]
async fn test_ask_tool_renders_table() {
    let url = setup_db().await;
    let handler = AskToolHandler::new(pipeline(
        &url,
        ScriptedGateway::replying("```sql\nSELECT name FROM customers WHERE id = 1\n```"),
    ));

    let output = handler
        .ask(AskInput {
            question: "what is customer 1 called?".to_string(),
            dialect: Dialect::MySql,
            format: OutputFormat::Table,
        })
        .await
        .unwrap();
    assert_eq!(output.kind, Some(QueryKind::Relational));
    let table = output.output.formatted.unwrap();
    assert!(table.contains("| Alice |"));
    assert!(table.contains("1 row in set"));
}

#[tokio::test]
async fn test_describe_schema_infers_array_columns() {
    let url = setup_db().await;
    let handler = SchemaToolHandler::new(pipeline(&url, ScriptedGateway::replying("")));

    let output = handler
        .describe_schema(DescribeSchemaInput {
            dialect: Dialect::MySql,
        })
        .await
        .unwrap();
    assert_eq!(output.count, 2);
    assert!(output.schema.has_field_tagged("courses", &TypeTag::ArrayOfString));
    // Free text is not re-tagged
    let students = output.schema.get("students").unwrap();
    let name = students.iter().find(|f| f.name == "name").unwrap();
    assert_eq!(name.type_tag, TypeTag::Column("TEXT".to_string()));

    let listed = handler.list_dialects();
    assert_eq!(listed.count, 1);
}

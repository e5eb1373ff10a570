//! Question answering tools.
//!
//! This module implements the `ask`, `generate_query` and `execute_query`
//! MCP tools. `generate_query` followed by `execute_query` lets a client
//! review the query before it runs; `ask` does both in one call.

use crate::error::{NlqError, NlqResult};
use crate::llm::ModelGateway;
use crate::models::{Dialect, GeneratedQuery, QueryKind, QueryResult};
use crate::pipeline::{QueryPipeline, StoreProvider};
use crate::tools::format::{OutputFormat, render};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Input for the ask tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskInput {
    /// Natural-language question about the data
    pub question: String,
    /// Target dialect: "mysql" (default), "postgres" or "mongodb"
    #[serde(default)]
    pub dialect: Dialect,
    /// Output format: "json" returns structured data, "table", "markdown" or "csv" return text
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the generate_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateQueryInput {
    /// Natural-language question about the data
    pub question: String,
    /// Target dialect: "mysql" (default), "postgres" or "mongodb"
    #[serde(default)]
    pub dialect: Dialect,
}

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// SQL statement(s), or a document expression such as `db["students"].find({})`
    pub query: String,
    /// Dialect whose store runs the query
    #[serde(default)]
    pub dialect: Dialect,
    /// Output format: "json" returns structured data, "table", "markdown" or "csv" return text
    #[serde(default)]
    pub format: OutputFormat,
}

/// Result section shared by ask and execute_query.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ResultOutput {
    /// Structured result. Omitted when a text format was requested for records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    /// Pre-formatted output when format is table, markdown or csv
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Rows returned or affected
    pub row_count: u64,
    pub summary: String,
    pub execution_time_ms: u64,
}

impl ResultOutput {
    pub fn from_result(
        result: QueryResult,
        format: OutputFormat,
        execution_time_ms: u64,
    ) -> NlqResult<Self> {
        let formatted = render(&result, format, execution_time_ms)?;
        Ok(Self {
            row_count: result.row_count(),
            summary: result.summary(),
            result: if formatted.is_some() { None } else { Some(result) },
            formatted,
            execution_time_ms,
        })
    }
}

/// Output from the ask tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AskOutput {
    pub dialect: Dialect,
    /// Query that was run. Absent when the model returned nothing usable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<QueryKind>,
    #[serde(flatten)]
    pub output: ResultOutput,
}

/// Output from the generate_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GenerateQueryOutput {
    pub dialect: Dialect,
    pub query: String,
    pub kind: QueryKind,
}

/// Output from the execute_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteQueryOutput {
    pub dialect: Dialect,
    #[serde(flatten)]
    pub output: ResultOutput,
}

/// Handler for the question answering tools.
pub struct AskToolHandler<G, P> {
    pipeline: Arc<QueryPipeline<G, P>>,
}

impl<G: ModelGateway, P: StoreProvider> AskToolHandler<G, P> {
    pub fn new(pipeline: Arc<QueryPipeline<G, P>>) -> Self {
        Self { pipeline }
    }

    /// Generate, execute and format in one call.
    pub async fn ask(&self, input: AskInput) -> NlqResult<AskOutput> {
        info!(dialect = %input.dialect, "Tool: ask");
        let start = Instant::now();
        let answer = self.pipeline.ask(&input.question, input.dialect).await?;
        let elapsed = start.elapsed().as_millis() as u64;

        let kind = answer.query.as_ref().map(GeneratedQuery::kind);
        Ok(AskOutput {
            dialect: input.dialect,
            query: answer.query.map(GeneratedQuery::into_text),
            kind,
            output: ResultOutput::from_result(answer.result, input.format, elapsed)?,
        })
    }

    /// Generate a query without running it.
    pub async fn generate_query(&self, input: GenerateQueryInput) -> NlqResult<GenerateQueryOutput> {
        info!(dialect = %input.dialect, "Tool: generate_query");
        let query = self.pipeline.generate(&input.question, input.dialect).await?;
        Ok(GenerateQueryOutput {
            dialect: input.dialect,
            kind: query.kind(),
            query: query.into_text(),
        })
    }

    /// Run a query on the dialect's store.
    pub async fn execute_query(&self, input: ExecuteQueryInput) -> NlqResult<ExecuteQueryOutput> {
        let text = input.query.trim();
        if text.is_empty() {
            return Err(NlqError::invalid_input("query must not be empty"));
        }

        info!(dialect = %input.dialect, "Tool: execute_query");
        let query = GeneratedQuery::new(input.dialect.query_kind(), text);
        let start = Instant::now();
        let result = self.pipeline.execute(&query, input.dialect).await?;
        let elapsed = start.elapsed().as_millis() as u64;

        Ok(ExecuteQueryOutput {
            dialect: input.dialect,
            output: ResultOutput::from_result(result, input.format, elapsed)?,
        })
    }
}

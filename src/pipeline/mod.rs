//! Natural-language to query pipeline.
//!
//! One request runs these stages in order, with no internal parallelism:
//!
//! 1. introspect the dialect's store into a [`SchemaDescription`]
//! 2. build the prompt ([`prompt`])
//! 3. call the model gateway
//! 4. extract the candidate query ([`extract`])
//! 5. repair known model mistakes, relational dialects only ([`repair`])
//! 6. classify ([`classify`])
//! 7. execute and normalize the result
//!
//! Failures local to one generated query become [`QueryResult::Error`];
//! store, introspection and model failures are returned as errors.

pub mod classify;
pub mod document_expr;
pub mod extract;
pub mod prompt;
pub mod repair;
pub mod stores;

pub use classify::classify;
pub use extract::extract_query;
pub use prompt::{ChatMessage, Prompt, build_prompt};
pub use repair::RepairPass;
pub use stores::{ConfiguredStores, StoreProvider};

use crate::config::Config;
use crate::db::document::{DocumentSchemaMode, DocumentStore, describe_documents};
use crate::db::executor::{QueryExecutor, kind_mismatch};
use crate::db::schema::SchemaInspector;
use crate::error::{NlqError, NlqResult};
use crate::llm::ModelGateway;
use crate::models::{Dialect, GeneratedQuery, QueryKind, QueryResult, SchemaDescription};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Sampling settings for introspection.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub array_sample_rows: u32,
    pub document_sample_size: u32,
    pub document_schema_mode: DocumentSchemaMode,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            array_sample_rows: config.array_sample_rows,
            document_sample_size: config.document_sample_size,
            document_schema_mode: config.document_schema_mode,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Outcome of a full question-to-result run.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Answer {
    /// Absent when the model returned nothing usable.
    pub query: Option<GeneratedQuery>,
    pub result: QueryResult,
}

/// The question-to-result pipeline over a model gateway and a set of stores.
pub struct QueryPipeline<G, P> {
    gateway: G,
    stores: P,
    repair: RepairPass,
    options: PipelineOptions,
}

impl<G: ModelGateway, P: StoreProvider> QueryPipeline<G, P> {
    pub fn new(gateway: G, stores: P, options: PipelineOptions) -> Self {
        Self {
            gateway,
            stores,
            repair: RepairPass::default(),
            options,
        }
    }

    /// Replace the shipped repair rules.
    pub fn with_repair(mut self, repair: RepairPass) -> Self {
        self.repair = repair;
        self
    }

    pub fn stores(&self) -> &P {
        &self.stores
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Introspect the store serving `dialect`.
    pub async fn describe(&self, dialect: Dialect) -> NlqResult<SchemaDescription> {
        match dialect.query_kind() {
            QueryKind::Relational => {
                let mut conn = self.stores.open_relational(dialect).await?;
                let schema = SchemaInspector::describe(&mut conn, self.options.array_sample_rows).await;
                conn.close().await;
                schema
            }
            QueryKind::Document => {
                let store = self.stores.open_documents().await?;
                let schema = describe_documents(
                    &store,
                    self.options.document_schema_mode,
                    self.options.document_sample_size,
                )
                .await;
                store.close().await;
                schema
            }
        }
    }

    /// Produce a classified query for `question` without running it.
    pub async fn generate(&self, question: &str, dialect: Dialect) -> NlqResult<GeneratedQuery> {
        let question = question.trim();
        if question.is_empty() {
            return Err(NlqError::invalid_input("Question must not be empty"));
        }

        info!(%dialect, "Generating query");
        let schema = self.describe(dialect).await?;
        let prompt = build_prompt(&schema, dialect, question);
        let raw = self.gateway.complete(&prompt.messages()).await?;
        debug!(raw = %raw, "Model response");

        let candidate = extract_query(&raw);
        if candidate.is_empty() {
            return Err(NlqError::malformed_output("Model response contains no query"));
        }
        debug!(query = %candidate, "Extracted query");

        let candidate = if dialect.is_relational() {
            let repaired = self.repair.apply(&candidate, dialect, &schema);
            if repaired != candidate {
                debug!(query = %repaired, "Repaired query");
            }
            repaired
        } else {
            candidate
        };

        Ok(classify(&candidate, dialect))
    }

    /// Run `query` on the store serving `dialect`.
    ///
    /// Query-local failures are returned as [`QueryResult::Error`].
    pub async fn execute(&self, query: &GeneratedQuery, dialect: Dialect) -> NlqResult<QueryResult> {
        let expected = dialect.query_kind();
        if query.kind() != expected {
            return Err(kind_mismatch(expected, query.kind()));
        }

        info!(%dialect, "Executing query");
        let outcome = match query {
            GeneratedQuery::Relational(sql) => {
                let mut conn = self.stores.open_relational(dialect).await?;
                let outcome = QueryExecutor::execute_relational(&mut conn, sql).await;
                conn.close().await;
                outcome
            }
            GeneratedQuery::Document(expression) => {
                let store = self.stores.open_documents().await?;
                let outcome = QueryExecutor::execute_document(&store, expression).await;
                store.close().await;
                outcome
            }
        };

        local_to_result(outcome)
    }

    /// Generate and execute in one call.
    pub async fn ask(&self, question: &str, dialect: Dialect) -> NlqResult<Answer> {
        let query = match self.generate(question, dialect).await {
            Ok(query) => query,
            Err(e) if e.is_query_local() => {
                warn!(error = %e, "Query generation failed");
                return Ok(Answer {
                    query: None,
                    result: QueryResult::error(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };

        let result = self.execute(&query, dialect).await?;
        info!(%dialect, summary = %result.summary(), "Question answered");
        Ok(Answer {
            query: Some(query),
            result,
        })
    }
}

/// Turn query-local errors into result values.
fn local_to_result(outcome: NlqResult<QueryResult>) -> NlqResult<QueryResult> {
    match outcome {
        Ok(result) => Ok(result),
        Err(e) if e.is_query_local() => {
            warn!(error = %e, "Query failed");
            Ok(QueryResult::error(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

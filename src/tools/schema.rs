//! Schema introspection tools.
//!
//! This module implements the `describe_schema` and `list_dialects` MCP tools.

use crate::error::{NlqError, NlqResult};
use crate::llm::ModelGateway;
use crate::models::{Dialect, SchemaDescription, StoreKind};
use crate::pipeline::{QueryPipeline, StoreProvider};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the describe_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeSchemaInput {
    /// Dialect whose store is described: "mysql" (default), "postgres" or "mongodb"
    #[serde(default)]
    pub dialect: Dialect,
}

/// Output from the describe_schema tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeSchemaOutput {
    pub dialect: Dialect,
    pub store: StoreKind,
    /// Table or collection name to ordered field descriptors
    pub schema: SchemaDescription,
    /// Number of tables or collections
    pub count: usize,
}

/// One configured dialect.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DialectInfo {
    pub dialect: Dialect,
    pub store: StoreKind,
    /// e.g. "MySQL"
    pub display_name: String,
}

/// Output from the list_dialects tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDialectsOutput {
    pub dialects: Vec<DialectInfo>,
    pub count: usize,
}

/// Handler for schema tools.
pub struct SchemaToolHandler<G, P> {
    pipeline: Arc<QueryPipeline<G, P>>,
}

impl<G: ModelGateway, P: StoreProvider> SchemaToolHandler<G, P> {
    pub fn new(pipeline: Arc<QueryPipeline<G, P>>) -> Self {
        Self { pipeline }
    }

    /// Introspect the store serving the requested dialect.
    pub async fn describe_schema(&self, input: DescribeSchemaInput) -> NlqResult<DescribeSchemaOutput> {
        let store = self.store_for(input.dialect)?;
        info!(dialect = %input.dialect, store = %store, "Tool: describe_schema");

        let schema = self.pipeline.describe(input.dialect).await?;
        Ok(DescribeSchemaOutput {
            dialect: input.dialect,
            store,
            count: schema.len(),
            schema,
        })
    }

    /// List configured dialects in mysql, postgres, mongodb order.
    pub fn list_dialects(&self) -> ListDialectsOutput {
        let configured = self.pipeline.stores().dialects();
        let dialects: Vec<DialectInfo> = Dialect::ALL
            .iter()
            .filter_map(|dialect| {
                configured
                    .iter()
                    .find(|(d, _)| d == dialect)
                    .map(|(_, store)| DialectInfo {
                        dialect: *dialect,
                        store: *store,
                        display_name: store.display_name().to_string(),
                    })
            })
            .collect();

        ListDialectsOutput {
            count: dialects.len(),
            dialects,
        }
    }

    fn store_for(&self, dialect: Dialect) -> NlqResult<StoreKind> {
        self.pipeline
            .stores()
            .dialects()
            .into_iter()
            .find(|(d, _)| *d == dialect)
            .map(|(_, store)| store)
            .ok_or_else(|| {
                NlqError::invalid_input(format!(
                    "No store configured for the {} dialect. Call list_dialects first.",
                    dialect
                ))
            })
    }
}

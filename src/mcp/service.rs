//! MCP service implementation using rmcp.
//!
//! This module defines the NlqService struct with all pipeline tools
//! exposed via the MCP protocol using the rmcp framework's macros.

use crate::llm::ChatCompletionsGateway;
use crate::pipeline::{ConfiguredStores, QueryPipeline};
use crate::tools::ask::{
    AskInput, AskOutput, AskToolHandler, ExecuteQueryInput, ExecuteQueryOutput,
    GenerateQueryInput, GenerateQueryOutput,
};
use crate::tools::schema::{
    DescribeSchemaInput, DescribeSchemaOutput, ListDialectsOutput, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

/// Pipeline served over MCP.
pub type ServerPipeline = QueryPipeline<ChatCompletionsGateway, ConfiguredStores>;

#[derive(Clone)]
pub struct NlqService {
    /// Shared pipeline; holds no per-request state
    pipeline: Arc<ServerPipeline>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl NlqService {
    pub fn new(pipeline: Arc<ServerPipeline>) -> Self {
        Self {
            pipeline,
            tool_router: Self::tool_router(),
        }
    }

    fn ask_handler(&self) -> AskToolHandler<ChatCompletionsGateway, ConfiguredStores> {
        AskToolHandler::new(self.pipeline.clone())
    }

    fn schema_handler(&self) -> SchemaToolHandler<ChatCompletionsGateway, ConfiguredStores> {
        SchemaToolHandler::new(self.pipeline.clone())
    }
}

#[tool_router]
impl NlqService {
    #[tool(
        description = "List the configured dialects (mysql, postgres, mongodb) and the store serving each."
    )]
    async fn list_dialects(&self) -> Json<ListDialectsOutput> {
        Json(self.schema_handler().list_dialects())
    }

    #[tool(
        description = "Describe the tables or collections of a dialect's store.\nReturns each field with its type; JSON and text columns holding arrays are tagged array<string>, array<int> or array<mixed>."
    )]
    async fn describe_schema(
        &self,
        Parameters(input): Parameters<DescribeSchemaInput>,
    ) -> Result<Json<DescribeSchemaOutput>, McpError> {
        self.schema_handler()
            .describe_schema(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Answer a natural-language question: generate a query for the dialect, run it and return the result.\nOutput format: json (default), table, markdown or csv.\nGeneration and execution failures are returned as a result with status \"error\"."
    )]
    async fn ask(
        &self,
        Parameters(input): Parameters<AskInput>,
    ) -> Result<Json<AskOutput>, McpError> {
        self.ask_handler()
            .ask(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Generate a query for a natural-language question without running it.\nReturns SQL for mysql/postgres or a document expression for mongodb."
    )]
    async fn generate_query(
        &self,
        Parameters(input): Parameters<GenerateQueryInput>,
    ) -> Result<Json<GenerateQueryOutput>, McpError> {
        self.ask_handler()
            .generate_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a query on a dialect's store.\nSQL with several statements runs in one transaction unless every statement is a read.\nmongodb accepts db[\"coll\"].find/find_one/aggregate/count_documents/distinct expressions; nothing is evaluated as code.\nOutput format: json (default), table, markdown or csv."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<Json<ExecuteQueryOutput>, McpError> {
        self.ask_handler()
            .execute_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for NlqService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nl2query".to_owned(),
                title: Some("nl2query".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Natural-language questions over SQL and MongoDB stores.\n\
                \n\
                ## Workflow\n\
                1. Call `list_dialects` to see which stores are configured\n\
                2. Call `ask` with a question and a dialect, or\n\
                3. Call `generate_query` to review the query, then `execute_query` to run it\n\
                \n\
                ## Dialects\n\
                - mysql: relational-primary store (MySQL, or SQLite for local use)\n\
                - postgres: relational-secondary store\n\
                - mongodb: document store; queries are `db[\"collection\"].find(...)` style expressions\n\
                \n\
                ## Results\n\
                A result has status `records`, `rows_affected` or `error`. Errors in a generated\n\
                query are reported as results; connection and model failures are tool errors.\n\
                Use `describe_schema` to see the tables, collections and field types the model sees."
                    .to_string(),
            ),
        }
    }
}

/// Pipeline over an in-memory SQLite store and an unreachable model endpoint.
#[cfg(test)]
pub(crate) fn test_pipeline() -> Arc<ServerPipeline> {
    use crate::config::{Config, LlmConfig, LlmProvider};
    use crate::pipeline::PipelineOptions;
    use std::time::Duration;

    let gateway = ChatCompletionsGateway::new(LlmConfig {
        provider: LlmProvider::OpenAi,
        endpoint: "http://127.0.0.1:9".to_string(),
        api_key: "k".to_string(),
        deployment: "gpt-4o".to_string(),
        api_version: "2024-06-01".to_string(),
        temperature: 0.0,
        timeout: Duration::from_secs(1),
    })
    .unwrap();
    let config = Config {
        mysql_url: Some("sqlite::memory:".to_string()),
        ..Config::default()
    };
    let stores = ConfiguredStores::from_config(&config).unwrap();
    Arc::new(QueryPipeline::new(gateway, stores, PipelineOptions::default()))
}

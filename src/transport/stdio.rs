//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::error::{NlqError, NlqResult};
use crate::mcp::{NlqService, ServerPipeline};
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout as newline-delimited MCP messages.
pub struct StdioTransport {
    pipeline: Arc<ServerPipeline>,
}

impl StdioTransport {
    pub fn new(pipeline: Arc<ServerPipeline>) -> Self {
        Self { pipeline }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> NlqResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = NlqService::new(self.pipeline.clone());
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| NlqError::internal(format!("Failed to start stdio transport: {}", e)))?;

        tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(NlqError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
            }
            _ = wait_for_signal() => {
                // Stdin reads cannot be interrupted; leave the process directly
                info!("Shutdown signal received, exiting");
                std::process::exit(0);
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

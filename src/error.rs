//! Error types for the nl2query server.
//!
//! Every failure in the pipeline is an [`NlqError`]. Errors local to query
//! generation and execution are turned into result values by the pipeline;
//! connectivity, introspection and model failures propagate to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlqError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Schema introspection failed: {message} (object: {object})")]
    SchemaIntrospection { message: String, object: String },

    #[error("Malformed model output: {message}")]
    MalformedModelOutput { message: String },

    #[error("Invalid query syntax: {message}")]
    InvalidQuerySyntax { message: String },

    #[error("Execution error: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Evaluation error: {message}")]
    Evaluation { message: String },

    #[error("Model request failed: {message}")]
    Model { message: String, suggestion: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NlqError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema introspection error for a table or collection.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::SchemaIntrospection {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::MalformedModelOutput {
            message: message.into(),
        }
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::InvalidQuerySyntax {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a language-model gateway error.
    pub fn model(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } => Some(suggestion),
            Self::Model { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True for failures that stay local to one generated query.
    ///
    /// The pipeline reports these as a `QueryResult::Error` value instead of
    /// failing the whole request.
    pub fn is_query_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedModelOutput { .. }
                | Self::InvalidQuerySyntax { .. }
                | Self::Execution { .. }
                | Self::Evaluation { .. }
        )
    }
}

/// Convert sqlx errors to NlqError.
impl From<sqlx::Error> for NlqError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => NlqError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                NlqError::execution(
                    db_err.message(),
                    code,
                    "Check the generated SQL against the schema",
                )
            }
            sqlx::Error::RowNotFound => NlqError::execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => NlqError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => NlqError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => NlqError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                NlqError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                NlqError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => NlqError::internal(format!("Decode error: {}", source)),
            _ => NlqError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert document-store driver errors to NlqError.
impl From<mongodb::error::Error> for NlqError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match err.kind.as_ref() {
            ErrorKind::InvalidArgument { message, .. } => NlqError::evaluation(message.clone()),
            ErrorKind::Command(cmd) => NlqError::execution(
                format!("{} ({})", cmd.message, cmd.code_name),
                Some(cmd.code.to_string()),
                "Check the collection and field names in the generated expression",
            ),
            ErrorKind::Authentication { message, .. } => NlqError::connection(
                message.clone(),
                "Check the document store credentials",
            ),
            ErrorKind::ServerSelection { message, .. } => NlqError::connection(
                message.clone(),
                "Check that the document store is reachable",
            ),
            ErrorKind::Io(io_err) => NlqError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and document store status",
            ),
            _ => NlqError::execution(err.to_string(), None, "Check the generated expression"),
        }
    }
}

/// Convert HTTP client errors from the model gateway to NlqError.
impl From<reqwest::Error> for NlqError {
    fn from(err: reqwest::Error) -> Self {
        let suggestion = if err.is_timeout() {
            "Increase --llm-timeout or retry later"
        } else if err.is_connect() {
            "Check --llm-endpoint and network connectivity"
        } else if err.is_decode() {
            "Check that the endpoint speaks the chat-completions protocol"
        } else {
            "Check the model endpoint configuration"
        };
        NlqError::model(err.to_string(), suggestion)
    }
}

/// Result type alias for pipeline operations.
pub type NlqResult<T> = Result<T, NlqError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert NlqError to MCP ErrorData.
/// Includes the suggestion field in the `data` object when available.
impl From<NlqError> for rmcp::ErrorData {
    fn from(err: NlqError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            // Caller-correctable problems -> invalid_params
            NlqError::InvalidInput { .. }
            | NlqError::MalformedModelOutput { .. }
            | NlqError::InvalidQuerySyntax { .. }
            | NlqError::Evaluation { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            NlqError::Execution {
                message, sql_state, ..
            } => {
                let msg = match sql_state {
                    Some(code) => format!("Execution error: {} (SQLSTATE: {})", message, code),
                    None => err.to_string(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            NlqError::SchemaIntrospection { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }

            NlqError::Connection { .. }
            | NlqError::Model { .. }
            | NlqError::Configuration { .. }
            | NlqError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NlqError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = NlqError::execution("Syntax error", Some("42601".to_string()), "Check SQL");
        assert_eq!(err.suggestion(), Some("Check SQL"));
        assert_eq!(NlqError::evaluation("bad").suggestion(), None);
    }

    #[test]
    fn test_query_local_kinds() {
        assert!(NlqError::malformed_output("empty").is_query_local());
        assert!(NlqError::invalid_syntax("no statements").is_query_local());
        assert!(NlqError::execution("boom", None, "").is_query_local());
        assert!(NlqError::evaluation("unknown operation").is_query_local());
        assert!(!NlqError::connection("down", "").is_query_local());
        assert!(!NlqError::model("503", "").is_query_local());
        assert!(!NlqError::schema("denied", "users").is_query_local());
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = NlqError::invalid_input("bad input").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_execution_includes_sql_state() {
        let err = NlqError::execution("syntax error", Some("42601".to_string()), "check syntax");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("42601"));
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "check syntax");
    }

    #[test]
    fn test_schema_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = NlqError::schema("no such table", "orders").into();
        assert_eq!(mcp_err.code.0, -32002);
    }

    #[test]
    fn test_connection_and_model_map_to_internal_error() {
        let mcp_err: rmcp::ErrorData = NlqError::connection("failed", "try again").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");

        let mcp_err: rmcp::ErrorData = NlqError::model("HTTP 500", "retry").into();
        assert_eq!(mcp_err.code.0, -32603);
    }

    #[test]
    fn test_configuration_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = NlqError::configuration("mongodb not set").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert!(mcp_err.data.is_none());
    }
}

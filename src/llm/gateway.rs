//! Chat-completions model gateway.
//!
//! Sends role-tagged messages to an Azure OpenAI deployment or an
//! OpenAI-compatible server and returns the first choice's text.

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{NlqError, NlqResult};
use crate::pipeline::prompt::ChatMessage;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info};

/// Longest slice of an error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// One text completion per ordered message list.
pub trait ModelGateway: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> impl Future<Output = NlqResult<String>> + Send;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// [`ModelGateway`] over HTTP chat-completions.
pub struct ChatCompletionsGateway {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionsGateway {
    pub fn new(config: LlmConfig) -> NlqResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NlqError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            provider = %config.provider,
            endpoint = %config.endpoint,
            deployment = %config.deployment,
            "Model gateway ready"
        );
        Ok(Self { client, config })
    }

    /// Full request URL for the configured provider.
    pub fn completions_url(&self) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        match self.config.provider {
            LlmProvider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.config.deployment, self.config.api_version
            ),
            LlmProvider::OpenAi => format!("{}/v1/chat/completions", endpoint),
        }
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatMessage]) -> CompletionRequest<'a> {
        CompletionRequest {
            // Azure routes by deployment in the path
            model: match self.config.provider {
                LlmProvider::Azure => None,
                LlmProvider::OpenAi => Some(&self.config.deployment),
            },
            messages,
            temperature: self.config.temperature,
        }
    }
}

impl ModelGateway for ChatCompletionsGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> NlqResult<String> {
        let url = self.completions_url();
        let request = self.client.post(&url).json(&self.request_body(messages));
        let request = match self.config.provider {
            LlmProvider::Azure => request.header("api-key", &self.config.api_key),
            LlmProvider::OpenAi => request.bearer_auth(&self.config.api_key),
        };

        debug!(messages = messages.len(), "Sending completion request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let content = parse_completion(&body)?;
        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }
}

/// Extract `choices[0].message.content` from a response body.
fn parse_completion(body: &str) -> NlqResult<String> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        NlqError::model(
            format!("Failed to parse completion response: {}", e),
            "Check that the endpoint speaks the chat-completions protocol",
        )
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            NlqError::model(
                "Completion response has no message content",
                "The model may have filtered the request; rephrase the question",
            )
        })
}

fn status_error(status: StatusCode, body: &str) -> NlqError {
    let suggestion = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "Check --llm-api-key",
        StatusCode::NOT_FOUND => "Check --llm-endpoint, --llm-deployment and --llm-api-version",
        StatusCode::TOO_MANY_REQUESTS => "The endpoint is rate limiting; retry later",
        s if s.is_server_error() => "The model endpoint failed; retry later",
        _ => "Check the model endpoint configuration",
    };
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    NlqError::model(format!("HTTP {}: {}", status, body), suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use serde_json::{Value as JsonValue, json};
    use std::time::Duration;

    fn config(provider: LlmProvider, endpoint: &str) -> LlmConfig {
        LlmConfig {
            provider,
            endpoint: endpoint.to_string(),
            api_key: "secret-key".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-06-01".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_azure_url() {
        let gateway =
            ChatCompletionsGateway::new(config(LlmProvider::Azure, "https://x.openai.azure.com/"))
                .unwrap();
        assert_eq!(
            gateway.completions_url(),
            "https://x.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_openai_url_and_model_field() {
        let gateway =
            ChatCompletionsGateway::new(config(LlmProvider::OpenAi, "http://localhost:11434"))
                .unwrap();
        assert_eq!(
            gateway.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );

        let messages = [ChatMessage::user("hi")];
        let body = serde_json::to_value(gateway.request_body(&messages)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "SELECT 1");

        for body in [r#"{"choices":[]}"#, r#"{"choices":[{"message":{"content":null}}]}"#, "{}"] {
            assert!(matches!(parse_completion(body), Err(NlqError::Model { .. })), "{body}");
        }
        assert!(parse_completion("<html>").is_err());
    }

    #[test]
    fn test_status_error_suggestion() {
        let err = status_error(StatusCode::UNAUTHORIZED, "denied");
        assert_eq!(err.suggestion(), Some("Check --llm-api-key"));
        assert!(err.to_string().contains("401"));

        let long = "x".repeat(10_000);
        let err = status_error(StatusCode::BAD_GATEWAY, &long);
        assert!(err.to_string().len() < 1_000);
    }

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_azure_round_trip_sends_api_key() {
        let router = axum::Router::new().route(
            "/openai/deployments/{deployment}/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                let key = headers
                    .get("api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let question = body["messages"][1]["content"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "choices": [{"message": {"content": format!("{key}|{question}")}}]
                }))
            }),
        );
        let endpoint = serve(router).await;

        let gateway = ChatCompletionsGateway::new(config(LlmProvider::Azure, &endpoint)).unwrap();
        let text = gateway
            .complete(&[ChatMessage::system("rules"), ChatMessage::user("show all customers")])
            .await
            .unwrap();
        assert_eq!(text, "secret-key|show all customers");
    }

    #[tokio::test]
    async fn test_non_success_status_is_model_error() {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let endpoint = serve(router).await;

        let gateway = ChatCompletionsGateway::new(config(LlmProvider::OpenAi, &endpoint)).unwrap();
        let err = gateway.complete(&[ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, NlqError::Model { .. }));
        assert!(err.to_string().contains("slow down"));
    }
}

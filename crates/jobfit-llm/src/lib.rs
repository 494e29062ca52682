//! Minimal chat client for a locally hosted model server.
//!
//! Only the non-streaming `/api/chat` endpoint is used. Callers depend on the
//! [`ChatModel`] trait so tests can swap in a scripted model.

mod error;
mod types;

pub use error::{LlmError, Result};
pub use types::{ChatRequest, ChatResponse, Message, ModelOptions, Role};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "jobfit-llm";

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::Config(format!(
                "model base url must be http(s): {base_url:?}"
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "model request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;
        if !status.is_success() {
            warn!(status = %status, body = %body, "model API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = parse_chat_response(&body)?;
        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "model chat completed"
        );
        Ok(parsed)
    }
}

fn parse_chat_response(body: &str) -> Result<ChatResponse> {
    let raw: types::ChatResponseRaw =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    if let Some(error) = raw.error {
        return Err(LlmError::Parse(format!("model reported error: {error}")));
    }
    let message = raw
        .message
        .ok_or_else(|| LlmError::Parse("response has no message".into()))?;
    Ok(ChatResponse {
        model: raw.model,
        content: message.content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_without_streaming() {
        let request = ChatRequest::new("llama3").message(Message::user("hello"));
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            json!({
                "model": "llama3",
                "messages": [{ "role": "user", "content": "hello" }],
                "stream": false,
            })
        );

        let body = serde_json::to_value(request.temperature(0.0)).expect("serialize");
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn parses_message_content() {
        let body = r#"{"model":"llama3","created_at":"2024-06-01T00:00:00Z",
            "message":{"role":"assistant","content":" true\n"},"done":true}"#;
        let response = parse_chat_response(body).expect("parse");
        assert_eq!(response.content, " true\n");
        assert_eq!(response.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn missing_message_or_bad_json_is_a_parse_error() {
        assert!(matches!(
            parse_chat_response(r#"{"error":"model 'llama9' not found"}"#),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            parse_chat_response(r#"{"done":true}"#),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(parse_chat_response("<html>"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn base_url_is_validated_and_normalized() {
        let client = OllamaClient::new("http://localhost:11434/", Duration::from_secs(5))
            .expect("client");
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        assert!(matches!(
            OllamaClient::new("localhost:11434", Duration::from_secs(5)),
            Err(LlmError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let client =
            OllamaClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
        let err = client
            .chat(ChatRequest::new(DEFAULT_MODEL).message(Message::user("ping")))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Network(_)));
    }
}

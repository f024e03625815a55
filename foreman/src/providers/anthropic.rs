//! Anthropic Messages API client.
//!
//! Sends one non-streaming `POST /v1/messages` request per call and
//! classifies HTTP failures into [`LlmError`] kinds.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Model, ModelRequest, ModelResponse, TokenUsage};
use crate::error::{Error, LlmError, Result};
use crate::message::{ContentBlock, Turn};
use crate::tool::ToolDefinition;

/// Default Anthropic API base URL.
pub const ANTHROPIC_API_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
pub const ANTHROPIC_VERSION_LATEST: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Anthropic API client.
///
/// # Example
///
/// ```rust,ignore
/// use foreman::providers::AnthropicClient;
///
/// let client = AnthropicClient::builder()
///     .api_key("sk-ant-...")
///     .timeout_secs(60)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    anthropic_version: Arc<str>,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("anthropic_version", &self.anthropic_version)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Create a new Anthropic client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    /// Create a client from `ANTHROPIC_API_KEY` and optional `ANTHROPIC_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ANTHROPIC_API_KEY` is not set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::config("ANTHROPIC_API_KEY is not set"))?;
        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("x-api-key", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.anthropic_version) {
            headers.insert("anthropic-version", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

#[async_trait]
impl Model for AnthropicClient {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<ModelResponse, LlmError> {
        let body = WireRequest::from(request);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .headers(self.auth_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from(e).with_provider(PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), error_message(&text))
                .with_provider(PROVIDER));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::from(e).with_provider(PROVIDER))?;
        debug!(
            input_tokens = wire.usage.input_tokens,
            output_tokens = wire.usage.output_tokens,
            stop_reason = ?wire.stop_reason,
            "anthropic response"
        );
        Ok(wire.into_response())
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}

/// Builder for [`AnthropicClient`].
#[derive(Debug)]
pub struct AnthropicClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    anthropic_version: String,
    timeout_secs: Option<u64>,
}

impl Default for AnthropicClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            anthropic_version: ANTHROPIC_VERSION_LATEST.to_string(),
            timeout_secs: Some(120),
        }
    }
}

impl AnthropicClientBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the Anthropic API version.
    #[must_use]
    pub fn anthropic_version(mut self, version: impl Into<String>) -> Self {
        self.anthropic_version = version.into();
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is missing or the HTTP
    /// client fails to build.
    pub fn build(self) -> Result<AnthropicClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::config("API key is required"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| ANTHROPIC_API_BASE_URL.to_string());

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(AnthropicClient {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            anthropic_version: self.anthropic_version.into(),
        })
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

impl<'a> From<&'a ModelRequest> for WireRequest<'a> {
    fn from(request: &'a ModelRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: &request.messages,
            tools: &request.tools,
            tool_choice: (!request.tools.is_empty())
                .then(|| serde_json::json!({"type": "auto"})),
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    usage: TokenUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl WireResponse {
    /// Keep the block kinds we understand; drop the rest (e.g. thinking).
    fn into_response(self) -> ModelResponse {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| serde_json::from_value::<ContentBlock>(block).ok())
            .collect();
        ModelResponse {
            content,
            usage: self.usage,
            stop_reason: self.stop_reason,
        }
    }
}

/// Extract `error.message` from an API error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_builder() {
        let client = AnthropicClient::builder()
            .api_key("test-key")
            .base_url("https://custom.api.com")
            .anthropic_version("2023-06-01")
            .timeout_secs(30)
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "https://custom.api.com");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = AnthropicClient::builder().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_wire_request_shape() {
        let request = ModelRequest {
            model: "claude-haiku-4-5".into(),
            system: "be brief".into(),
            messages: vec![Turn::user("hi")],
            tools: vec![ToolDefinition {
                name: "get_rating".into(),
                description: "Rating table".into(),
                input_schema: json!({"type": "object", "properties": {}}),
            }],
            max_tokens: 256,
        };
        let value = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert_eq!(value["system"], "be brief");
        assert_eq!(value["tool_choice"], json!({"type": "auto"}));
        assert_eq!(value["tools"][0]["name"], "get_rating");
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_wire_request_without_tools_omits_choice() {
        let request = ModelRequest {
            model: "m".into(),
            system: String::new(),
            messages: vec![Turn::user("hi")],
            tools: Vec::new(),
            max_tokens: 16,
        };
        let value = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_wire_response_skips_unknown_blocks() {
        let wire: WireResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "ok"},
                {"type": "tool_use", "id": "toolu_1", "name": "get_rating", "input": {}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3},
            "stop_reason": "tool_use"
        }))
        .unwrap();
        let response = wire.into_response();
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.usage.total(), 15);
        assert!(response.has_tool_calls());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(body), "Overloaded");
        assert_eq!(error_message("plain"), "plain");
    }
}

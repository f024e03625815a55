//! Unified error types for the foreman orchestration core.
//!
//! This module provides the error hierarchy covering:
//! - LLM provider errors (authentication, rate limiting, server failures, etc.)
//! - Configuration errors
//! - Shortcut pattern errors
//! - Serialization errors
//!
//! Tool failures are deliberately absent: the dispatcher turns every tool
//! failure into an error payload fed back into the conversation.

use std::fmt;

/// Result type alias for foreman operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the foreman core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid shortcut pattern.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Error type for LLM provider operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "anthropic", "mock").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider (HTTP status for status errors).
    pub code: Option<String>,
}

/// Categories of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Account balance or quota exhausted.
    Billing,
    /// Rate limit exceeded.
    RateLimited,
    /// Remote server failure (5xx, overloaded).
    Server,
    /// Network or connection error, including timeouts.
    Network,
    /// Invalid request parameters.
    InvalidRequest,
    /// Response could not be decoded.
    ResponseFormat,
    /// Internal error.
    Internal,
}

impl LlmError {
    fn with_kind(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Auth, message).with_provider(provider)
    }

    /// Create a billing / quota error.
    #[must_use]
    pub fn billing(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Billing, message)
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::RateLimited,
            "Rate limit exceeded. Please retry after some time.",
        )
        .with_provider(provider)
    }

    /// Create a server-side failure error.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Server, message)
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Network, message)
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::InvalidRequest, message)
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::ResponseFormat,
            format!("Expected {}, got {}", expected.into(), got.into()),
        )
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Internal, message)
    }

    /// Classify an HTTP error status returned by the provider.
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => LlmErrorKind::Auth,
            402 => LlmErrorKind::Billing,
            429 => LlmErrorKind::RateLimited,
            500..=599 => LlmErrorKind::Server,
            _ => LlmErrorKind::InvalidRequest,
        };
        Self {
            kind,
            provider: None,
            message: format!("HTTP {status}: {}", body.into()),
            code: Some(status.to_string()),
        }
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// HTTP status carried in `code`, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.code.as_deref().and_then(|c| c.parse().ok())
    }

    /// Check if this is a transient error worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::RateLimited | LlmErrorKind::Server | LlmErrorKind::Network
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::response_format("Messages API response", err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

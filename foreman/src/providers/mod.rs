//! LLM provider implementations.
//!
//! Each provider implements the [`Model`] trait, the single seam between the
//! orchestration core and the hosted model service.
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::providers::{AnthropicClient, Model};
//!
//! let client = AnthropicClient::from_env()?;
//! let response = client.generate(&request).await?;
//! println!("{}", response.text().unwrap_or_default());
//! ```

mod types;

pub mod anthropic;
pub mod mock;

pub use anthropic::{AnthropicClient, AnthropicClientBuilder};
pub use mock::MockModel;
pub use types::{ModelRequest, ModelResponse, TokenUsage};

use crate::error::LlmError;
use async_trait::async_trait;

/// The core trait for language model implementations.
///
/// One call is one request/response exchange. Implementations classify
/// their failures into [`LlmError`] kinds so the resilient client can tell
/// transient failures from permanent ones.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generate a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the response cannot be parsed.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError>;

    /// Get the provider name (e.g., "anthropic").
    fn provider(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        (**self).generate(request).await
    }

    fn provider(&self) -> &'static str {
        (**self).provider()
    }
}

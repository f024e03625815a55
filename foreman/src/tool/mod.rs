//! Tools the model may request, and the machinery that runs them.
//!
//! A [`Tool`] is a named, schema-described operation registered in a
//! [`ToolRegistry`] together with its [`Access`] level and whether it is
//! *silent* (its success already delivers the user-facing outcome). Tools
//! report failure through [`ToolError`] rather than panicking, and the
//! [`Dispatcher`] turns every outcome into a JSON payload that carries an
//! `error` key iff the call failed.
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::tool::{Tool, ToolContext, ToolOutcome, parse_args};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Echo the text back" }
//!     fn input_schema(&self) -> serde_json::Value {
//!         serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
//!     }
//!     async fn invoke(&self, args: serde_json::Value, _ctx: &ToolContext) -> ToolOutcome {
//!         Ok(args)
//!     }
//! }
//! ```

mod dispatcher;
mod registry;

pub use dispatcher::{Dispatch, Dispatcher};
pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::role::{Access, Role};

/// Schema description of a tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does and when to call it.
    pub description: String,
    /// JSON schema of the arguments object.
    pub input_schema: Value,
}

/// Who is calling, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    /// Authenticated caller id.
    pub caller_id: i64,
    /// Caller role, resolved upstream.
    pub role: Role,
    /// Topic (thread) the message arrived in; `"private"` for direct chats.
    pub topic: String,
    /// Shared chat id, when the message came from a group.
    pub chat_id: Option<i64>,
}

impl ToolContext {
    /// Create a context for a private conversation.
    #[must_use]
    pub fn private(caller_id: i64, role: Role) -> Self {
        Self {
            caller_id,
            role,
            topic: "private".to_string(),
            chat_id: None,
        }
    }
}

/// Errors a tool reports instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The underlying operation failed.
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Create a not-found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an operation failure.
    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Outcome of one tool invocation.
pub type ToolOutcome = Result<Value, ToolError>;

/// Deserialize tool arguments into a typed struct.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the value does not fit `T`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// A registered operation the model may request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments.
    fn input_schema(&self) -> Value;

    /// Permission level required to invoke the tool.
    fn access(&self) -> Access {
        Access::Open
    }

    /// Whether a successful call already delivered the user-facing effect.
    fn silent(&self) -> bool {
        false
    }

    /// Run the operation.
    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolOutcome;

    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

//! Common imports for building on the orchestration core.

pub use crate::config::{HistoryPairs, ModelSelection, OrchestratorConfig};
pub use crate::error::{Error, LlmError, LlmErrorKind};
pub use crate::message::{ContentBlock, ToolCallRequest, ToolResult, Turn};
pub use crate::orchestrator::{Inbound, Orchestrator, OrchestratorBuilder, classify_error};
pub use crate::prompt::PromptBuilder;
pub use crate::providers::{AnthropicClient, MockModel, Model, ModelRequest, ModelResponse, TokenUsage};
pub use crate::retry::{ResilientClient, RetryConfig};
pub use crate::role::{Access, Role};
pub use crate::session::{Session, SessionKey, SessionStore};
pub use crate::shortcut::{DirectCommand, Shortcut, ShortcutMatcher};
pub use crate::throttle::Throttle;
pub use crate::tool::{
    Dispatch, Dispatcher, Tool, ToolContext, ToolDefinition, ToolError, ToolOutcome, ToolRegistry,
    parse_args,
};

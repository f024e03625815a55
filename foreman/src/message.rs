//! Conversation turns and content blocks.
//!
//! A [`Turn`] is one message-equivalent unit of history. User turns carry
//! plain text (or, for the synthetic turn closing a tool round, a list of
//! tool results); assistant turns carry plain text or the raw content
//! blocks returned by the model, tool-use requests included.
//!
//! The serialized shape matches the Anthropic Messages API so history can
//! be sent back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human side of the conversation (and tool results).
    User,
    /// The model.
    Assistant,
}

impl Speaker {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One block of structured message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool-call request emitted by the model.
    ToolUse {
        /// Opaque call id chosen by the model.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments as a JSON value.
        input: Value,
    },
    /// The answer to one tool-call request.
    ToolResult {
        /// Id of the originating tool-use block.
        tool_use_id: String,
        /// Serialized result payload.
        content: String,
        /// Set when the payload describes a failure.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Return the text if this is a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Body of a turn: either a plain string or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    /// Plain text content.
    Text(String),
    /// Structured content blocks.
    Blocks(Vec<ContentBlock>),
}

/// One message-equivalent unit in a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Producer of the turn.
    pub role: Speaker,
    /// Turn body.
    pub content: TurnContent,
}

impl Turn {
    /// Create a plain-text user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Create a plain-text assistant turn.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Create an assistant turn preserving the model's raw content blocks.
    #[must_use]
    pub const fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// Create the synthetic user turn answering every tool call of a round.
    #[must_use]
    pub fn tool_results(results: &[ToolResult]) -> Self {
        Self {
            role: Speaker::User,
            content: TurnContent::Blocks(results.iter().map(ToolResult::to_block).collect()),
        }
    }

    /// Whether this is a user turn.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Speaker::User
    }

    /// Plain text of the turn, if it has any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            TurnContent::Blocks(blocks) => blocks.iter().find_map(ContentBlock::as_text),
        }
    }
}

/// A tool-call request extracted from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Opaque call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments as sent by the model.
    pub arguments: Value,
}

/// The answer to one tool-call request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Id of the originating call.
    pub call_id: String,
    /// JSON payload; contains an `error` key iff the call failed.
    pub payload: String,
    /// Whether the payload describes a failure.
    pub is_error: bool,
}

impl ToolResult {
    /// Convert to a wire content block.
    #[must_use]
    pub fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: self.call_id.clone(),
            content: self.payload.clone(),
            is_error: self.is_error,
        }
    }
}

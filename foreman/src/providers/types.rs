//! Request and response types shared by all model providers.

use serde::{Deserialize, Serialize};

use crate::message::{ContentBlock, ToolCallRequest, Turn};
use crate::tool::ToolDefinition;

/// Token usage information from a model response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt.
    pub input_tokens: u32,
    /// Number of tokens in the output/completion.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Create new token usage with specified counts.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
    }
}

/// One outbound model call: system prompt, tool catalog and history.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model identifier.
    pub model: String,
    /// Role-scoped system prompt.
    pub system: String,
    /// Full message list, oldest first.
    pub messages: Vec<Turn>,
    /// Tools visible to the caller; empty disables tool use.
    pub tools: Vec<ToolDefinition>,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Response from a model generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Content blocks in the order the model produced them.
    pub content: Vec<ContentBlock>,
    /// Token usage information.
    pub usage: TokenUsage,
    /// Why generation stopped, when reported.
    pub stop_reason: Option<String>,
}

impl ModelResponse {
    /// Create a response from content blocks.
    #[must_use]
    pub const fn new(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            usage: TokenUsage::new(0, 0),
            stop_reason: None,
        }
    }

    /// Create a text-only response.
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::text(text)])
    }

    /// Set token usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// First text block of the response.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentBlock::as_text)
    }

    /// Tool-call requests in the order received.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCallRequest {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Check if the response contains tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_accessors() {
        let response = ModelResponse::new(vec![
            ContentBlock::ToolUse {
                id: "a".into(),
                name: "get_rating".into(),
                input: json!({}),
            },
            ContentBlock::text("here you go"),
            ContentBlock::ToolUse {
                id: "b".into(),
                name: "get_tester_stats".into(),
                input: json!({"username": "kate"}),
            },
        ]);
        assert_eq!(response.text(), Some("here you go"));
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[1].name, "get_tester_stats");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::new(10, 5);
        usage += TokenUsage::new(3, 2);
        assert_eq!(usage.total(), 20);
    }
}

//! Role- and topic-scoped system prompts.

use crate::role::Role;

/// Builder for the system prompt sent with every model call.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    instructions: Option<String>,
    chat_persona: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            persona: "You are Foreman, the coordinator bot of a software testing team. \
                      You turn requests from team members into tool calls."
                .to_string(),
            instructions: None,
            chat_persona: "You are Foreman, a laconic team bot chatting casually. \
                           Answer in one or two short sentences."
                .to_string(),
        }
    }
}

impl PromptBuilder {
    /// Create a builder with the default persona.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the persona paragraph.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Append deployment-specific instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Replace the small-talk persona.
    #[must_use]
    pub fn with_chat_persona(mut self, persona: impl Into<String>) -> Self {
        self.chat_persona = persona.into();
        self
    }

    /// Build the prompt for one caller.
    #[must_use]
    pub fn build(&self, username: &str, role: Role, topic: &str) -> String {
        let permissions = match role {
            Role::Owner => "You may use every tool, including team management.",
            Role::Admin => "You may use scoring, warning and task tools. Team management is reserved for the owner.",
            Role::Tester => "You may only look up statistics and the rating. Politely refuse anything else.",
        };
        let mut prompt = format!(
            "{persona}

## Caller
- Username: @{username}
- Role: {role}
- Topic: {topic}

## Permissions
{permissions}

## Guidelines
1. Call a tool whenever the request maps to one; never invent results.
2. If a tool returns an error, tell the caller briefly what went wrong.
3. Keep replies short and factual.",
            persona = self.persona,
        );
        if let Some(extra) = &self.instructions {
            prompt.push_str("\n\n## Instructions\n");
            prompt.push_str(extra);
        }
        prompt
    }

    /// Prompt for the tool-less small-talk mode.
    #[must_use]
    pub fn chat(&self) -> &str {
        &self.chat_persona
    }
}

//! The round loop turning one inbound message into a reply.
//!
//! [`Orchestrator::handle`] walks the following states:
//!
//! ```text
//! START ──shortcut──────────────────────────────────▶ reply
//!   │
//!   ▼
//! AWAIT_MODEL ──failure──▶ rollback user turn ─────▶ classified reply
//!   │
//!   ├─ no tool calls ───────────────────────────────▶ DONE
//!   ▼
//! EXECUTE_TOOLS ──(round < max_rounds)──▶ AWAIT_MODEL
//! ```
//!
//! Tool-use and tool-result turns live only in the round-local message
//! list. The session records the user text and the final assistant text,
//! so stored history always alternates user/assistant.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{LlmError, LlmErrorKind, Result};
use crate::message::Turn;
use crate::prompt::PromptBuilder;
use crate::providers::{Model, ModelRequest, ModelResponse, TokenUsage};
use crate::retry::ResilientClient;
use crate::role::Role;
use crate::session::{Session, SessionKey, SessionStore};
use crate::shortcut::{Shortcut, ShortcutMatcher};
use crate::throttle::Throttle;
use crate::tool::{Dispatcher, ToolContext, ToolDefinition, ToolRegistry};

/// Reply when the round budget ends without any text.
pub const ROUND_FALLBACK_REPLY: &str = "Done ✅";

/// Assistant turn stored after a silent tool succeeded without model text.
pub const SILENT_STORED_REPLY: &str = "Done";

/// Reply when small talk yields no text.
pub const CHAT_FALLBACK_REPLY: &str = "…";

/// One inbound message with its authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Message text.
    pub text: String,
    /// Authenticated caller id.
    pub caller_id: i64,
    /// Caller username, without the `@`.
    pub username: String,
    /// Caller role.
    pub role: Role,
    /// Topic (thread) name.
    pub topic: String,
    /// Shared chat id; `None` for private conversations.
    pub chat_id: Option<i64>,
}

impl Inbound {
    /// Create a private message.
    pub fn private(text: impl Into<String>, caller_id: i64, role: Role) -> Self {
        Self {
            text: text.into(),
            caller_id,
            username: caller_id.to_string(),
            role,
            topic: "private".to_string(),
            chat_id: None,
        }
    }

    /// Set the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Mark the message as coming from a shared chat.
    #[must_use]
    pub const fn in_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Whether the message belongs to a shared chat session.
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        self.chat_id.is_some()
    }

    /// Session key: the chat id for shared chats, the caller id otherwise.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        self.chat_id.unwrap_or(self.caller_id)
    }

    /// Text stored in history; shared chats are annotated with the sender.
    #[must_use]
    pub fn history_text(&self) -> String {
        if self.is_shared() {
            format!("@{}: {}", self.username, self.text)
        } else {
            self.text.clone()
        }
    }

    /// Tool context for this caller.
    #[must_use]
    pub fn context(&self) -> ToolContext {
        ToolContext {
            caller_id: self.caller_id,
            role: self.role,
            topic: self.topic.clone(),
            chat_id: self.chat_id,
        }
    }
}

/// Map a surfaced model failure to a short user-facing reply.
#[must_use]
pub fn classify_error(err: &LlmError) -> String {
    match err.kind {
        LlmErrorKind::RateLimited => {
            "⚠️ The model service is rate limiting requests. Please retry shortly.".to_string()
        }
        LlmErrorKind::Server | LlmErrorKind::Network => {
            "⚠️ The model service is unavailable right now. Please try again later.".to_string()
        }
        LlmErrorKind::Auth => {
            "⚠️ Model service authorization failed. Check ANTHROPIC_API_KEY in the configuration."
                .to_string()
        }
        LlmErrorKind::Billing => unavailable(),
        LlmErrorKind::InvalidRequest if matches!(err.status(), Some(400 | 402)) => unavailable(),
        _ => format!("⚠️ Error: {}", truncate(&err.to_string(), 200)),
    }
}

fn unavailable() -> String {
    "⚠️ The bot is temporarily unavailable. Please contact the owner.".to_string()
}

fn truncate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}

#[derive(Debug, Default)]
struct SilentState {
    fired: bool,
    error: Option<String>,
}

/// Drives shortcut matching, model rounds, tool dispatch and session updates.
pub struct Orchestrator<M> {
    client: ResilientClient<M>,
    sessions: SessionStore,
    dispatcher: Dispatcher,
    shortcuts: ShortcutMatcher,
    prompt: PromptBuilder,
    config: OrchestratorConfig,
}

impl<M> std::fmt::Debug for Orchestrator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("tools", self.dispatcher.registry())
            .finish_non_exhaustive()
    }
}

impl<M: Model> Orchestrator<M> {
    /// Start building an orchestrator around a model.
    pub fn builder(model: M) -> OrchestratorBuilder<M> {
        OrchestratorBuilder::new(model)
    }

    /// Active configuration.
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Session store.
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Registered tools.
    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// The resilient client used for every model call.
    pub const fn client(&self) -> &ResilientClient<M> {
        &self.client
    }

    /// Drop a session, e.g. after the caller's role changed.
    pub fn forget(&self, key: SessionKey) -> bool {
        self.sessions.forget(key)
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` when a silent tool already delivered the outcome.
    pub async fn handle(&self, msg: &Inbound) -> Option<String> {
        if let Some(reply) = self.try_shortcut(msg).await {
            return Some(reply);
        }

        let key = msg.session_key();
        let limit = self.config.history_limit(msg.role, msg.is_shared());
        let handle = self.sessions.get_or_create(key);
        let mut session = handle.lock().await;

        session.push(Turn::user(msg.history_text()));
        let mut messages = session.window(limit);

        let model = self.config.models.for_role(msg.role);
        let system = self.prompt.build(&msg.username, msg.role, &msg.topic);
        let tools = self.dispatcher.registry().definitions_for(msg.role);
        let ctx = msg.context();
        debug!(
            key,
            role = %msg.role,
            model,
            tools = tools.len(),
            history = messages.len(),
            "handling message"
        );

        let mut usage = TokenUsage::default();
        let mut silent = SilentState::default();
        let mut rounds = 0;

        let mut response = match self.call(model, &system, &messages, &tools).await {
            Ok(response) => response,
            Err(err) => return Some(Self::fail(&mut session, key, &err)),
        };
        usage += response.usage;

        loop {
            let calls = response.tool_calls();
            if calls.is_empty() {
                break;
            }
            if rounds >= self.config.max_rounds {
                warn!(
                    key,
                    rounds,
                    pending = calls.len(),
                    "round budget exhausted"
                );
                break;
            }
            rounds += 1;

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let args = call.arguments.to_string();
                info!(tool = %call.name, args = truncate(&args, 100), "tool call");
                let outcome = self
                    .dispatcher
                    .execute_value(&call.name, call.arguments, &ctx)
                    .await;
                info!(
                    tool = %call.name,
                    result = truncate(&outcome.payload, 150),
                    "tool result"
                );
                if outcome.silent {
                    silent.fired = true;
                    if let Some(err) = outcome.error_message() {
                        silent.error = Some(err);
                    }
                }
                results.push(outcome.into_result(call.id));
            }

            messages.push(Turn::assistant_blocks(response.content));
            messages.push(Turn::tool_results(&results));

            response = match self.call(model, &system, &messages, &tools).await {
                Ok(response) => response,
                Err(err) => return Some(Self::fail(&mut session, key, &err)),
            };
            usage += response.usage;
            debug!(key, round = rounds, tool_use = response.has_tool_calls(), "round complete");
        }

        let (reply, stored) = if let Some(err) = silent.error {
            let reply = format!("⚠️ {err}");
            (Some(reply.clone()), reply)
        } else if silent.fired {
            let stored = response
                .text()
                .filter(|t| !t.is_empty())
                .unwrap_or(SILENT_STORED_REPLY);
            (None, stored.to_string())
        } else {
            let text = response.text().unwrap_or(ROUND_FALLBACK_REPLY).to_string();
            (Some(text.clone()), text)
        };

        session.push(Turn::assistant(stored));
        let dropped = session.trim_to(limit);
        info!(
            key,
            rounds,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            silent = reply.is_none(),
            dropped,
            "message handled"
        );
        reply
    }

    /// Tool-less small talk sharing the caller's private session.
    pub async fn chat(&self, text: &str, caller_id: i64) -> String {
        let limit = self.config.chat_history_messages;
        let handle = self.sessions.get_or_create(caller_id);
        let mut session = handle.lock().await;
        session.push(Turn::user(text));

        let request = ModelRequest {
            model: self.config.chat_model.clone(),
            system: self.prompt.chat().to_string(),
            messages: session.window(limit),
            tools: Vec::new(),
            max_tokens: self.config.max_tokens,
        };
        debug!(caller_id, model = %request.model, "chat request");

        match self.client.call(&request).await {
            Ok(response) => {
                let reply = response.text().unwrap_or(CHAT_FALLBACK_REPLY).to_string();
                info!(
                    caller_id,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "chat reply"
                );
                session.push(Turn::assistant(reply.clone()));
                session.trim_to(limit);
                reply
            }
            Err(err) => Self::fail(&mut session, caller_id, &err),
        }
    }

    async fn try_shortcut(&self, msg: &Inbound) -> Option<String> {
        match self.shortcuts.find(&msg.text)? {
            Shortcut::Canned(reply) => {
                info!(caller = msg.caller_id, "canned reply");
                Some(reply.to_string())
            }
            Shortcut::Direct { command, args } => {
                info!(caller = msg.caller_id, tool = command.tool(), "direct command");
                let outcome = self
                    .dispatcher
                    .execute_value(command.tool(), args, &msg.context())
                    .await;
                let value = serde_json::from_str::<Value>(&outcome.payload)
                    .unwrap_or_else(|e| json!({ "error": e.to_string() }));
                Some(Shortcut::render(command, &value))
            }
        }
    }

    async fn call(
        &self,
        model: &str,
        system: &str,
        messages: &[Turn],
        tools: &[ToolDefinition],
    ) -> std::result::Result<ModelResponse, LlmError> {
        let request = ModelRequest {
            model: model.to_string(),
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            max_tokens: self.config.max_tokens,
        };
        let response = self.client.call(&request).await?;
        debug!(
            tool_use = response.has_tool_calls(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "model response"
        );
        Ok(response)
    }

    fn fail(session: &mut Session, key: SessionKey, err: &LlmError) -> String {
        let rolled_back = session.rollback_user().is_some();
        error!(key, kind = ?err.kind, rolled_back, error = %err, "model call failed");
        classify_error(err)
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder<M> {
    model: M,
    config: OrchestratorConfig,
    registry: ToolRegistry,
    shortcuts: ShortcutMatcher,
    prompt: PromptBuilder,
    throttle: Option<Arc<Throttle>>,
}

impl<M> std::fmt::Debug for OrchestratorBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<M: Model> OrchestratorBuilder<M> {
    /// Create a builder with default configuration and no tools.
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: OrchestratorConfig::default(),
            registry: ToolRegistry::new(),
            shortcuts: ShortcutMatcher::new(),
            prompt: PromptBuilder::new(),
            throttle: None,
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tool registry.
    #[must_use]
    pub fn tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the shortcut matcher.
    #[must_use]
    pub fn shortcuts(mut self, shortcuts: ShortcutMatcher) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    /// Set the prompt builder.
    #[must_use]
    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Share an existing throttle instead of creating one from the config.
    #[must_use]
    pub fn throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a config error if the configuration is invalid.
    pub fn build(self) -> Result<Orchestrator<M>> {
        self.config.validate()?;
        let throttle = self
            .throttle
            .unwrap_or_else(|| Arc::new(Throttle::new(self.config.min_call_interval())));
        Ok(Orchestrator {
            client: ResilientClient::new(self.model, throttle, self.config.retry),
            sessions: SessionStore::new(self.config.max_sessions),
            dispatcher: Dispatcher::new(Arc::new(self.registry)),
            shortcuts: self.shortcuts,
            prompt: self.prompt,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(classify_error(&LlmError::rate_limited("a")).contains("retry shortly"));
        assert!(classify_error(&LlmError::server("boom")).contains("unavailable right now"));
        assert!(classify_error(&LlmError::network("reset")).contains("unavailable right now"));
        assert!(classify_error(&LlmError::auth("a", "bad")).contains("ANTHROPIC_API_KEY"));
        assert!(classify_error(&LlmError::billing("empty")).contains("contact the owner"));
        assert!(
            classify_error(&LlmError::from_status(400, "credit balance too low"))
                .contains("contact the owner")
        );

        let long = "x".repeat(500);
        let reply = classify_error(&LlmError::from_status(404, long));
        assert!(reply.starts_with("⚠️ Error: "));
        assert_eq!(reply.chars().count(), "⚠️ Error: ".chars().count() + 200);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("привет", 3), "при");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_inbound_keys() {
        let private = Inbound::private("hi", 7, Role::Tester).with_username("kate");
        assert_eq!(private.session_key(), 7);
        assert_eq!(private.history_text(), "hi");

        let shared = private.clone().in_chat(-100);
        assert_eq!(shared.session_key(), -100);
        assert_eq!(shared.history_text(), "@kate: hi");
        assert_eq!(shared.context().chat_id, Some(-100));
    }
}

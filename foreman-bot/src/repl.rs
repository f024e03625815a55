//! Line-oriented chat channel over any async reader/writer.
//!
//! `main` wires it to stdin/stdout; tests drive it with in-memory buffers.
//!
//! Besides plain messages the REPL understands:
//! - `/chat <text>`: small talk without tools
//! - `/role <owner|admin|tester>`: override the caller role
//! - `/reset`: forget the current session
//! - `exit` / `quit`

use foreman::orchestrator::{Inbound, Orchestrator};
use foreman::providers::Model;
use foreman::role::Role;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;
use crate::roster::Roster;
use crate::tools::Outbound;

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string displayed before user input.
    pub prompt: String,
    /// Caller user id.
    pub caller_id: i64,
    /// Caller username.
    pub username: String,
    /// Fixed role; resolved from the roster when `None`.
    pub role: Option<Role>,
    /// Shared chat id, to simulate a group conversation.
    pub chat_id: Option<i64>,
    /// Topic name.
    pub topic: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            caller_id: 0,
            username: "cli".to_string(),
            role: None,
            chat_id: None,
            topic: "private".to_string(),
        }
    }
}

impl ReplConfig {
    /// Create a new REPL config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the caller id.
    #[must_use]
    pub const fn caller(mut self, caller_id: i64) -> Self {
        self.caller_id = caller_id;
        self
    }

    /// Set the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Fix the caller role.
    #[must_use]
    pub const fn role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }

    /// Simulate a shared chat.
    #[must_use]
    pub const fn chat(mut self, chat_id: Option<i64>) -> Self {
        self.chat_id = chat_id;
        self
    }

    /// Set the topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

/// Interactive channel in front of an orchestrator.
pub struct Repl<M> {
    orchestrator: Arc<Orchestrator<M>>,
    roster: Arc<Roster>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    config: ReplConfig,
    last_role: Option<Role>,
}

impl<M> std::fmt::Debug for Repl<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repl")
            .field("config", &self.config)
            .field("last_role", &self.last_role)
            .finish_non_exhaustive()
    }
}

impl<M: Model> Repl<M> {
    /// Create a REPL.
    pub const fn new(
        orchestrator: Arc<Orchestrator<M>>,
        roster: Arc<Roster>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        config: ReplConfig,
    ) -> Self {
        Self {
            orchestrator,
            roster,
            outbound,
            config,
            last_role: None,
        }
    }

    /// Resolve the caller role, dropping the private session when it changed.
    async fn current_role(&mut self) -> Role {
        let role = match self.config.role {
            Some(role) => role,
            None => self.roster.role_of(self.config.caller_id).await,
        };
        if let Some(previous) = self.last_role
            && previous != role
        {
            self.orchestrator.forget(self.config.caller_id);
            info!(caller = self.config.caller_id, %previous, %role, "role changed, session reset");
        }
        self.last_role = Some(role);
        role
    }

    /// Read lines from `input` until EOF or `exit`, writing replies to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            output.write_all(self.config.prompt.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "exit" | "quit") {
                break;
            }

            if let Some(reply) = self.dispatch_line(line).await {
                output.write_all(format!("{reply}\n").as_bytes()).await?;
            }
            while let Ok(msg) = self.outbound.try_recv() {
                output
                    .write_all(format!("[to {}] {}\n", msg.chat_id, msg.text).as_bytes())
                    .await?;
            }
        }
        output.flush().await?;
        Ok(())
    }

    async fn dispatch_line(&mut self, line: &str) -> Option<String> {
        if line == "/reset" {
            let key = self.config.chat_id.unwrap_or(self.config.caller_id);
            self.orchestrator.forget(key);
            return Some("Session reset.".to_string());
        }
        if let Some(role) = line.strip_prefix("/role ") {
            return Some(match role.parse::<Role>() {
                Ok(role) => {
                    self.config.role = Some(role);
                    format!("Role set to {role}.")
                }
                Err(e) => e,
            });
        }
        if let Some(text) = line.strip_prefix("/chat ") {
            return Some(self.orchestrator.chat(text, self.config.caller_id).await);
        }

        let role = self.current_role().await;
        let mut msg = Inbound::private(line, self.config.caller_id, role)
            .with_username(self.config.username.clone())
            .with_topic(self.config.topic.clone());
        if let Some(chat_id) = self.config.chat_id {
            msg = msg.in_chat(chat_id);
        }
        let reply = self.orchestrator.handle(&msg).await;
        if reply.is_none() {
            debug!("silent tool delivered the reply");
        }
        reply
    }
}

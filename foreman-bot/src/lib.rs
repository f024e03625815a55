//! Foreman Bot - a conversational coordinator for a software testing team.
//!
//! This crate wires the [`foreman`] orchestration core to a runnable bot:
//!
//! - **Config** ([`config`]) - JSON configuration file plus environment overrides
//! - **Roster** ([`roster`]) - in-memory testers, points, warnings and admins
//! - **Tools** ([`tools`]) - roster operations exposed to the model, with
//!   canned replies and direct commands
//! - **REPL** ([`repl`]) - line-oriented chat channel
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use foreman_bot::prelude::*;
//!
//! let roster = Arc::new(Roster::from_config(&config));
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let orchestrator = Orchestrator::builder(model)
//!     .tools(tools::registry(&roster, tx))
//!     .build()?;
//! ```

pub mod config;
pub mod error;
pub mod repl;
pub mod roster;
pub mod tools;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        AnthropicConfig, BotConfig, ConfigIssue, IssueLevel, TesterSeed, config_dir, config_path,
        init_config, load_config, save_config,
    };
    pub use crate::error::{
        BotError, ConfigError, ConfigResult, DisplayError, ErrorContext, Result, RosterError,
        RosterResult,
    };
    pub use crate::repl::{Repl, ReplConfig};
    pub use crate::roster::{Roster, TaskDraft, Tester};
    pub use crate::tools::{Outbound, Outbox};
}

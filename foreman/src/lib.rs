#![cfg_attr(docsrs, feature(doc_cfg))]
//! Foreman is the orchestration core of a chat bot that turns natural-language
//! requests into tool calls through a hosted language model.
//!
//! One inbound message flows through:
//!
//! 1. the [`ShortcutMatcher`](shortcut::ShortcutMatcher), which may answer
//!    immediately;
//! 2. the [`SessionStore`](session::SessionStore), an LRU-bounded history map;
//! 3. the [`Orchestrator`](orchestrator::Orchestrator) round loop, calling the
//!    model through a throttled, retrying
//!    [`ResilientClient`](retry::ResilientClient) and running requested tools
//!    through the permission-checking [`Dispatcher`](tool::Dispatcher).
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::prelude::*;
//!
//! let orchestrator = Orchestrator::builder(AnthropicClient::from_env()?)
//!     .tools(registry)
//!     .build()?;
//! let reply = orchestrator
//!     .handle(&Inbound::private("show the rating", 42, Role::Tester))
//!     .await;
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod prelude;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod role;
pub mod session;
pub mod shortcut;
pub mod throttle;
pub mod tool;

pub use error::{Error, LlmError, LlmErrorKind, Result};

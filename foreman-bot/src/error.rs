//! Unified error types for foreman-bot.
//!
//! Module-specific errors convert into the main [`BotError`] type, which
//! `main` maps to a process exit code.

use std::fmt;

use foreman::tool::ToolError;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for foreman-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Orchestration core error.
    #[error("core: {0}")]
    Core(#[from] foreman::Error),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Roster error.
    #[error("roster: {0}")]
    Roster(#[from] RosterError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for foreman-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Roster Errors
// ============================================================================

/// Error type for roster operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// No tester with that username.
    #[error("Tester @{0} not found")]
    TesterNotFound(String),

    /// The operation would not change anything.
    #[error("{0}")]
    Rejected(String),
}

impl RosterError {
    /// Create a not-found error.
    #[inline]
    pub fn not_found(username: impl Into<String>) -> Self {
        Self::TesterNotFound(username.into())
    }

    /// Create a rejection.
    #[inline]
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

impl From<RosterError> for ToolError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::TesterNotFound(_) => Self::not_found(err.to_string()),
            RosterError::Rejected(msg) => Self::failed(msg),
        }
    }
}

/// Result type for roster operations.
pub type RosterResult<T> = std::result::Result<T, RosterError>;

// ============================================================================
// Error Context Extension
// ============================================================================

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<BotError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", f(), err))
        })
    }
}

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a BotError);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BotError::Core(e) => write!(f, "Core error: {e}"),
            BotError::Config(e) => write!(f, "Configuration error: {e}"),
            BotError::Roster(e) => write!(f, "Roster error: {e}"),
            BotError::Io(e) => write!(f, "IO error: {e}"),
            BotError::Json(e) => write!(f, "JSON error: {e}"),
            BotError::Internal(e) => write!(f, "Internal error: {e}"),
        }
    }
}

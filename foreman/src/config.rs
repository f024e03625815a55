//! Orchestrator configuration.
//!
//! All fields carry defaults, so a partial JSON document deserializes into a
//! complete configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use crate::role::Role;

/// Default model for tool-enabled conversations.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Default model for small talk.
pub const DEFAULT_CHAT_MODEL: &str = "claude-haiku-4-5";

/// Per-role history limits, counted in user/assistant pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPairs {
    /// Owner limit.
    pub owner: usize,
    /// Admin limit.
    pub admin: usize,
    /// Tester limit.
    pub tester: usize,
}

impl Default for HistoryPairs {
    fn default() -> Self {
        Self {
            owner: 10,
            admin: 5,
            tester: 3,
        }
    }
}

impl HistoryPairs {
    /// Pair limit for a role.
    #[must_use]
    pub const fn for_role(&self, role: Role) -> usize {
        match role {
            Role::Owner => self.owner,
            Role::Admin => self.admin,
            Role::Tester => self.tester,
        }
    }
}

/// Model identifiers, with optional per-role overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelection {
    /// Model used when no override applies.
    pub default: String,
    /// Override for the owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Override for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    /// Override for testers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            default: DEFAULT_MODEL.to_string(),
            owner: None,
            admin: None,
            tester: None,
        }
    }
}

impl ModelSelection {
    /// Model variant for a role.
    #[must_use]
    pub fn for_role(&self, role: Role) -> &str {
        let overridden = match role {
            Role::Owner => self.owner.as_deref(),
            Role::Admin => self.admin.as_deref(),
            Role::Tester => self.tester.as_deref(),
        };
        overridden.unwrap_or(&self.default)
    }
}

/// Tunables of the orchestration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Minimum spacing between outbound model calls, in milliseconds.
    pub min_call_interval_ms: u64,
    /// Retry policy for transient model failures.
    pub retry: RetryConfig,
    /// Maximum tool-execution rounds per message.
    pub max_rounds: usize,
    /// Session store capacity.
    pub max_sessions: usize,
    /// Private history limit per role, in pairs.
    pub history_pairs: HistoryPairs,
    /// History limit of shared chat sessions, in turns.
    pub shared_history_messages: usize,
    /// Output token budget per call.
    pub max_tokens: u32,
    /// Models for tool-enabled conversations.
    pub models: ModelSelection,
    /// Model for small talk.
    pub chat_model: String,
    /// History limit of small-talk sessions, in turns.
    pub chat_history_messages: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 1000,
            retry: RetryConfig::default(),
            max_rounds: 5,
            max_sessions: 500,
            history_pairs: HistoryPairs::default(),
            shared_history_messages: 20,
            max_tokens: 1024,
            models: ModelSelection::default(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_history_messages: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Minimum spacing between outbound calls.
    #[must_use]
    pub const fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    /// Maximum turns kept for a session.
    ///
    /// Shared sessions use a flat cap; private ones twice the role's pair limit.
    #[must_use]
    pub const fn history_limit(&self, role: Role, shared: bool) -> usize {
        if shared {
            self.shared_history_messages
        } else {
            self.history_pairs.for_role(role) * 2
        }
    }

    /// Collect every configuration problem.
    #[must_use]
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.retry.max_attempts == 0 {
            issues.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.backoff_multiplier < 1.0 {
            issues.push("retry.backoff_multiplier must be at least 1.0".to_string());
        }
        if self.max_rounds == 0 {
            issues.push("max_rounds must be at least 1".to_string());
        }
        if self.max_sessions == 0 {
            issues.push("max_sessions must be at least 1".to_string());
        }
        if self.max_tokens == 0 {
            issues.push("max_tokens must be at least 1".to_string());
        }
        for role in Role::ALL {
            if self.history_pairs.for_role(role) == 0 {
                issues.push(format!("history_pairs.{role} must be at least 1"));
            }
        }
        if self.shared_history_messages == 0 {
            issues.push("shared_history_messages must be at least 1".to_string());
        }
        if self.models.default.trim().is_empty() {
            issues.push("models.default must not be empty".to_string());
        }
        if self.chat_model.trim().is_empty() {
            issues.push("chat_model must not be empty".to_string());
        }
        issues
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::config(issues.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.min_call_interval(), Duration::from_secs(1));
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.history_limit(Role::Owner, false), 20);
        assert_eq!(config.history_limit(Role::Tester, false), 6);
        assert_eq!(config.history_limit(Role::Tester, true), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: OrchestratorConfig = serde_json::from_value(json!({
            "max_rounds": 2,
            "history_pairs": {"tester": 1},
            "models": {"default": "m", "owner": "big"}
        }))
        .unwrap();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.history_pairs.tester, 1);
        assert_eq!(config.history_pairs.owner, 10);
        assert_eq!(config.models.for_role(Role::Owner), "big");
        assert_eq!(config.models.for_role(Role::Admin), "m");
        assert_eq!(config.max_sessions, 500);
    }

    #[test]
    fn test_validate_collects_issues() {
        let config = OrchestratorConfig {
            max_rounds: 0,
            max_sessions: 0,
            ..OrchestratorConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_rounds"));
        assert!(err.contains("max_sessions"));
    }
}

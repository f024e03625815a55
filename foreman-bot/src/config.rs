//! Bot configuration: a JSON file plus environment overrides.
//!
//! The file lives at `~/.foreman/config.json` unless `--config` or
//! `FOREMAN_CONFIG` points elsewhere. A missing file yields the defaults.

use foreman::config::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Provider connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// API key; `ANTHROPIC_API_KEY` wins when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 120,
        }
    }
}

/// A tester known at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesterSeed {
    /// Platform user id.
    pub id: i64,
    /// Username without `@`.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub full_name: String,
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// User id of the owner.
    pub owner_id: i64,
    /// User ids with admin rights.
    pub admins: Vec<i64>,
    /// Testers seeded into the roster.
    pub testers: Vec<TesterSeed>,
    /// Orchestration core settings.
    pub core: OrchestratorConfig,
    /// Provider settings.
    pub anthropic: AnthropicConfig,
    /// Extra canned replies, phrase to reply.
    pub canned_replies: BTreeMap<String, String>,
    /// Deployment-specific prompt instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            owner_id: 0,
            admins: Vec::new(),
            testers: Vec::new(),
            core: OrchestratorConfig::default(),
            anthropic: AnthropicConfig::default(),
            canned_replies: BTreeMap::new(),
            instructions: None,
        }
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot cannot run.
    Error,
    /// The bot runs, probably not as intended.
    Warning,
}

/// One finding of [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl BotConfig {
    /// Apply environment overrides through a lookup function.
    ///
    /// Recognized keys: `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`,
    /// `FOREMAN_MODEL`, `FOREMAN_OWNER_ID`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|v| !v.is_empty()) {
            self.anthropic.api_key = Some(key);
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL").filter(|v| !v.is_empty()) {
            self.anthropic.base_url = Some(url);
        }
        if let Some(model) = lookup("FOREMAN_MODEL").filter(|v| !v.is_empty()) {
            self.core.models.default = model;
        }
        if let Some(owner) = lookup("FOREMAN_OWNER_ID").and_then(|v| v.trim().parse().ok()) {
            self.owner_id = owner;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues: Vec<ConfigIssue> =
            self.core.issues().into_iter().map(ConfigIssue::error).collect();

        if self.anthropic.api_key.is_none() {
            issues.push(ConfigIssue::error(
                "no API key: set ANTHROPIC_API_KEY or anthropic.api_key",
            ));
        }
        if self.anthropic.timeout_secs == 0 {
            issues.push(ConfigIssue::error("anthropic.timeout_secs must be at least 1"));
        }
        if self.owner_id == 0 {
            issues.push(ConfigIssue::warning(
                "owner_id is not set: nobody can use owner-only tools",
            ));
        }
        if self.admins.contains(&self.owner_id) && self.owner_id != 0 {
            issues.push(ConfigIssue::warning("owner_id is also listed in admins"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for tester in &self.testers {
            if !seen.insert(tester.username.to_lowercase()) {
                issues.push(ConfigIssue::error(format!(
                    "duplicate tester username: {}",
                    tester.username
                )));
            }
        }
        issues
    }

    /// Whether validation found any error-level issue.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }
}

/// Directory holding foreman files.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".foreman")
}

/// Default configuration file path.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load the configuration from `path` (or the default path).
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_config(path: Option<&Path>) -> ConfigResult<BotConfig> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            debug!(path = %path.display(), "loading config");
            Ok(serde_json::from_str(&content)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config not found, using defaults");
            Ok(BotConfig::default())
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Write the configuration as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn save_config(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Write a default configuration to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn init_config(path: &Path) -> ConfigResult<BotConfig> {
    let config = BotConfig::default();
    save_config(&config, path).await?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("foreman-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("FOREMAN_MODEL", "claude-x"),
            ("FOREMAN_OWNER_ID", " 42 "),
            ("ANTHROPIC_BASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = BotConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.core.models.default, "claude-x");
        assert_eq!(config.owner_id, 42);
        assert!(config.anthropic.base_url.is_none());
    }

    #[test]
    fn test_validate() {
        let mut config = BotConfig::default();
        assert!(config.has_errors());

        config.anthropic.api_key = Some("k".into());
        config.owner_id = 1;
        assert!(!config.has_errors());

        config.testers = vec![
            TesterSeed {
                id: 1,
                username: "Kate".into(),
                full_name: String::new(),
            },
            TesterSeed {
                id: 2,
                username: "kate".into(),
                full_name: String::new(),
            },
        ];
        config.core.max_rounds = 0;
        let issues = config.validate();
        assert_eq!(
            issues
                .iter()
                .filter(|i| i.level == IssueLevel::Error)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let config = load_config(Some(&temp_path("absent.json"))).await.unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let path = temp_path("config.json");
        let mut config = init_config(&path).await.unwrap();
        config.owner_id = 7;
        config.canned_replies.insert("ping".into(), "pong".into());
        save_config(&config, &path).await.unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded, config);

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_partial_file() {
        let path = temp_path("partial.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"owner_id": 5, "core": {"max_rounds": 2}}"#)
            .await
            .unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.owner_id, 5);
        assert_eq!(config.core.max_rounds, 2);
        assert_eq!(config.core.max_sessions, 500);
    }
}

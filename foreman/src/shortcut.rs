//! Replies produced without consulting the model.
//!
//! Two tiers are checked in order:
//!
//! 1. **Canned replies**: an exact match on the normalized input
//!    (lower-cased, trimmed, trailing `!?.,)` stripped).
//! 2. **Direct commands**: a regular expression mapping the input to one
//!    read-only tool call whose JSON result is rendered by a fixed
//!    formatter.
//!
//! Matching is pure; the orchestrator runs the resulting tool call through
//! the dispatcher. Neither tier touches session history.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

type ArgsFn = dyn Fn(&Captures<'_>) -> Value + Send + Sync;
type RenderFn = dyn Fn(&Value) -> String + Send + Sync;

/// Normalize free text for canned-reply lookup.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(['!', '?', '.', ',', ')'])
        .to_string()
}

/// A pattern mapped deterministically to one tool call.
pub struct DirectCommand {
    pattern: Regex,
    tool: String,
    args: Box<ArgsFn>,
    render: Box<RenderFn>,
}

impl fmt::Debug for DirectCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectCommand")
            .field("pattern", &self.pattern.as_str())
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl DirectCommand {
    /// Create a command calling `tool` with empty arguments whenever
    /// `pattern` matches the trimmed input.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not compile.
    pub fn new(pattern: &str, tool: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            tool: tool.into(),
            args: Box::new(|_| Value::Object(serde_json::Map::new())),
            render: Box::new(Value::to_string),
        })
    }

    /// Build the tool arguments from the pattern captures.
    #[must_use]
    pub fn args(mut self, f: impl Fn(&Captures<'_>) -> Value + Send + Sync + 'static) -> Self {
        self.args = Box::new(f);
        self
    }

    /// Render a successful tool result as the reply.
    #[must_use]
    pub fn render(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.render = Box::new(f);
        self
    }

    /// Tool invoked by this command.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }
}

/// Result of a successful match.
#[derive(Debug)]
pub enum Shortcut<'a> {
    /// Fixed reply text.
    Canned(&'a str),
    /// A tool call to run, with its renderer.
    Direct {
        /// The matched command.
        command: &'a DirectCommand,
        /// Arguments built from the input.
        args: Value,
    },
}

impl Shortcut<'_> {
    /// Render the JSON result of a direct command.
    ///
    /// Results carrying an `error` key render as `⚠️ <error>`.
    #[must_use]
    pub fn render(command: &DirectCommand, result: &Value) -> String {
        match result.get("error") {
            Some(Value::String(err)) => format!("⚠️ {err}"),
            Some(err) => format!("⚠️ {err}"),
            None => (command.render)(result),
        }
    }
}

/// Two-tier shortcut matcher.
#[derive(Debug, Default)]
pub struct ShortcutMatcher {
    canned: HashMap<String, String>,
    commands: Vec<DirectCommand>,
}

impl ShortcutMatcher {
    /// Create an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canned reply; the phrase is normalized on insertion.
    #[must_use]
    pub fn canned(mut self, phrase: &str, reply: impl Into<String>) -> Self {
        self.canned.insert(normalize(phrase), reply.into());
        self
    }

    /// Add a direct command. Commands are tried in insertion order.
    #[must_use]
    pub fn command(mut self, command: DirectCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Number of canned phrases.
    #[must_use]
    pub fn canned_len(&self) -> usize {
        self.canned.len()
    }

    /// Registered direct commands.
    #[must_use]
    pub fn commands(&self) -> &[DirectCommand] {
        &self.commands
    }

    /// Match free text against both tiers.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<Shortcut<'_>> {
        if let Some(reply) = self.canned.get(&normalize(text)) {
            return Some(Shortcut::Canned(reply));
        }
        let trimmed = text.trim();
        self.commands.iter().find_map(|command| {
            command.pattern.captures(trimmed).map(|caps| Shortcut::Direct {
                command,
                args: (command.args)(&caps),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcher() -> ShortcutMatcher {
        ShortcutMatcher::new()
            .canned("hello", "👋")
            .canned("thanks", "👍")
            .command(
                DirectCommand::new(r"(?i)^(?:rating|top|leaderboard)$", "get_rating")
                    .unwrap()
                    .render(|v| format!("{} testers", v["testers"].as_array().map_or(0, Vec::len))),
            )
            .command(
                DirectCommand::new(r"(?i)^stats?\s+@?(\w+)$", "get_tester_stats")
                    .unwrap()
                    .args(|caps| json!({ "username": &caps[1] })),
            )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello!!! "), "hello");
        assert_eq!(normalize("Thanks.)"), "thanks");
        assert_eq!(normalize("What?!"), "what");
    }

    #[test]
    fn test_canned_match() {
        let matcher = matcher();
        assert!(matches!(matcher.find("HELLO!"), Some(Shortcut::Canned("👋"))));
        assert!(matches!(matcher.find("thanks,"), Some(Shortcut::Canned("👍"))));
        assert!(matcher.find("hello there").is_none());
    }

    #[test]
    fn test_direct_command_builds_args() {
        let matcher = matcher();
        let Some(Shortcut::Direct { command, args }) = matcher.find("Stats @kate") else {
            panic!("expected direct command");
        };
        assert_eq!(command.tool(), "get_tester_stats");
        assert_eq!(args, json!({"username": "kate"}));

        let Some(Shortcut::Direct { command, args }) = matcher.find("  top ") else {
            panic!("expected direct command");
        };
        assert_eq!(command.tool(), "get_rating");
        assert_eq!(args, json!({}));
    }

    #[test]
    fn test_render_errors_and_results() {
        let matcher = matcher();
        let rating = &matcher.commands()[0];
        assert_eq!(
            Shortcut::render(rating, &json!({"testers": [1, 2]})),
            "2 testers"
        );
        assert_eq!(
            Shortcut::render(rating, &json!({"error": "Tester not found"})),
            "⚠️ Tester not found"
        );
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(DirectCommand::new("(unclosed", "x").is_err());
    }
}

//! Tools over the roster, plus the canned replies and direct commands.

use async_trait::async_trait;
use foreman::role::Access;
use foreman::shortcut::{DirectCommand, ShortcutMatcher};
use foreman::tool::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry, parse_args};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::BotConfig;
use crate::roster::{MAX_WARNINGS, Roster, Tester};

/// A message a tool sends to the user on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipient chat (the caller for private conversations).
    pub chat_id: i64,
    /// Message text.
    pub text: String,
}

/// Sending half of the outbound channel.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

fn username_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "username": {"type": "string", "description": "Tester username, with or without @"}
        },
        "required": ["username"]
    })
}

fn stats_json(t: &Tester) -> Value {
    json!({
        "username": t.username,
        "full_name": t.full_name,
        "total_points": t.total_points,
        "total_bugs": t.total_bugs,
        "total_games": t.total_games,
        "warnings_count": t.warnings_count,
        "is_active": t.is_active,
    })
}

#[derive(Debug, Deserialize)]
struct UsernameArgs {
    username: String,
}

/// `get_tester_stats`: points, bugs, games and warnings of one tester.
#[derive(Debug)]
pub struct GetTesterStats(pub Arc<Roster>);

#[async_trait]
impl Tool for GetTesterStats {
    fn name(&self) -> &str {
        "get_tester_stats"
    }
    fn description(&self) -> &str {
        "Get the statistics of one tester: points, bugs, games and warnings."
    }
    fn input_schema(&self) -> Value {
        username_schema()
    }
    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: UsernameArgs = parse_args(args)?;
        let tester = self.0.stats(&args.username).await?;
        Ok(stats_json(&tester))
    }
}

/// `get_rating`: active testers ordered by points.
#[derive(Debug)]
pub struct GetRating(pub Arc<Roster>);

#[async_trait]
impl Tool for GetRating {
    fn name(&self) -> &str {
        "get_rating"
    }
    fn description(&self) -> &str {
        "Get the rating table of active testers ordered by points."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let testers: Vec<Value> = self
            .0
            .rating()
            .await
            .iter()
            .enumerate()
            .map(|(i, t)| json!({"rank": i + 1, "username": t.username, "points": t.total_points}))
            .collect();
        Ok(json!({ "testers": testers }))
    }
}

#[derive(Debug, Deserialize)]
struct AwardArgs {
    username: String,
    points: i64,
    #[serde(default)]
    reason: String,
}

/// `award_points`: add or subtract points.
#[derive(Debug)]
pub struct AwardPoints(pub Arc<Roster>);

#[async_trait]
impl Tool for AwardPoints {
    fn name(&self) -> &str {
        "award_points"
    }
    fn description(&self) -> &str {
        "Award points to a tester. Negative points deduct."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "username": {"type": "string"},
                "points": {"type": "integer"},
                "reason": {"type": "string"}
            },
            "required": ["username", "points"]
        })
    }
    fn access(&self) -> Access {
        Access::Privileged
    }
    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: AwardArgs = parse_args(args)?;
        let tester = self
            .0
            .award_points(&args.username, args.points, &args.reason)
            .await?;
        Ok(json!({
            "ok": true,
            "username": tester.username,
            "points_awarded": args.points,
            "total_points": tester.total_points,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct WarningArgs {
    username: String,
    #[serde(default)]
    reason: String,
}

/// `issue_warning`: record a warning against a tester.
#[derive(Debug)]
pub struct IssueWarning(pub Arc<Roster>);

#[async_trait]
impl Tool for IssueWarning {
    fn name(&self) -> &str {
        "issue_warning"
    }
    fn description(&self) -> &str {
        "Issue a warning to a tester. Testers are deactivated at the warning limit."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "username": {"type": "string"},
                "reason": {"type": "string"}
            },
            "required": ["username", "reason"]
        })
    }
    fn access(&self) -> Access {
        Access::Privileged
    }
    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: WarningArgs = parse_args(args)?;
        let tester = self.0.issue_warning(&args.username, &args.reason).await?;
        Ok(json!({
            "ok": true,
            "username": tester.username,
            "warnings_count": tester.warnings_count,
            "max_warnings": MAX_WARNINGS,
            "deactivated": !tester.is_active,
        }))
    }
}

/// `remove_warning`: remove one warning from a tester.
#[derive(Debug)]
pub struct RemoveWarning(pub Arc<Roster>);

#[async_trait]
impl Tool for RemoveWarning {
    fn name(&self) -> &str {
        "remove_warning"
    }
    fn description(&self) -> &str {
        "Remove one warning from a tester."
    }
    fn input_schema(&self) -> Value {
        username_schema()
    }
    fn access(&self) -> Access {
        Access::Privileged
    }
    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: UsernameArgs = parse_args(args)?;
        let tester = self.0.remove_warning(&args.username).await?;
        Ok(json!({
            "ok": true,
            "username": tester.username,
            "warnings_count": tester.warnings_count,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct TaskArgs {
    title: String,
    #[serde(default)]
    description: String,
}

/// `create_task`: draft a task and send it to the caller directly.
///
/// Silent: the draft message is the user-facing outcome.
#[derive(Debug)]
pub struct CreateTask {
    roster: Arc<Roster>,
    outbox: Outbox,
}

impl CreateTask {
    /// Create the tool over a roster and an outbound channel.
    #[must_use]
    pub const fn new(roster: Arc<Roster>, outbox: Outbox) -> Self {
        Self { roster, outbox }
    }
}

#[async_trait]
impl Tool for CreateTask {
    fn name(&self) -> &str {
        "create_task"
    }
    fn description(&self) -> &str {
        "Create a task draft for the testers and send it to the caller for review."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"}
            },
            "required": ["title"]
        })
    }
    fn access(&self) -> Access {
        Access::Privileged
    }
    fn silent(&self) -> bool {
        true
    }
    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolOutcome {
        let args: TaskArgs = parse_args(args)?;
        let draft = self
            .roster
            .create_task(&args.title, &args.description, ctx.caller_id)
            .await?;
        let mut text = format!("📝 Task draft\n\n{}", draft.title);
        if !draft.description.is_empty() {
            let _ = write!(text, "\n{}", draft.description);
        }
        self.outbox
            .send(Outbound {
                chat_id: ctx.chat_id.unwrap_or(ctx.caller_id),
                text,
            })
            .map_err(|_| ToolError::failed("Could not deliver the task draft"))?;
        Ok(json!({"ok": true, "task_id": draft.id.to_string()}))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AdminAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
struct AdminArgs {
    user_id: i64,
    action: AdminAction,
}

/// `manage_admin`: grant or revoke admin rights.
#[derive(Debug)]
pub struct ManageAdmin(pub Arc<Roster>);

#[async_trait]
impl Tool for ManageAdmin {
    fn name(&self) -> &str {
        "manage_admin"
    }
    fn description(&self) -> &str {
        "Grant or revoke admin rights for a user id."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {"type": "integer"},
                "action": {"type": "string", "enum": ["add", "remove"]}
            },
            "required": ["user_id", "action"]
        })
    }
    fn access(&self) -> Access {
        Access::OwnerOnly
    }
    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: AdminArgs = parse_args(args)?;
        let grant = matches!(args.action, AdminAction::Add);
        let changed = self.0.set_admin(args.user_id, grant).await?;
        Ok(json!({"ok": true, "user_id": args.user_id, "admin": grant, "changed": changed}))
    }
}

/// Register every roster tool.
#[must_use]
pub fn registry(roster: &Arc<Roster>, outbox: Outbox) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(GetTesterStats(Arc::clone(roster)))
        .register(GetRating(Arc::clone(roster)))
        .register(AwardPoints(Arc::clone(roster)))
        .register(IssueWarning(Arc::clone(roster)))
        .register(RemoveWarning(Arc::clone(roster)))
        .register(CreateTask::new(Arc::clone(roster), outbox))
        .register(ManageAdmin(Arc::clone(roster)));
    registry
}

const HELP: &str = "📋 Commands:\n\n\
• \"rating\": the tester table\n\
• \"stats @username\": one tester's points\n\
• \"give @username N points for ...\": award points\n\
• \"warn @username for ...\": issue a warning\n\
• \"remove warning @username\": remove a warning\n\
• \"task: ...\": draft a task";

fn render_rating(result: &Value) -> String {
    let Some(testers) = result["testers"].as_array().filter(|t| !t.is_empty()) else {
        return "🏆 The rating is empty.".to_string();
    };
    let mut out = String::from("🏆 Rating\n");
    for t in testers {
        let _ = write!(
            out,
            "\n{}. @{}: {}",
            t["rank"],
            t["username"].as_str().unwrap_or("?"),
            t["points"]
        );
    }
    out
}

fn render_stats(t: &Value) -> String {
    let name = t["username"]
        .as_str()
        .filter(|u| !u.is_empty())
        .or_else(|| t["full_name"].as_str())
        .unwrap_or("?");
    format!(
        "📊 Stats for {name}\n\n⭐ Points: {}\n📝 Bugs: {}\n🎮 Games: {}\n⚠️ Warnings: {}/{MAX_WARNINGS}",
        t["total_points"], t["total_bugs"], t["total_games"], t["warnings_count"]
    )
}

/// Canned replies and direct commands.
///
/// # Errors
///
/// Returns an error if a command pattern does not compile.
pub fn shortcuts(config: &BotConfig) -> foreman::Result<ShortcutMatcher> {
    let mut matcher = ShortcutMatcher::new();
    for phrase in ["hi", "hello", "hey", "bye"] {
        matcher = matcher.canned(phrase, "👋");
    }
    for phrase in ["thanks", "thank you", "ok", "okay"] {
        matcher = matcher.canned(phrase, "👍");
    }
    for phrase in ["cool", "great", "awesome"] {
        matcher = matcher.canned(phrase, "🔥");
    }
    matcher = matcher
        .canned("how are you", "All good, working.")
        .canned("who are you", "Foreman, the testing team coordinator 🤖")
        .canned("help", HELP);
    for (phrase, reply) in &config.canned_replies {
        matcher = matcher.canned(phrase, reply.clone());
    }

    Ok(matcher
        .command(
            DirectCommand::new(r"(?i)^(?:rating|top|leaderboard)$", "get_rating")?
                .render(render_rating),
        )
        .command(
            DirectCommand::new(r"(?i)^(?:stats?|statistics)\s+@?(\w+)$", "get_tester_stats")?
                .args(|caps| json!({ "username": &caps[1] }))
                .render(render_stats),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman::role::Role;
    use foreman::tool::Dispatcher;

    fn setup() -> (Dispatcher, Arc<Roster>, mpsc::UnboundedReceiver<Outbound>) {
        let roster = Arc::new(Roster::new(1));
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(registry(&roster, tx)));
        (dispatcher, roster, rx)
    }

    fn payload(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_award_and_stats() {
        let (dispatcher, roster, _rx) = setup();
        roster.add_tester(Tester::new(10, "kate", "Kate")).await;
        let admin = ToolContext::private(2, Role::Admin);

        let out = dispatcher
            .execute("award_points", r#"{"username": "@kate", "points": 15, "reason": "repro"}"#, &admin)
            .await;
        assert!(!out.is_error, "{}", out.payload);
        assert_eq!(payload(&out.payload)["total_points"], 15);

        let tester = ToolContext::private(10, Role::Tester);
        let out = dispatcher
            .execute("get_tester_stats", r#"{"username": "kate"}"#, &tester)
            .await;
        let stats = payload(&out.payload);
        assert_eq!(stats["total_points"], 15);
        assert!(render_stats(&stats).contains("Points: 15"));
    }

    #[tokio::test]
    async fn test_tester_cannot_warn() {
        let (dispatcher, roster, _rx) = setup();
        roster.add_tester(Tester::new(10, "kate", "Kate")).await;
        let tester = ToolContext::private(10, Role::Tester);

        let out = dispatcher
            .execute("issue_warning", r#"{"username": "kate", "reason": "x"}"#, &tester)
            .await;
        assert!(out.is_error);
        assert_eq!(roster.stats("kate").await.unwrap().warnings_count, 0);
    }

    #[tokio::test]
    async fn test_create_task_delivers_draft() {
        let (dispatcher, roster, mut rx) = setup();
        let admin = ToolContext::private(2, Role::Admin);

        let out = dispatcher
            .execute("create_task", r#"{"title": "Test installer", "description": "Windows 11"}"#, &admin)
            .await;
        assert!(out.silent);
        assert!(!out.is_error);

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.chat_id, 2);
        assert!(sent.text.contains("Test installer"));
        assert_eq!(roster.tasks().await.len(), 1);

        let out = dispatcher
            .execute("create_task", r#"{"title": ""}"#, &admin)
            .await;
        assert_eq!(out.error_message().as_deref(), Some("Task title is empty"));
    }

    #[tokio::test]
    async fn test_manage_admin_is_owner_only() {
        let (dispatcher, roster, _rx) = setup();
        let args = r#"{"user_id": 5, "action": "add"}"#;

        let out = dispatcher
            .execute("manage_admin", args, &ToolContext::private(2, Role::Admin))
            .await;
        assert_eq!(out.error_message().as_deref(), Some("Only the owner can do this"));

        let out = dispatcher
            .execute("manage_admin", args, &ToolContext::private(1, Role::Owner))
            .await;
        assert!(!out.is_error);
        assert_eq!(roster.role_of(5).await, Role::Admin);
    }

    #[test]
    fn test_render_rating() {
        assert_eq!(render_rating(&json!({"testers": []})), "🏆 The rating is empty.");
        let text = render_rating(&json!({"testers": [
            {"rank": 1, "username": "max", "points": 30},
            {"rank": 2, "username": "kate", "points": 10}
        ]}));
        assert!(text.contains("1. @max: 30"));
        assert!(text.contains("2. @kate: 10"));
    }

    #[test]
    fn test_shortcuts_include_config_replies() {
        let mut config = BotConfig::default();
        config.canned_replies.insert("ping".into(), "pong".into());
        let matcher = shortcuts(&config).unwrap();
        assert!(matches!(
            matcher.find("Ping!"),
            Some(foreman::shortcut::Shortcut::Canned("pong"))
        ));
        assert!(matcher.find("stats @kate").is_some());
        assert!(matcher.find("please show stats").is_none());
    }
}

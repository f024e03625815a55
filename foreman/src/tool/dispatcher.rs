//! Permission-checked tool execution.

use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ToolContext, ToolRegistry};
use crate::message::ToolResult;

/// Serialized outcome of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Tool name as requested.
    pub name: String,
    /// JSON payload; carries an `error` key iff the call failed.
    pub payload: String,
    /// Whether the call failed.
    pub is_error: bool,
    /// Whether the tool is registered as silent.
    pub silent: bool,
}

impl Dispatch {
    fn success(name: &str, value: &Value, silent: bool) -> Self {
        Self {
            name: name.to_string(),
            payload: value.to_string(),
            is_error: false,
            silent,
        }
    }

    fn failure(name: &str, message: &str, silent: bool) -> Self {
        Self {
            name: name.to_string(),
            payload: json!({ "error": message }).to_string(),
            is_error: true,
            silent,
        }
    }

    /// The error message, when the call failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error {
            return None;
        }
        serde_json::from_str::<Value>(&self.payload)
            .ok()
            .and_then(|v| v.get("error").map(error_text))
    }

    /// Pair the outcome with the originating call id.
    #[must_use]
    pub fn into_result(self, call_id: impl Into<String>) -> ToolResult {
        ToolResult {
            call_id: call_id.into(),
            payload: self.payload,
            is_error: self.is_error,
        }
    }
}

fn error_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}

/// Runs named tools on behalf of a caller.
///
/// Lookup, argument parsing, permission checks and tool failures all end in
/// a [`Dispatch`]; none of them escape as an error.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a tool from raw JSON arguments.
    ///
    /// Arguments that do not parse into a JSON object yield an error payload
    /// and the tool is not run.
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext) -> Dispatch {
        let silent = self.registry.is_silent(name);
        let args = if arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(arguments) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => return Dispatch::failure(name, "Arguments must be a JSON object", silent),
                Err(e) => {
                    warn!(tool = name, error = %e, "unparseable tool arguments");
                    return Dispatch::failure(name, &format!("Invalid arguments: {e}"), silent);
                }
            }
        };
        self.execute_value(name, args, ctx).await
    }

    /// Execute a tool from already-decoded arguments.
    pub async fn execute_value(&self, name: &str, args: Value, ctx: &ToolContext) -> Dispatch {
        let Some(tool) = self.registry.get(name) else {
            warn!(tool = name, "unknown tool requested");
            return Dispatch::failure(name, &format!("Unknown tool: {name}"), false);
        };
        let silent = tool.silent();

        let access = tool.access();
        if !ctx.role.allows(access) {
            warn!(
                tool = name,
                caller = ctx.caller_id,
                role = %ctx.role,
                ?access,
                "tool call denied"
            );
            return Dispatch::failure(name, access.denial_message(), silent);
        }

        debug!(tool = name, caller = ctx.caller_id, "executing tool");
        match tool.invoke(args, ctx).await {
            // A tool may report a domain failure inside its own payload.
            Ok(value) if value.get("error").is_some() => {
                let message = value.get("error").map(error_text).unwrap_or_default();
                debug!(tool = name, error = %message, "tool reported failure");
                Dispatch::failure(name, &message, silent)
            }
            Ok(value) => Dispatch::success(name, &value, silent),
            Err(e) => {
                warn!(tool = name, error = %e, "tool failed");
                Dispatch::failure(name, &e.to_string(), silent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{Access, Role};
    use crate::tool::{Tool, ToolError, ToolOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Spy {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for Spy {
        fn name(&self) -> &str {
            "issue_warning"
        }
        fn description(&self) -> &str {
            "spy"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        fn access(&self) -> Access {
            Access::Privileged
        }
        async fn invoke(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match args.get("fail").and_then(Value::as_str) {
                Some("err") => Err(ToolError::failed("storage offline")),
                Some("payload") => Ok(json!({"error": "Tester not found"})),
                _ => Ok(json!({"ok": true, "echo": args})),
            }
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<Spy>) {
        let spy = Arc::new(Spy::default());
        let mut registry = ToolRegistry::new();
        registry.register_arc(spy.clone());
        (Dispatcher::new(Arc::new(registry)), spy)
    }

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).unwrap()
    }

    #[tokio::test]
    async fn test_denied_call_never_reaches_tool() {
        let (dispatcher, spy) = dispatcher();
        let ctx = ToolContext::private(1, Role::Tester);

        let out = dispatcher.execute("issue_warning", "{}", &ctx).await;
        assert!(out.is_error);
        assert_eq!(
            parse(&out.payload)["error"],
            Access::Privileged.denial_message()
        );
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_call_succeeds_without_error_key() {
        let (dispatcher, spy) = dispatcher();
        let ctx = ToolContext::private(1, Role::Admin);

        let out = dispatcher
            .execute("issue_warning", r#"{"username": "kate"}"#, &ctx)
            .await;
        assert!(!out.is_error);
        let payload = parse(&out.payload);
        assert!(payload.get("error").is_none());
        assert_eq!(payload["echo"]["username"], "kate");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_yield_error() {
        let (dispatcher, spy) = dispatcher();
        let ctx = ToolContext::private(1, Role::Owner);

        let out = dispatcher.execute("issue_warning", "{not json", &ctx).await;
        assert!(out.is_error);
        assert!(parse(&out.payload).get("error").is_some());

        let out = dispatcher.execute("issue_warning", "[1, 2]", &ctx).await;
        assert!(out.is_error);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_failures_become_error_payloads() {
        let (dispatcher, _) = dispatcher();
        let ctx = ToolContext::private(1, Role::Owner);

        let out = dispatcher
            .execute("issue_warning", r#"{"fail": "err"}"#, &ctx)
            .await;
        assert_eq!(out.error_message().as_deref(), Some("storage offline"));

        let out = dispatcher
            .execute("issue_warning", r#"{"fail": "payload"}"#, &ctx)
            .await;
        assert!(out.is_error);
        assert_eq!(out.error_message().as_deref(), Some("Tester not found"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, _) = dispatcher();
        let ctx = ToolContext::private(1, Role::Owner);
        let out = dispatcher.execute("drop_tables", "{}", &ctx).await;
        assert!(out.is_error);
        assert_eq!(
            out.error_message().as_deref(),
            Some("Unknown tool: drop_tables")
        );
        let result = out.into_result("call_1");
        assert_eq!(result.call_id, "call_1");
        assert!(result.is_error);
    }
}

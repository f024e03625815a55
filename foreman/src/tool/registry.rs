//! Name-keyed tool registry.

use indexmap::IndexMap;
use std::sync::Arc;

use super::{Tool, ToolDefinition};
use crate::role::Role;

/// Registered tools in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool, replacing any tool with the same name.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Whether a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Whether the named tool is registered as silent.
    #[must_use]
    pub fn is_silent(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.silent())
    }

    /// Definitions of the tools `role` is allowed to call.
    #[must_use]
    pub fn definitions_for(&self, role: Role) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .filter(|t| role.allows(t.access()))
            .map(|t| t.definition())
            .collect()
    }

    /// Registered tool names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Names of silent tools.
    #[must_use]
    pub fn silent_names(&self) -> Vec<&str> {
        self.tools
            .values()
            .filter(|t| t.silent())
            .map(|t| t.name())
            .collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Access;
    use crate::tool::{ToolContext, ToolOutcome};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Fixed {
        name: &'static str,
        access: Access,
        silent: bool,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fixed"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn access(&self) -> Access {
            self.access
        }
        fn silent(&self) -> bool {
            self.silent
        }
        async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
            Ok(json!({}))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Fixed {
                name: "get_rating",
                access: Access::Open,
                silent: false,
            })
            .register(Fixed {
                name: "create_task",
                access: Access::Privileged,
                silent: true,
            })
            .register(Fixed {
                name: "manage_admin",
                access: Access::OwnerOnly,
                silent: false,
            });
        registry
    }

    #[test]
    fn test_visibility_by_role() {
        let registry = registry();
        let names = |role| {
            registry
                .definitions_for(role)
                .into_iter()
                .map(|d| d.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Role::Tester), vec!["get_rating"]);
        assert_eq!(names(Role::Admin), vec!["get_rating", "create_task"]);
        assert_eq!(names(Role::Owner).len(), 3);
    }

    #[test]
    fn test_silent_lookup() {
        let registry = registry();
        assert!(registry.is_silent("create_task"));
        assert!(!registry.is_silent("get_rating"));
        assert!(!registry.is_silent("missing"));
        assert_eq!(registry.silent_names(), vec!["create_task"]);
    }
}

//! Session-wide tool registry. Agents bind to tools by name, never by position.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::Tool;
use crate::error::{OctoragError, Result};
use crate::provider::ToolDefinition;

/// Ordered, name-indexed collection of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(OctoragError::Configuration(format!(
                "tool '{name}' registered twice"
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve named tools into provider definitions, keeping the caller's order.
    pub fn definitions_for(&self, names: &[String]) -> Result<Vec<ToolDefinition>> {
        names
            .iter()
            .map(|name| {
                self.get(name).map(|tool| ToolDefinition::from_tool(tool.as_ref())).ok_or_else(|| {
                    OctoragError::Configuration(format!("unknown tool '{name}'"))
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, AgentToolParameters};

    fn named(name: &str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            "test tool",
            AgentToolParameters::empty(),
            |_args, _ctx| async { Ok(String::new()) },
        ))
    }

    #[test]
    fn binding_by_name_ignores_registration_order() {
        let forward = ToolRegistry::from_tools([named("a"), named("b")]).unwrap();
        let reversed = ToolRegistry::from_tools([named("b"), named("a")]).unwrap();
        let wanted = vec!["a".to_string()];
        assert_eq!(forward.definitions_for(&wanted).unwrap()[0].name, "a");
        assert_eq!(reversed.definitions_for(&wanted).unwrap()[0].name, "a");
    }

    #[test]
    fn unknown_tool_name_is_a_configuration_error() {
        let registry = ToolRegistry::from_tools([named("a")]).unwrap();
        let err = registry.definitions_for(&["zzz".to_string()]).unwrap_err();
        assert!(matches!(err, OctoragError::Configuration(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(ToolRegistry::from_tools([named("a"), named("a")]).is_err());
    }
}

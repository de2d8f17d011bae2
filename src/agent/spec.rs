//! Agent identities, specifications and the pipeline roster.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OctoragError, Result};

/// Agent identifier.
///
/// The same string is the router state id and the literal matched during
/// hand-off detection, so it must stay human readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Static description of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: AgentName,
    pub system_prompt: String,
    /// Tool names this agent may request, resolved against the registry by name.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Agents this agent may hand off to, in match priority order.
    #[serde(default)]
    pub successors: Vec<AgentName>,
}

impl AgentSpec {
    pub fn new(name: impl Into<AgentName>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            allowed_tools: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_successors<I, S>(mut self, successors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AgentName>,
    {
        self.successors = successors.into_iter().map(Into::into).collect();
        self
    }

    pub fn allows_tool(&self, tool_name: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool_name)
    }
}

/// Ordered set of agents; the first one is the entry agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    agents: Vec<AgentSpec>,
}

impl Roster {
    /// Build a roster, checking that names are unique and every successor exists.
    pub fn new(agents: Vec<AgentSpec>) -> Result<Self> {
        if agents.is_empty() {
            return Err(OctoragError::Configuration(
                "agent roster must contain at least one agent".into(),
            ));
        }
        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name.as_str().to_lowercase()) {
                return Err(OctoragError::Configuration(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }
        for agent in &agents {
            for successor in &agent.successors {
                if !agents.iter().any(|a| &a.name == successor) {
                    return Err(OctoragError::Configuration(format!(
                        "agent '{}' hands off to unknown agent '{}'",
                        agent.name, successor
                    )));
                }
            }
        }
        Ok(Self { agents })
    }

    /// The agent a fresh run starts with.
    pub fn entry(&self) -> &AgentSpec {
        &self.agents[0]
    }

    pub fn get(&self, name: &AgentName) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| &a.name == name)
    }

    pub fn contains(&self, name: &AgentName) -> bool {
        self.get(name).is_some()
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn names(&self) -> impl Iterator<Item = &AgentName> {
        self.agents.iter().map(|a| &a.name)
    }
}

//! What an agent can call, and the closure form the GitHub tools use.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::agent::AgentName;
use crate::error::OctoragError;

/// Which call, agent, and thread a tool is answering.
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    pub tool_call_id: String,
    /// The agent whose message carried the call.
    pub agent: AgentName,
    pub thread_id: String,
}

/// A capability registered by name. Agents see it only if their allow list
/// names it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key, and the name the model calls it by.
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &AgentToolParameters;

    /// The returned text becomes the tool-result message. An `Err` is recorded
    /// as an error result; it never aborts the run.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<String, OctoragError>;
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, OctoragError>> + Send>>
    + Send
    + Sync;

/// A tool whose body is an async closure.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, OctoragError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<String, OctoragError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

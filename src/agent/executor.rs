//! One agent's invocation contract: state in, one tagged message out.

use std::sync::Arc;

use tracing::debug;

use super::spec::AgentSpec;
use crate::error::{OctoragError, Result};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::ToolRegistry;
use crate::types::{GenerationSettings, Message};
use crate::util::retry::RetryPolicy;

/// Wraps one agent: its prompt, its bound tool definitions and the provider.
///
/// Tool definitions are resolved by name when the executor is built, so the
/// registry's order has no influence on which tools an agent sees.
#[derive(Clone)]
pub struct AgentExecutor {
    spec: AgentSpec,
    provider: Arc<dyn ModelProvider>,
    tools: Vec<ToolDefinition>,
    settings: GenerationSettings,
    retry: Option<RetryPolicy>,
}

impl AgentExecutor {
    pub fn new(
        spec: AgentSpec,
        provider: Arc<dyn ModelProvider>,
        registry: &ToolRegistry,
        settings: GenerationSettings,
    ) -> Result<Self> {
        let tools = registry.definitions_for(&spec.allowed_tools).map_err(|e| {
            OctoragError::Configuration(format!("agent '{}': {e}", spec.name))
        })?;
        Ok(Self {
            spec,
            provider,
            tools,
            settings,
            retry: None,
        })
    }

    /// Retry transient provider failures with this policy.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// Tool definitions declared to the model on every call.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Produce this agent's next message from the conversation so far.
    ///
    /// The system prompt is prepended for the model call only; the returned
    /// message is not yet part of any state.
    pub async fn invoke(&self, history: &[Message]) -> Result<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.spec.system_prompt.clone()));
        messages.extend(history.iter().cloned());

        let request = ProviderRequest {
            messages,
            tools: self.tools.clone(),
            settings: self.settings.clone(),
        };

        debug!(
            agent = %self.spec.name,
            provider = self.provider.provider_name(),
            model = self.provider.model_id(),
            history = history.len(),
            "invoking agent"
        );

        let response = match &self.retry {
            Some(policy) => policy.execute(|| self.provider.invoke(&request)).await,
            None => self.provider.invoke(&request).await,
        }
        .map_err(|e| OctoragError::model_invocation(self.spec.name.as_str(), e))?;

        let mut tool_calls = response.tool_calls;
        for call in tool_calls.iter_mut().filter(|c| c.id.is_empty()) {
            call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
        }

        Ok(Message::agent(self.spec.name.as_str(), response.content).with_tool_calls(tool_calls))
    }
}

impl std::fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("agent", &self.spec.name)
            .field("model", &self.provider.model_id())
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish()
    }
}

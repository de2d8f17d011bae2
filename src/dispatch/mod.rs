//! Tool dispatch: run an agent's pending calls and turn outcomes into messages.
//!
//! Dispatch never fails. Unknown tools, invalid arguments, tool errors,
//! panics and timeouts all become error-text tool results so the issuing
//! agent can react on its next turn.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::agent::AgentSpec;
use crate::config::DEFAULT_TOOL_TIMEOUT_SECS;
use crate::error::OctoragError;
use crate::tools::validation::validate_arguments;
use crate::tools::{ToolArguments, ToolExecutionContext, ToolRegistry};
use crate::types::{Message, ToolCall};
use crate::util::timeout::with_timeout;

/// Executes tool calls against the session's registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    enforce_allow_list: bool,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            enforce_allow_list: false,
        }
    }

    /// Per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// When set, calls to tools outside the issuing agent's allow-list are
    /// refused with an error result instead of executed.
    pub fn with_allow_list_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_allow_list = enforce;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve every call in order, one result message per call.
    pub async fn dispatch(&self, agent: &AgentSpec, thread_id: &str, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatch_one(agent, thread_id, call).await);
        }
        results
    }

    /// Resolve a single call into its result message.
    pub async fn dispatch_one(&self, agent: &AgentSpec, thread_id: &str, call: &ToolCall) -> Message {
        match self.execute(agent, thread_id, call).await {
            Ok(text) => {
                debug!(agent = %agent.name, tool = %call.tool_name, call_id = %call.id, "tool call succeeded");
                Message::tool_result(&call.id, text, false)
            }
            Err(e) => {
                warn!(agent = %agent.name, tool = %call.tool_name, call_id = %call.id, error = %e, "tool call failed");
                Message::tool_result(
                    &call.id,
                    format!("Error running {} for call {}: {e}", call.tool_name, call.id),
                    true,
                )
            }
        }
    }

    async fn execute(&self, agent: &AgentSpec, thread_id: &str, call: &ToolCall) -> Result<String, OctoragError> {
        let tool = self.registry.get(&call.tool_name).ok_or_else(|| OctoragError::ToolExecution {
            tool_name: call.tool_name.clone(),
            message: "no such tool is registered".into(),
        })?;

        if self.enforce_allow_list && !agent.allows_tool(&call.tool_name) {
            return Err(OctoragError::ToolExecution {
                tool_name: call.tool_name.clone(),
                message: format!("agent '{}' is not allowed to use this tool", agent.name),
            });
        }

        let args = ToolArguments::new(call.arguments.clone());
        let args = match args.raw() {
            serde_json::Value::String(_) | serde_json::Value::Null => {
                ToolArguments::new(args.deserialize::<serde_json::Value>()?)
            }
            _ => args,
        };
        validate_arguments(args.raw(), &tool.parameters().schema)
            .map_err(OctoragError::InvalidArgument)?;

        let ctx = ToolExecutionContext {
            tool_call_id: call.id.clone(),
            agent: agent.name.clone(),
            thread_id: thread_id.to_string(),
        };

        let run = AssertUnwindSafe(tool.execute(&args, &ctx)).catch_unwind();
        match with_timeout(self.timeout, async { Ok(run.await) }).await? {
            Ok(result) => result,
            Err(_) => Err(OctoragError::ToolExecution {
                tool_name: call.tool_name.clone(),
                message: "tool panicked".into(),
            }),
        }
    }
}

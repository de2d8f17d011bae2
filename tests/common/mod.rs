//! Shared test helpers and mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use octorag::config::SessionSettings;
use octorag::error::OctoragError;
use octorag::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use octorag::runner::Orchestrator;
use octorag::tools::{AgentTool, AgentToolParameters, Tool};
use octorag::types::*;

pub const GITHUB_TOOL_NAMES: [&str; 7] = [
    "query_for_github_repos",
    "get_readme",
    "get_repo_tree",
    "get_file_contents",
    "create_repo",
    "create_file",
    "append_to_file",
];

/// A mock provider that replays queued responses and records every request.
///
/// Once the queue is empty it keeps answering with `fallback`.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, OctoragError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    fallback: String,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::with_fallback("Mock response")
    }

    pub fn with_fallback(text: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: text.to_string(),
            delay: None,
        }
    }

    /// Sleep for `delay` after recording each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a text response.
    pub fn queue_text(&self, text: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ProviderResponse::text(text)));
        self
    }

    /// Queue a response carrying tool calls (and optional text).
    pub fn queue_tool_calls(&self, text: &str, calls: Vec<ToolCall>) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(ProviderResponse {
            content: MessageContent::Text(text.to_string()),
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }));
        self
    }

    pub fn queue_error(&self, error: OctoragError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The system prompt of every request, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.messages[0].text())
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, OctoragError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderResponse::text(self.fallback.clone())))
    }
}

/// Provider whose answer is computed from the request.
pub struct FnProvider<F>(pub F);

#[async_trait]
impl<F> ModelProvider for FnProvider<F>
where
    F: Fn(&ProviderRequest) -> ProviderResponse + Send + Sync,
{
    fn provider_name(&self) -> &str {
        "fn"
    }

    fn model_id(&self) -> &str {
        "fn-model"
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, OctoragError> {
        tokio::task::yield_now().await;
        Ok((self.0)(request))
    }
}

/// Stand-ins for the GitHub tools: each answers `"{name} ok"`.
pub fn stub_github_tools() -> Vec<Arc<dyn Tool>> {
    GITHUB_TOOL_NAMES
        .iter()
        .map(|name| {
            let name = name.to_string();
            let reply = format!("{name} ok");
            Arc::new(AgentTool::new(
                name,
                "stub",
                AgentToolParameters::empty(),
                move |_args, _ctx| {
                    let reply = reply.clone();
                    async move { Ok(reply) }
                },
            )) as Arc<dyn Tool>
        })
        .collect()
}

pub fn settings_with_limit(step_limit: usize) -> SessionSettings {
    SessionSettings {
        step_limit,
        ..SessionSettings::default()
    }
}

/// Default pipeline over a mock provider and stub tools.
pub fn orchestrator(provider: Arc<dyn ModelProvider>) -> Orchestrator {
    orchestrator_with(provider, SessionSettings::default())
}

pub fn orchestrator_with(provider: Arc<dyn ModelProvider>, settings: SessionSettings) -> Orchestrator {
    Orchestrator::builder()
        .provider(provider)
        .tools(stub_github_tools())
        .settings(settings)
        .build()
        .expect("orchestrator builds")
}

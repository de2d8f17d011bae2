//! Step runner: drives executor → router → (dispatch →) executor in a bounded loop.

pub mod events;
pub mod types;

pub use events::{RunEvent, RunEventPayload, RunEventSink, RunLifecycle};
pub use types::{RunId, RunOutcome, RunRequest, TerminationReason};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::agent::{default_roster, AgentExecutor, AgentName, Roster};
use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::config::{OctoragConfig, SessionSettings};
use crate::dispatch::ToolDispatcher;
use crate::error::{OctoragError, Result};
use crate::models::LanguageModel;
use crate::provider::{create_provider, ModelProvider};
use crate::router::{contains_sentinel, Router, Transition};
use crate::state::ConversationState;
use crate::tools::{Tool, ToolRegistry};
use crate::types::{GenerationSettings, Message};
use crate::util::retry::RetryPolicy;
use events::RunEventEmitter;

/// The multi-agent pipeline for one session.
///
/// Cheap to clone; clones share the provider, tools and checkpoint store.
/// Runs on distinct thread ids are independent and may execute concurrently.
#[derive(Clone)]
pub struct Orchestrator {
    router: Arc<Router>,
    executors: Arc<HashMap<AgentName, AgentExecutor>>,
    dispatcher: ToolDispatcher,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: Arc<SessionSettings>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Default pipeline with the provider and tools described by `config`.
    pub fn from_config(config: OctoragConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Like [`Orchestrator::from_config`], but connects to `session.mcp_url`
    /// when set and uses the tools it serves.
    pub async fn connect(config: OctoragConfig) -> Result<Self> {
        Self::builder().config(config).build_async().await
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn roster(&self) -> &Roster {
        self.router.roster()
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Run a query to completion and return the last agent text.
    pub async fn query(&self, input: impl Into<String>) -> Result<String> {
        let outcome = self.run(RunRequest::new(input)).await?;
        Ok(outcome.final_text.unwrap_or_default())
    }

    /// Run a query, yielding every agent text as it is produced.
    ///
    /// A failed run yields its error as the last item.
    pub fn query_stream(&self, input: impl Into<String>) -> BoxStream<'static, Result<String>> {
        self.run_stream(RunRequest::new(input))
    }

    /// Streaming form of [`Orchestrator::run`]. Any sink on the request still
    /// receives every event.
    ///
    /// Nothing runs until the stream is first polled, and dropping the stream
    /// aborts the run at its next suspension point.
    pub fn run_stream(&self, mut request: RunRequest) -> BoxStream<'static, Result<String>> {
        let this = self.clone();
        Box::pin(async_stream::stream! {
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let inner_sink = request.event_sink.take();
            let sink: RunEventSink = Arc::new(move |event: RunEvent| {
                if let RunEventPayload::AgentMessage { text, .. } = &event.payload {
                    if tx.send(text.clone()).is_err() {
                        debug!(run_id = %event.run_id, "stream receiver closed; agent text not forwarded");
                    }
                }
                if let Some(inner) = &inner_sink {
                    inner(event);
                }
            });
            let request = request.with_event_sink(sink);

            let handle = tokio::spawn(async move { this.run(request).await });
            let _abort = AbortOnDrop(handle.abort_handle());

            while let Some(text) = rx.recv().await {
                yield Ok(text);
            }
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => yield Err(e),
                Err(join_error) => {
                    yield Err(OctoragError::InvalidState(format!("run task failed: {join_error}")))
                }
            }
        })
    }

    /// Run a query to the terminal state.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let thread_id = request
            .thread_id
            .clone()
            .unwrap_or_else(|| self.settings.thread_id.clone());
        let limit = request.step_limit.unwrap_or(self.settings.step_limit);
        let emitter = RunEventEmitter::new(request.run_id, thread_id.clone(), request.event_sink);

        info!(run_id = %request.run_id, thread_id = %thread_id, step_limit = limit, "run started");
        emitter.lifecycle(RunLifecycle::Started);

        let result = self
            .drive(request.run_id, &thread_id, request.input, limit, &emitter)
            .await;

        match &result {
            Ok(outcome) => {
                info!(run_id = %request.run_id, thread_id = %thread_id, steps = outcome.steps, "run completed");
                emitter.lifecycle(RunLifecycle::Completed);
            }
            Err(e) => {
                warn!(run_id = %request.run_id, thread_id = %thread_id, error = %e, "run failed");
                emitter.lifecycle(RunLifecycle::Failed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn drive(
        &self,
        run_id: RunId,
        thread_id: &str,
        input: String,
        limit: usize,
        emitter: &RunEventEmitter,
    ) -> Result<RunOutcome> {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(thread_id));
        state.append(Message::user(input))?;

        let mut current = self.router.roster().entry().name.clone();
        state.set_current_agent(current.clone());

        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > limit {
                warn!(thread_id, limit, "step limit exceeded");
                return Err(OctoragError::StepLimitExceeded { limit });
            }

            let executor = self.executors.get(&current).ok_or_else(|| {
                OctoragError::InvalidState(format!("no executor for agent '{current}'"))
            })?;
            debug!(thread_id, step = steps, agent = %current, "agent step");

            let message = executor.invoke(state.messages()).await?;
            let text = message.text();
            let calls = message.tool_calls.clone();
            state.append(message)?;
            state.set_current_agent(current.clone());
            if !text.trim().is_empty() {
                emitter.emit(RunEventPayload::AgentMessage {
                    agent: current.clone(),
                    step: steps,
                    text,
                });
            }

            let decision = self.router.route(&state);
            for message in decision.messages_to_append {
                state.append(message)?;
            }

            match decision.transition {
                Transition::DispatchTools { agent } => {
                    for call in &calls {
                        emitter.emit(RunEventPayload::ToolCallStarted {
                            agent: agent.clone(),
                            call: call.clone(),
                        });
                        let result = self.dispatcher.dispatch_one(executor.spec(), thread_id, call).await;
                        emitter.emit(RunEventPayload::ToolResult {
                            call_id: call.id.clone(),
                            text: result.text(),
                            is_error: result.is_error,
                        });
                        state.append(result)?;
                    }
                }
                Transition::HandOff { from, to } => {
                    info!(thread_id, from = %from, to = %to, "hand-off");
                    emitter.emit(RunEventPayload::HandOff {
                        from,
                        to: to.clone(),
                    });
                    current = to;
                    state.set_current_agent(current.clone());
                }
                Transition::Terminate => {
                    self.commit(&state, steps, emitter).await?;
                    let reason = match state.last_message() {
                        Some(last) if contains_sentinel(&last.content, self.router.sentinel()) => {
                            TerminationReason::Sentinel
                        }
                        _ => TerminationReason::Unroutable,
                    };
                    return Ok(RunOutcome {
                        run_id,
                        thread_id: thread_id.to_string(),
                        final_text: state.last_agent_text(),
                        steps,
                        reason,
                        last_agent: state.current_agent().cloned(),
                        state: state.snapshot(),
                    });
                }
                Transition::Stay { .. } => {}
            }

            self.commit(&state, steps, emitter).await?;
        }
    }

    /// Persist the state and publish it as the snapshot for `step`.
    async fn commit(
        &self,
        state: &ConversationState,
        step: usize,
        emitter: &RunEventEmitter,
    ) -> Result<()> {
        self.checkpoints.save(state.thread_id(), state).await?;
        emitter.emit(RunEventPayload::Snapshot {
            step,
            snapshot: state.snapshot(),
        });
        Ok(())
    }
}

/// Aborts the spawned run when the stream that owns it is dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.router.roster().names().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Builder for [`Orchestrator`]. Unset parts fall back to the config.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<OctoragConfig>,
    settings: Option<SessionSettings>,
    roster: Option<Roster>,
    provider: Option<Arc<dyn ModelProvider>>,
    tools: Vec<Arc<dyn Tool>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OctoragConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides `config.session`.
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn roster(mut self, roster: Roster) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register a tool. When no tool is registered the GitHub tools are used.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Build with tools discovered from the configured MCP server, if any and
    /// if no tool was registered explicitly.
    pub async fn build_async(self) -> Result<Orchestrator> {
        match self.mcp_url() {
            Some(url) if self.tools.is_empty() => {
                let tools = discover_mcp_tools(&url).await?;
                if tools.is_empty() {
                    return Err(OctoragError::Configuration(format!(
                        "MCP server at {url} serves no tools"
                    )));
                }
                self.tools(tools).build()
            }
            _ => self.build(),
        }
    }

    fn mcp_url(&self) -> Option<String> {
        self.settings
            .as_ref()
            .or(self.config.as_ref().map(|config| &config.session))
            .and_then(|settings| settings.mcp_url.clone())
    }

    pub fn build(self) -> Result<Orchestrator> {
        if self.tools.is_empty() && self.mcp_url().is_some() {
            warn!("mcp_url is only honored by build_async; using the built-in tools");
        }
        let mut config = self.config.unwrap_or_default();
        if let Some(settings) = self.settings {
            config.session = settings;
        }
        config.validate()?;
        let settings = config.session.clone();

        let roster = match self.roster {
            Some(roster) => roster,
            None => default_roster()?,
        };

        let provider = match self.provider {
            Some(provider) => provider,
            None => create_provider(&LanguageModel::from_str(&settings.model)?, &config)?,
        };

        let tools = if self.tools.is_empty() {
            default_tools(&config)?
        } else {
            self.tools
        };
        let registry = Arc::new(ToolRegistry::from_tools(tools)?);

        let generation = GenerationSettings::builder()
            .maybe_max_tokens(settings.max_tokens)
            .maybe_temperature(settings.temperature)
            .build();

        let mut executors = HashMap::new();
        for spec in roster.agents() {
            let mut executor =
                AgentExecutor::new(spec.clone(), provider.clone(), &registry, generation.clone())?;
            if settings.model_retries > 0 {
                executor = executor.with_retry(RetryPolicy::with_retries(settings.model_retries));
            }
            executors.insert(spec.name.clone(), executor);
        }

        let dispatcher = ToolDispatcher::new(registry)
            .with_timeout(settings.tool_timeout())
            .with_allow_list_enforcement(settings.enforce_allow_list);

        let checkpoints: Arc<dyn CheckpointStore> = match (self.checkpoints, &settings.checkpoint_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileCheckpointStore::new(dir.clone())),
            (None, None) => Arc::new(MemoryCheckpointStore::new()),
        };

        Ok(Orchestrator {
            router: Arc::new(Router::new(roster, settings.termination_sentinel.clone())),
            executors: Arc::new(executors),
            dispatcher,
            checkpoints,
            settings: Arc::new(settings),
        })
    }
}

#[cfg(feature = "mcp")]
async fn discover_mcp_tools(url: &str) -> Result<Vec<Arc<dyn Tool>>> {
    crate::mcp::discover_tools(url).await
}

#[cfg(not(feature = "mcp"))]
async fn discover_mcp_tools(url: &str) -> Result<Vec<Arc<dyn Tool>>> {
    Err(OctoragError::Configuration(format!(
        "mcp_url is set to {url} but octorag was built without the `mcp` feature"
    )))
}

#[cfg(feature = "github")]
fn default_tools(config: &OctoragConfig) -> Result<Vec<Arc<dyn Tool>>> {
    let client = crate::tools::GitHubClient::from_config(config)?;
    if !client.has_token() {
        warn!("no GitHub token configured; repository creation and rate limits will suffer");
    }
    Ok(crate::tools::github_tools(client))
}

#[cfg(not(feature = "github"))]
fn default_tools(_config: &OctoragConfig) -> Result<Vec<Arc<dyn Tool>>> {
    Ok(Vec::new())
}

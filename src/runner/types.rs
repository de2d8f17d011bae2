//! Run request and outcome types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::RunEventSink;
use crate::agent::AgentName;
use crate::state::StateSnapshot;

/// Unique run identifier.
pub type RunId = Uuid;

/// One query against the pipeline.
#[derive(Clone)]
pub struct RunRequest {
    pub run_id: RunId,
    pub input: String,
    /// Overrides the session's thread id.
    pub thread_id: Option<String>,
    /// Overrides the session's step limit.
    pub step_limit: Option<usize>,
    pub event_sink: Option<RunEventSink>,
}

impl RunRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input: input.into(),
            thread_id: None,
            step_limit: None,
            event_sink: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("run_id", &self.run_id)
            .field("thread_id", &self.thread_id)
            .field("step_limit", &self.step_limit)
            .field("has_event_sink", &self.event_sink.is_some())
            .finish()
    }
}

/// Why a run reached the terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// An agent emitted the termination sentinel.
    Sentinel,
    /// The router could not interpret the state and stopped the run.
    Unroutable,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub thread_id: String,
    /// Last agent-produced text, if any agent produced text.
    pub final_text: Option<String>,
    /// Agent invocations used by this run.
    pub steps: usize,
    pub reason: TerminationReason,
    pub last_agent: Option<AgentName>,
    pub state: StateSnapshot,
}

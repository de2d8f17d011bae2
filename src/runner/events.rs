//! Run event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::RunId;
use crate::agent::AgentName;
use crate::state::StateSnapshot;
use crate::types::ToolCall;

/// Callback used for streaming run events.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Run lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunLifecycle {
    Started,
    Completed,
    Failed { error: String },
}

/// Concrete event payloads emitted by the step runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Lifecycle {
        state: RunLifecycle,
    },
    /// Text produced by an agent, in generation order.
    AgentMessage {
        agent: AgentName,
        step: usize,
        text: String,
    },
    ToolCallStarted {
        agent: AgentName,
        call: ToolCall,
    },
    ToolResult {
        call_id: String,
        text: String,
        is_error: bool,
    },
    HandOff {
        from: AgentName,
        to: AgentName,
    },
    /// State after a completed step.
    Snapshot {
        step: usize,
        snapshot: StateSnapshot,
    },
}

/// Envelope for run events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub thread_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    thread_id: String,
    seq: AtomicU64,
    sink: Option<RunEventSink>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, thread_id: String, sink: Option<RunEventSink>) -> Self {
        Self {
            run_id,
            thread_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: RunEventPayload) {
        let Some(sink) = &self.sink else { return };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(RunEvent {
            run_id: self.run_id,
            thread_id: self.thread_id.clone(),
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }

    pub(crate) fn lifecycle(&self, state: RunLifecycle) {
        self.emit(RunEventPayload::Lifecycle { state });
    }
}

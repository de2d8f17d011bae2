//! Convenience re-exports for common use.

pub use crate::agent::{AgentName, AgentSpec, Roster, TERMINATION_SENTINEL};
pub use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use crate::config::{OctoragConfig, SessionSettings};
pub use crate::error::{OctoragError, Result};
pub use crate::models::LanguageModel;
pub use crate::provider::{ModelProvider, ProviderRequest, ProviderResponse};
pub use crate::router::{RouteDecision, Router, Transition};
pub use crate::runner::{Orchestrator, RunEvent, RunEventPayload, RunOutcome, RunRequest};
pub use crate::state::{ConversationState, StateSnapshot};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{ContentBlock, Message, MessageContent, Role, ToolCall};

//! Conversation state: the append-only message log of one session.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::AgentName;
use crate::error::{OctoragError, Result};
use crate::types::{Message, Role};

/// Message log plus routing metadata for one thread.
///
/// There is no way to remove or reorder messages; `append` is the only
/// mutation of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    thread_id: String,
    messages: Vec<Message>,
    current_agent: Option<AgentName>,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            current_agent: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_agent(&self) -> Option<&AgentName> {
        self.current_agent.as_ref()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message to the end of the log.
    ///
    /// A tool result must answer a call id requested by an earlier message.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if message.role == Role::Tool {
            let Some(call_id) = message.tool_call_id.as_deref() else {
                return Err(OctoragError::InvalidState(
                    "tool result message without a call id".into(),
                ));
            };
            if !self.has_requested_call(call_id) {
                return Err(OctoragError::InvalidState(format!(
                    "tool result references unknown call id '{call_id}'"
                )));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn set_current_agent(&mut self, name: AgentName) {
        self.current_agent = Some(name);
    }

    /// Immutable view for checkpointing and streaming.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot(Arc::new(self.clone()))
    }

    /// Text of the most recent agent message that carried any text.
    pub fn last_agent_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Agent && !m.content.is_empty_text())
            .map(Message::text)
            .next()
    }

    /// Call ids that were requested but not yet answered, in request order.
    pub fn pending_call_ids(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|c| c.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    fn has_requested_call(&self, call_id: &str) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .any(|c| c.id == call_id)
    }
}

/// Shared, read-only copy of a [`ConversationState`].
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot(Arc<ConversationState>);

impl StateSnapshot {
    pub fn state(&self) -> &ConversationState {
        &self.0
    }

    /// Owned copy, e.g. to resume from a checkpoint.
    pub fn to_state(&self) -> ConversationState {
        (*self.0).clone()
    }
}

impl std::ops::Deref for StateSnapshot {
    type Target = ConversationState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateSnapshot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ConversationState::deserialize(deserializer).map(|state| Self(Arc::new(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    #[test]
    fn append_preserves_insertion_order() {
        let mut state = ConversationState::new("t");
        state.append(Message::user("one")).unwrap();
        state.append(Message::agent("A", "two")).unwrap();
        let texts: Vec<String> = state.messages().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn tool_result_for_unknown_call_is_rejected() {
        let mut state = ConversationState::new("t");
        let err = state
            .append(Message::tool_result("missing", "x", false))
            .unwrap_err();
        assert!(matches!(err, OctoragError::InvalidState(_)));
        assert!(state.is_empty());
    }

    #[test]
    fn pending_calls_shrink_as_results_arrive() {
        let mut state = ConversationState::new("t");
        state
            .append(Message::agent("A", "").with_tool_calls(vec![
                ToolCall::new("c1", "get_readme", json!({})),
                ToolCall::new("c2", "get_repo_tree", json!({})),
            ]))
            .unwrap();
        assert_eq!(state.pending_call_ids(), vec!["c1", "c2"]);
        state.append(Message::tool_result("c1", "ok", false)).unwrap();
        assert_eq!(state.pending_call_ids(), vec!["c2"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut state = ConversationState::new("t");
        state.append(Message::user("hi")).unwrap();
        let snapshot = state.snapshot();
        state.append(Message::agent("A", "hello")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn last_agent_text_skips_tool_only_turns() {
        let mut state = ConversationState::new("t");
        state.append(Message::agent("A", "answer")).unwrap();
        state
            .append(Message::agent("A", "").with_tool_calls(vec![ToolCall::new(
                "c1",
                "get_readme",
                json!({}),
            )]))
            .unwrap();
        assert_eq!(state.last_agent_text().as_deref(), Some("answer"));
    }
}

//! Content-based routing between agents.
//!
//! [`Router::route`] is a pure function of the conversation state: it never
//! mutates history. Messages a transition needs (the hand-off instruction)
//! come back in [`RouteDecision::messages_to_append`] for the runner to apply.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::{AgentName, AgentSpec, Roster};
use crate::state::ConversationState;
use crate::types::{Message, MessageContent, Role};

/// Next step chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// Execute the pending tool calls, then re-invoke `agent`.
    DispatchTools { agent: AgentName },
    /// Switch the active agent.
    HandOff { from: AgentName, to: AgentName },
    /// The run is over. Terminal is absorbing.
    Terminate,
    /// Invoke the same agent again.
    Stay { agent: AgentName },
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate)
    }
}

/// Router output: the transition plus any messages to append before taking it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub transition: Transition,
    pub messages_to_append: Vec<Message>,
}

impl RouteDecision {
    fn only(transition: Transition) -> Self {
        Self {
            transition,
            messages_to_append: Vec::new(),
        }
    }
}

/// Routing table for one session.
#[derive(Debug, Clone)]
pub struct Router {
    roster: Roster,
    sentinel: String,
}

impl Router {
    pub fn new(roster: Roster, sentinel: impl Into<String>) -> Self {
        Self {
            roster,
            sentinel: sentinel.into(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Decide the next transition from the latest message.
    ///
    /// Priority is absolute: pending tool calls, then a hand-off to a
    /// successor, then the termination sentinel, then stay.
    pub fn route(&self, state: &ConversationState) -> RouteDecision {
        let Some(agent) = self.current_spec(state) else {
            return RouteDecision::only(Transition::Terminate);
        };
        let Some(last) = state.last_message() else {
            warn!(thread_id = state.thread_id(), "routing an empty conversation; terminating");
            return RouteDecision::only(Transition::Terminate);
        };
        if last.role != Role::Agent {
            warn!(
                thread_id = state.thread_id(),
                role = %last.role,
                "last message is not an agent message; terminating"
            );
            return RouteDecision::only(Transition::Terminate);
        }

        if last.has_tool_calls() {
            return RouteDecision::only(Transition::DispatchTools {
                agent: agent.name.clone(),
            });
        }

        if let Some(to) = find_hand_off(&last.content, &agent.successors) {
            return RouteDecision {
                transition: Transition::HandOff {
                    from: agent.name.clone(),
                    to: to.clone(),
                },
                messages_to_append: vec![hand_off_message(last, &agent.name)],
            };
        }

        if contains_sentinel(&last.content, &self.sentinel) {
            return RouteDecision::only(Transition::Terminate);
        }

        RouteDecision::only(Transition::Stay {
            agent: agent.name.clone(),
        })
    }

    fn current_spec(&self, state: &ConversationState) -> Option<&AgentSpec> {
        let Some(name) = state.current_agent() else {
            warn!(thread_id = state.thread_id(), "no current agent; terminating");
            return None;
        };
        let spec = self.roster.get(name);
        if spec.is_none() {
            warn!(thread_id = state.thread_id(), agent = %name, "unknown current agent; terminating");
        }
        spec
    }
}

/// First successor, in declared order, whose name appears in any text segment.
///
/// Matching is a case-insensitive substring test, so `@Name` is covered by
/// the bare-name match. Opaque blocks never match.
pub fn find_hand_off<'a>(content: &MessageContent, successors: &'a [AgentName]) -> Option<&'a AgentName> {
    let segments: Vec<String> = content
        .text_segments()
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    successors.iter().find(|name| {
        let needle = name.as_str().to_lowercase();
        !needle.is_empty() && segments.iter().any(|segment| segment.contains(&needle))
    })
}

/// Case-insensitive search for the sentinel in any text segment.
pub fn contains_sentinel(content: &MessageContent, sentinel: &str) -> bool {
    let needle = sentinel.to_lowercase();
    !needle.is_empty()
        && content
            .text_segments()
            .into_iter()
            .any(|segment| segment.to_lowercase().contains(&needle))
}

/// The instruction the next agent sees: the mentioning agent's content, as user input.
fn hand_off_message(mention: &Message, from: &AgentName) -> Message {
    let mut message = Message::user(String::new()).with_name(from.as_str());
    message.content = mention.content.clone();
    message
}

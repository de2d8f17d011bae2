//! Message types for the conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation. Immutable once appended to a
/// [`ConversationState`](crate::state::ConversationState).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Originating agent for agent messages and hand-off instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set only on tool-result messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            name: None,
            tool_call_id: None,
            is_error: false,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    /// Create an agent message tagged with the producing agent.
    pub fn agent(name: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(Role::Agent, content.into())
        }
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        text: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            is_error,
            ..Self::new(Role::Tool, MessageContent::Text(text.into()))
        }
    }

    /// Attach tool calls.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Attach an originating name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Concatenated text of the message, ignoring opaque blocks.
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Whether the message requests tool execution.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    System,
    Agent,
    Tool,
}

/// Message content: plain text or an ordered sequence of blocks.
///
/// Deserialization is lenient. A JSON string becomes [`MessageContent::Text`],
/// an array becomes [`MessageContent::Blocks`], and any other shape is kept as
/// a single opaque block so that it never matches during routing scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Borrow every textual segment, in order.
    pub fn text_segments(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => vec![text.as_str()],
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Opaque(_) => None,
                })
                .collect(),
        }
    }

    /// Concatenate all textual segments.
    pub fn text(&self) -> String {
        self.text_segments().concat()
    }

    pub fn is_empty_text(&self) -> bool {
        self.text_segments()
            .iter()
            .all(|segment| segment.trim().is_empty())
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

impl From<serde_json::Value> for MessageContent {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            serde_json::Value::Array(items) => {
                Self::Blocks(items.into_iter().map(ContentBlock::from).collect())
            }
            serde_json::Value::Null => Self::Blocks(Vec::new()),
            other => Self::Blocks(vec![ContentBlock::Opaque(other)]),
        }
    }
}

impl From<MessageContent> for serde_json::Value {
    fn from(content: MessageContent) -> Self {
        match content {
            MessageContent::Text(text) => serde_json::Value::String(text),
            MessageContent::Blocks(blocks) => serde_json::Value::Array(
                blocks.into_iter().map(serde_json::Value::from).collect(),
            ),
        }
    }
}

/// One block of block-sequence content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ContentBlock {
    Text { text: String },
    /// Anything that is not a text block (images, provider-specific parts).
    Opaque(serde_json::Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

impl From<serde_json::Value> for ContentBlock {
    fn from(value: serde_json::Value) -> Self {
        let is_text = value.get("type").and_then(|t| t.as_str()) == Some("text");
        match value.get("text").and_then(|t| t.as_str()) {
            Some(text) if is_text => Self::Text {
                text: text.to_string(),
            },
            _ => Self::Opaque(value),
        }
    }
}

impl From<ContentBlock> for serde_json::Value {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => serde_json::json!({ "type": "text", "text": text }),
            ContentBlock::Opaque(value) => value,
        }
    }
}

/// A tool call requested by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

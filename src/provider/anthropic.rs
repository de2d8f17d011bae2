//! Anthropic Messages API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::OctoragError;
use crate::models::anthropic::AnthropicModel;
use crate::types::{ContentBlock, FinishReason, MessageContent, Role, ToolCall, Usage};

use super::http::{anthropic_headers, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model: AnthropicModel,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(model: AnthropicModel, api_key: String, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let mut system_parts = Vec::new();
        let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(msg.text()),
                Role::User => push_turn(&mut turns, "user", content_blocks(&msg.content)),
                Role::Agent => {
                    let mut blocks = text_blocks(&msg.content);
                    for call in &msg.tool_calls {
                        blocks.push(serde_json::json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.tool_name,
                            "input": tool_input(&call.arguments),
                        }));
                    }
                    push_turn(&mut turns, "assistant", blocks);
                }
                Role::Tool => {
                    let block = serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.text(),
                        "is_error": msg.is_error,
                    });
                    push_turn(&mut turns, "user", vec![block]);
                }
            }
        }

        let messages: Vec<Value> = turns
            .into_iter()
            .map(|(role, content)| serde_json::json!({ "role": role, "content": content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model.as_str(),
            "messages": messages,
            "max_tokens": request
                .settings
                .max_tokens
                .unwrap_or_else(|| self.model.default_max_tokens()),
        });

        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert("system".into(), system_parts.join("\n").into());
            }
            if let Some(temp) = request.settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(top_p) = request.settings.top_p {
                obj.insert("top_p".into(), top_p.into());
            }
            if let Some(ref stops) = request.settings.stop_sequences {
                obj.insert("stop_sequences".into(), serde_json::json!(stops));
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

/// Consecutive turns with the same role are merged; the API expects alternation.
fn push_turn(turns: &mut Vec<(&'static str, Vec<Value>)>, role: &'static str, blocks: Vec<Value>) {
    if blocks.is_empty() {
        return;
    }
    match turns.last_mut() {
        Some((last_role, content)) if *last_role == role => content.extend(blocks),
        _ => turns.push((role, blocks)),
    }
}

/// Text blocks only; the API rejects empty text blocks.
fn text_blocks(content: &MessageContent) -> Vec<Value> {
    content
        .text_segments()
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .map(|text| serde_json::json!({ "type": "text", "text": text }))
        .collect()
}

/// User content keeps opaque blocks (images, documents) as they were given.
fn content_blocks(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(_) => text_blocks(content),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if text.trim().is_empty() => None,
                other => Some(Value::from(other.clone())),
            })
            .collect(),
    }
}

/// `tool_use.input` must be an object.
fn tool_input(arguments: &Value) -> Value {
    match arguments {
        Value::Object(_) => arguments.clone(),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| serde_json::json!({})),
        _ => serde_json::json!({}),
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        self.model.as_str()
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, OctoragError> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = self.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Anthropic invoke"
        );

        let resp = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: AnthropicResponse = resp.json().await?;
        Ok(parse_response(data))
    }
}

fn parse_response(data: AnthropicResponse) -> ProviderResponse {
    let mut blocks = Vec::new();
    let mut tool_calls = Vec::new();

    for block in data.content {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str);
                let name = block.get("name").and_then(Value::as_str);
                if let (Some(id), Some(name)) = (id, name) {
                    let input = block.get("input").cloned().unwrap_or_else(|| serde_json::json!({}));
                    tool_calls.push(ToolCall::new(id, name, input));
                }
            }
            _ => blocks.push(ContentBlock::from(block)),
        }
    }

    let all_text = blocks.iter().all(|b| matches!(b, ContentBlock::Text { .. }));
    let content = if all_text {
        MessageContent::Text(
            blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Opaque(_) => None,
                })
                .collect(),
        )
    } else {
        MessageContent::Blocks(blocks)
    };

    let finish_reason = match data.stop_reason.as_deref() {
        Some("end_turn") | Some("stop_sequence") => Some(FinishReason::Stop),
        Some("max_tokens") => Some(FinishReason::Length),
        Some("tool_use") => Some(FinishReason::ToolCalls),
        _ => None,
    };

    ProviderResponse {
        content,
        tool_calls,
        finish_reason,
        usage: Usage {
            input_tokens: data.usage.input_tokens,
            output_tokens: data.usage.output_tokens,
        },
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<Value>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

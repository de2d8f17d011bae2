//! Model provider trait and implementations.

pub mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OctoragConfig;
use crate::error::OctoragError;
use crate::models::LanguageModel;
use crate::tools::Tool;
use crate::types::{FinishReason, GenerationSettings, Message, MessageContent, ToolCall, Usage};

/// A request sent to a model provider.
///
/// `messages` starts with the agent's system prompt; the tool list is the
/// agent's allow-list and is the only tool restriction the model sees.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().schema.clone(),
        }
    }
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: MessageContent,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
}

impl ProviderResponse {
    /// A plain text response with no tool calls.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Run one non-streaming completion.
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, OctoragError>;
}

/// Build the provider that serves `model`, with credentials from `config`.
#[allow(unused_variables)]
pub fn create_provider(
    model: &LanguageModel,
    config: &OctoragConfig,
) -> Result<Arc<dyn ModelProvider>, OctoragError> {
    match model {
        #[cfg(feature = "anthropic")]
        LanguageModel::Anthropic(m) => {
            let api_key = config
                .get_api_key("anthropic")
                .ok_or_else(|| OctoragError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
            Ok(Arc::new(anthropic::AnthropicProvider::new(
                m.clone(),
                api_key,
                config.get_base_url("anthropic"),
            )))
        }
        #[cfg(not(feature = "anthropic"))]
        LanguageModel::Anthropic(_) => Err(OctoragError::Configuration(
            "built without the `anthropic` feature; supply a provider with Orchestrator::builder().provider(..)"
                .into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "anthropic")]
    #[test]
    fn anthropic_requires_api_key() {
        let model: LanguageModel = "anthropic:claude-3-7-sonnet-latest".parse().unwrap();
        let config = OctoragConfig::new();
        let err = create_provider(&model, &config).err().unwrap();
        assert!(matches!(err, OctoragError::Authentication(_)));

        config.set_api_key("anthropic", "sk-test".into());
        let provider = create_provider(&model, &config).unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
        assert_eq!(provider.model_id(), "claude-3-7-sonnet-latest");
    }

    #[cfg(not(feature = "anthropic"))]
    #[test]
    fn missing_provider_feature_is_a_configuration_error() {
        let model: LanguageModel = "anthropic:claude-3-7-sonnet-latest".parse().unwrap();
        let err = create_provider(&model, &OctoragConfig::new()).err().unwrap();
        assert!(matches!(err, OctoragError::Configuration(_)));
    }
}

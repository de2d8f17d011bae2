//! Model selection and parsing.

use std::str::FromStr;

use super::anthropic::AnthropicModel;
use super::LanguageModel;
use crate::error::OctoragError;

/// Reads the `model` setting.
pub struct ModelSelector;

impl ModelSelector {
    /// `anthropic:<id>` (or `claude:<id>`). Unlisted Anthropic ids pass through
    /// unchanged; any other provider is rejected.
    pub fn parse(s: &str) -> Result<LanguageModel, OctoragError> {
        let (provider, model_id) = s.split_once(':').ok_or_else(|| {
            OctoragError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            ))
        })?;
        if model_id.is_empty() {
            return Err(OctoragError::InvalidArgument(format!(
                "Invalid model selector '{s}': empty model id"
            )));
        }

        match provider {
            "anthropic" | "claude" => {
                let m = AnthropicModel::from_str(model_id)
                    .unwrap_or_else(|_| AnthropicModel::Custom(model_id.to_string()));
                Ok(LanguageModel::Anthropic(m))
            }
            other => Err(OctoragError::Configuration(format!(
                "unsupported model provider '{other}' in '{s}'"
            ))),
        }
    }
}

impl FromStr for LanguageModel {
    type Err = OctoragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSelector::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_model() {
        let model: LanguageModel = "anthropic:claude-3-7-sonnet-latest".parse().unwrap();
        assert_eq!(model.provider_name(), "anthropic");
        assert_eq!(model.model_id(), "claude-3-7-sonnet-latest");
        assert_eq!(model.to_string(), "anthropic:claude-3-7-sonnet-latest");
    }

    #[test]
    fn unknown_anthropic_id_is_kept_verbatim() {
        let model = ModelSelector::parse("anthropic:claude-next").unwrap();
        assert_eq!(model.model_id(), "claude-next");
    }

    #[test]
    fn other_providers_are_rejected() {
        let err = ModelSelector::parse("local:llama").unwrap_err();
        assert!(matches!(err, OctoragError::Configuration(ref m) if m.contains("'local'")));
    }

    #[test]
    fn claude_prefix_is_an_alias() {
        let model = ModelSelector::parse("claude:claude-3-5-haiku-latest").unwrap();
        assert_eq!(model, LanguageModel::Anthropic(AnthropicModel::Claude35HaikuLatest));
    }

    #[test]
    fn selector_requires_separator() {
        assert!(ModelSelector::parse("claude").is_err());
        assert!(ModelSelector::parse("anthropic:").is_err());
    }
}

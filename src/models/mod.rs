//! Which model the four agents run on.

pub mod anthropic;
pub mod selector;

pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model shared by every agent in a session, written `provider:model_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", content = "model")]
pub enum LanguageModel {
    Anthropic(anthropic::AnthropicModel),
}

impl LanguageModel {
    pub fn model_id(&self) -> &str {
        match self {
            Self::Anthropic(m) => m.as_str(),
        }
    }

    pub fn provider_name(&self) -> &str {
        match self {
            Self::Anthropic(_) => "anthropic",
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_name(), self.model_id())
    }
}

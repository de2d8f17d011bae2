//! Anthropic model definitions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Anthropic models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum AnthropicModel {
    #[strum(serialize = "claude-3-7-sonnet-latest")]
    Claude37SonnetLatest,
    #[strum(serialize = "claude-3-7-sonnet-20250219")]
    Claude37Sonnet,
    #[strum(serialize = "claude-sonnet-4-20250514")]
    ClaudeSonnet4,
    #[strum(serialize = "claude-3-5-haiku-latest")]
    Claude35HaikuLatest,
    /// Any id not listed above, sent as-is.
    #[strum(default)]
    Custom(String),
}

impl AnthropicModel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Claude37SonnetLatest => "claude-3-7-sonnet-latest",
            Self::Claude37Sonnet => "claude-3-7-sonnet-20250219",
            Self::ClaudeSonnet4 => "claude-sonnet-4-20250514",
            Self::Claude35HaikuLatest => "claude-3-5-haiku-latest",
            Self::Custom(s) => s,
        }
    }

    /// Output budget used when the caller does not set `max_tokens`.
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Self::Claude35HaikuLatest => 4_096,
            _ => 8_192,
        }
    }
}

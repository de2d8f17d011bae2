//! Error types for OctoRAG.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all OctoRAG operations.
#[derive(Error, Debug)]
pub enum OctoragError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The inference provider failed while an agent was producing its turn.
    #[error("Model invocation failed for agent '{agent}': {source}")]
    ModelInvocation {
        agent: String,
        #[source]
        source: Box<OctoragError>,
    },

    /// The run used up its step budget before reaching a terminal state.
    #[error("Step limit of {limit} exceeded before the run terminated")]
    StepLimitExceeded { limit: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Handshake or protocol failure talking to an MCP server.
    #[error("MCP error: {0}")]
    Mcp(String),
}

impl OctoragError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Wrap a provider failure with the agent that was being invoked.
    pub fn model_invocation(agent: impl Into<String>, source: OctoragError) -> Self {
        Self::ModelInvocation {
            agent: agent.into(),
            source: Box::new(source),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::Toml(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::ModelInvocation { source, .. } => source.category(),
            Self::StepLimitExceeded { .. } => ErrorCategory::StepLimit,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::StepLimit => RecoverySuggestion::RaiseStepLimit,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OctoragError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_invocation_inherits_source_category() {
        let err = OctoragError::model_invocation("Code Generator", OctoragError::api(503, "down"));
        assert_eq!(err.category(), ErrorCategory::Server);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Code Generator"));
    }

    #[test]
    fn step_limit_is_not_retryable() {
        let err = OctoragError::StepLimitExceeded { limit: 3 };
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::RaiseStepLimit);
    }
}

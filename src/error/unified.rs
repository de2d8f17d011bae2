//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    StepLimit,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    RaiseStepLimit,
    CheckToolImplementation,
    ContactSupport,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hint = match self {
            Self::RetryWithBackoff => "retry after a short wait",
            Self::CheckCredentials => "check ANTHROPIC_API_KEY / GH_ACCESS_TOKEN",
            Self::CheckConfiguration => "check the configuration file and environment",
            Self::IncreaseTimeout => "increase the timeout",
            Self::RaiseStepLimit => "raise the step limit (--step-limit or OCTORAG_STEP_LIMIT)",
            Self::CheckToolImplementation => "check the tool implementation",
            Self::ContactSupport => "inspect the logs (RUST_LOG=octorag=debug)",
        };
        f.write_str(hint)
    }
}

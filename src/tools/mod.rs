//! Tool system: the tool trait, argument handling and the GitHub tool set.

pub mod arguments;
#[cfg(feature = "github")]
pub mod github;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
#[cfg(feature = "github")]
pub use github::{github_tools, GitHubClient};
pub use registry::ToolRegistry;
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::AgentToolParameters;

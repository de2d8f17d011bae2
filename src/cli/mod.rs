//! CLI entry point for OctoRAG.

use clap::{Parser, Subcommand};

use crate::config::OctoragConfig;

/// OctoRAG CLI
#[derive(Parser, Debug)]
#[command(
    name = "octorag",
    version,
    about = "Find GitHub repositories, generate code from them and publish it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single query through the pipeline
    Query(QueryArgs),
    /// Read queries interactively until "quit"
    Repl(SessionArgs),
}

/// Session overrides shared by every command.
#[derive(Parser, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Conversation thread to resume or create
    #[arg(long)]
    pub thread_id: Option<String>,

    /// Maximum agent invocations per query
    #[arg(long)]
    pub step_limit: Option<usize>,

    /// Model to use (format: provider:model, e.g., anthropic:claude-3-7-sonnet-latest)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Persist conversation checkpoints in this directory
    #[arg(long)]
    pub checkpoint_dir: Option<std::path::PathBuf>,

    /// Take the agents' tools from this MCP server (streamable HTTP)
    #[arg(long)]
    pub mcp_url: Option<String>,
}

impl SessionArgs {
    /// Apply these overrides on top of a loaded config.
    pub fn apply(&self, config: &mut OctoragConfig) {
        if let Some(thread_id) = &self.thread_id {
            config.session.thread_id = thread_id.clone();
        }
        if let Some(limit) = self.step_limit {
            config.session.step_limit = limit;
        }
        if let Some(model) = &self.model {
            config.session.model = model.clone();
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.session.checkpoint_dir = Some(dir.clone());
        }
        if let Some(url) = &self.mcp_url {
            config.session.mcp_url = Some(url.clone());
        }
    }
}

/// Arguments for the `query` subcommand.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Print every agent message as it is produced
    #[arg(long)]
    pub stream: bool,

    /// The request (positional)
    pub text: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Whether a REPL line ends the session.
pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

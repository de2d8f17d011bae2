//! OctoRAG: a multi-agent repository-to-code pipeline.
//!
//! Four agents collaborate on a request: one searches GitHub for candidate
//! repositories, one curates them, one generates code from them and one
//! publishes the result. Which agent runs next is decided from the content of
//! the latest message (tool calls, a hand-off by name, or the termination
//! sentinel) by a pure [`router::Router`], and a bounded
//! [`runner::Orchestrator`] loop drives the whole conversation.
//!
//! # Quick Start
//!
//! ```no_run
//! use octorag::prelude::*;
//!
//! # async fn example() -> octorag::error::Result<()> {
//! let orchestrator = Orchestrator::from_config(OctoragConfig::load()?)?;
//! let answer = orchestrator
//!     .query("Write a CLI that converts CSV to JSON, based on popular Rust crates")
//!     .await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod error;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod router;
pub mod runner;
pub mod state;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

//! Agents: identities, the pipeline roster and the per-agent executor.

pub mod executor;
pub mod pipeline;
pub mod spec;

pub use executor::AgentExecutor;
pub use pipeline::{default_roster, TERMINATION_SENTINEL};
pub use spec::{AgentName, AgentSpec, Roster};

//! Core types for OctoRAG.

pub mod generation;
pub mod message;

pub use generation::*;
pub use message::*;

//! Checkpoint persistence for conversation state, keyed by thread id.

pub mod file;

pub use file::FileCheckpointStore;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{OctoragError, Result};
use crate::state::ConversationState;

/// Storage abstraction for persisted conversation state.
///
/// `save` replaces the whole state for the thread; there is no merge.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>>;
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()>;
}

/// In-process store. Each thread owns an independent clone of its state.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.threads
            .read()
            .map(|threads| threads.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let threads = self
            .threads
            .read()
            .map_err(|_| OctoragError::Checkpoint("checkpoint lock poisoned".into()))?;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| OctoragError::Checkpoint("checkpoint lock poisoned".into()))?;
        threads.insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::CheckpointStore;
use crate::error::{OctoragError, Result};
use crate::state::ConversationState;

/// File-backed checkpoint store, one JSON file per thread.
///
/// # Example
/// ```no_run
/// use octorag::checkpoint::{CheckpointStore, FileCheckpointStore};
/// use octorag::state::ConversationState;
///
/// # async fn demo() -> octorag::error::Result<()> {
/// let store = FileCheckpointStore::new_default();
/// store.save("1", &ConversationState::new("1")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    base_dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: crate::config::default_octorag_dir().join("checkpoints"),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn checkpoint_path(&self, thread_id: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(format!("{}.json", file_stem(thread_id)?)))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let path = self.checkpoint_path(thread_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: CheckpointFile = serde_json::from_str(&raw)?;
        if file.thread_id != thread_id {
            return Err(OctoragError::Checkpoint(format!(
                "checkpoint at {} belongs to thread '{}'",
                path.display(),
                file.thread_id
            )));
        }
        Ok(Some(file.state))
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        let path = self.checkpoint_path(thread_id)?;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let file = CheckpointFile {
            version: 1,
            thread_id: thread_id.to_string(),
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        // Readers never observe a partially written checkpoint.
        let tmp = self.base_dir.join(format!(
            ".{}.{}.tmp",
            file_stem(thread_id)?,
            uuid::Uuid::new_v4().simple()
        ));
        let write_result = async {
            let mut out = tokio::fs::File::create(&tmp).await?;
            out.write_all(&content).await?;
            out.flush().await?;
            out.sync_all().await?;
            drop(out);
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        tracing::debug!(thread_id, path = %path.display(), messages = state.len(), "checkpoint saved");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    thread_id: String,
    saved_at: DateTime<Utc>,
    state: ConversationState,
}

/// Injective mapping from thread id to a file-system-safe stem.
fn file_stem(thread_id: &str) -> Result<String> {
    if thread_id.is_empty() {
        return Err(OctoragError::Checkpoint("thread id must not be empty".into()));
    }
    let safe = thread_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        Ok(format!("t-{thread_id}"))
    } else {
        let hex: String = thread_id.bytes().map(|b| format!("{b:02x}")).collect();
        Ok(format!("x-{hex}"))
    }
}

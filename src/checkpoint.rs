//! Durable fetch progress.
//!
//! The checkpoint is a single JSON document replaced wholesale on every save.
//! Saves go through a temporary sibling file that is synced and renamed over
//! the target, so a crash mid-write leaves the previous checkpoint intact.

use crate::models::{Action, BlockRange};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A chunk that exhausted its attempt budget and still needs fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChunk {
    pub address: String,
    pub action: Action,
    pub start_block: u64,
    pub end_block: u64,
}

impl FailedChunk {
    pub fn new(address: &str, action: Action, range: BlockRange) -> Self {
        Self {
            address: address.to_string(),
            action,
            start_block: range.start,
            end_block: range.end,
        }
    }

    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.start_block, self.end_block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub address: String,
    pub action: Action,
    pub last_processed_block: u64,
    pub calls_made_at_save: u64,
    pub items_found_so_far: u64,
    #[serde(default)]
    pub failed_chunks: Vec<FailedChunk>,
}

impl Checkpoint {
    /// Position of one walk. Call count and gap list are filled in on save.
    pub fn new(address: &str, action: Action, last_processed_block: u64, items_found_so_far: u64) -> Self {
        Self {
            address: address.to_string(),
            action,
            last_processed_block,
            calls_made_at_save: 0,
            items_found_so_far,
            failed_chunks: Vec::new(),
        }
    }

    /// Whether this checkpoint describes progress of `(address, action)`.
    pub fn matches(&self, address: &str, action: Action) -> bool {
        self.action == action && self.address.eq_ignore_ascii_case(address)
    }
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(checkpoint).map_err(CheckpointError::Encode)?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            "Checkpoint saved to {}: {} {} at block {}",
            self.path.display(),
            checkpoint.address,
            checkpoint.action,
            checkpoint.last_processed_block
        );
        Ok(())
    }

    /// `None` when no checkpoint exists. A file that does not decode is an
    /// error, never a silent reset.
    pub async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn clear(&self) -> Result<(), CheckpointError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Cleared checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

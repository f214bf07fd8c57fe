//! Durable records of completed stages.
//!
//! A checkpoint's presence means the stage's side effects were applied at
//! least once; its absence means the stage was never attempted or was reset.
//! There is no partial state.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;

/// Storage backend for stage checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Returns when the stage last completed, or `None` if it has no checkpoint.
    fn completed_at(&self, stage: &str) -> io::Result<Option<DateTime<Utc>>>;

    /// Records that the stage completed now.
    fn record(&self, stage: &str) -> io::Result<()>;

    /// Removes the stage's checkpoint. Returns true if one existed.
    fn reset(&self, stage: &str) -> io::Result<bool>;

    /// Returns where the checkpoint for `stage` lives, if it has a location.
    fn location(&self, _stage: &str) -> Option<PathBuf> {
        None
    }

    /// Returns true if the stage has a checkpoint.
    fn exists(&self, stage: &str) -> io::Result<bool> {
        Ok(self.completed_at(stage)?.is_some())
    }
}

//! Zero-byte sentinel files, one per stage.

use super::CheckpointStore;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Stores checkpoints as `<dir>/<stage>.done`.
///
/// The completion time is the file's modification time.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `dir`. The directory is created on first record.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the checkpoint directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, stage: &str) -> io::Result<PathBuf> {
        if stage.is_empty() || stage.contains(|c: char| c == '/' || c == '\\') || stage.starts_with('.') {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("'{stage}' cannot be used as a checkpoint name"),
            ));
        }
        Ok(self.dir.join(format!("{stage}.done")))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn completed_at(&self, stage: &str) -> io::Result<Option<DateTime<Utc>>> {
        let path = self.path_for(stage)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn record(&self, stage: &str) -> io::Result<()> {
        let path = self.path_for(stage)?;
        fs::create_dir_all(&self.dir)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_modified(SystemTime::now())?;
        file.sync_all()?;
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        debug!(stage, path = %path.display(), "Checkpoint recorded");
        Ok(())
    }

    fn reset(&self, stage: &str) -> io::Result<bool> {
        let path = self.path_for(stage)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(stage, path = %path.display(), "Checkpoint removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn location(&self, stage: &str) -> Option<PathBuf> {
        self.path_for(stage).ok()
    }
}

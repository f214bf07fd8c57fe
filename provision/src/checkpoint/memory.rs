//! In-memory checkpoint store.

use super::CheckpointStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;

/// Keeps checkpoints in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given stages already completed.
    #[must_use]
    pub fn with_completed<'a>(stages: impl IntoIterator<Item = &'a str>) -> Self {
        let now = Utc::now();
        Self {
            entries: Mutex::new(stages.into_iter().map(|s| (s.to_string(), now)).collect()),
        }
    }

    /// Returns the completed stage names, sorted.
    #[must_use]
    pub fn completed(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn completed_at(&self, stage: &str) -> io::Result<Option<DateTime<Utc>>> {
        Ok(self.entries.lock().get(stage).copied())
    }

    fn record(&self, stage: &str) -> io::Result<()> {
        self.entries.lock().insert(stage.to_string(), Utc::now());
        Ok(())
    }

    fn reset(&self, stage: &str) -> io::Result<bool> {
        Ok(self.entries.lock().remove(stage).is_some())
    }
}

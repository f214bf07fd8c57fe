//! Run summaries.

use crate::core::{ArtifactRecord, StageStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// The outcome of one stage in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// One-based position in the pipeline.
    pub ordinal: usize,
    /// Stage name.
    pub name: String,
    /// Final status.
    pub status: StageStatus,
    /// Why the stage was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Artifacts the stage produced.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRecord>,
}

impl StageReport {
    pub(crate) fn skipped(ordinal: usize, name: &str, reason: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.to_string(),
            status: StageStatus::Skip,
            skip_reason: Some(reason.into()),
            artifacts: Vec::new(),
        }
    }
}

/// The outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// The run id.
    pub run_id: Uuid,
    /// Every stage the run visited, in order.
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Returns the report for a stage.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Number of stages whose action ran.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Ok)
            .count()
    }

    /// Number of stages skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Skip)
            .count()
    }
}

/// A stage and its checkpoint, as shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointStatus {
    /// One-based position in the pipeline.
    pub ordinal: usize,
    /// Stage name.
    pub name: String,
    /// Stage description.
    pub description: String,
    /// When the stage last completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckpointStatus {
    /// Returns true if the stage has a checkpoint.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

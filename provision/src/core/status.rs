//! Stage status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage concluded within one run.
///
/// A failing stage produces no output; its error aborts the run instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage executed and its checkpoint was recorded.
    Ok,
    /// Stage was not executed because it had already completed.
    Skip,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status lets the pipeline advance.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Skip)
    }
}

//! Stage output type with factory methods.

use super::{ArtifactRecord, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a successful stage action.
///
/// Failures are reported through `Err(ProvisionError)` rather than through an
/// output, so a `StageOutput` is always `ok` or `skip`. Data values must not
/// contain secrets: outputs are recorded in progress events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// Non-secret values later stages may read.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Artifacts the stage rendered and applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRecord>,

    /// Skip reason (for skipped executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::ok_empty()
    }
}

impl StageOutput {
    /// Creates a successful output with data.
    #[must_use]
    pub fn ok(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            status: StageStatus::Ok,
            data,
            artifacts: Vec::new(),
            skip_reason: None,
        }
    }

    /// Creates a successful output with no data.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self::ok(HashMap::new())
    }

    /// Creates a successful output with a single value.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = HashMap::new();
        data.insert(key.into(), value);
        Self::ok(data)
    }

    /// Creates a skip output with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skip,
            data: HashMap::new(),
            artifacts: Vec::new(),
            skip_reason: Some(reason.into()),
        }
    }

    /// Appends an artifact record.
    #[must_use]
    pub fn with_artifact(mut self, artifact: ArtifactRecord) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Returns true if any artifact changed its target.
    #[must_use]
    pub fn changed_anything(&self) -> bool {
        self.artifacts.iter().any(|a| a.changed)
    }
}

//! Progress events and the run log.
//!
//! The pipeline reports progress through an [`EventSink`]. Operators see
//! progress through [`RunLog`], which prints each event to the console and
//! appends it to the host's run log file at the same time.

mod run_log;
mod sink;

pub use run_log::RunLog;
pub use sink::{CollectingEventSink, EventSink, NoOpEventSink};

/// Event emitted when a run begins.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Event emitted when every stage succeeded or was skipped.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Event emitted when a stage failure aborted the run.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Event emitted before a stage action runs.
pub const STAGE_STARTED: &str = "stage.started";
/// Event emitted after a stage action succeeded and its checkpoint was written.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Event emitted when a completed stage is not run again.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// Event emitted when a stage fails.
pub const STAGE_FAILED: &str = "stage.failed";

//! Test doubles for provisioning code.
//!
//! This module provides:
//! - [`ScriptedPrompter`]: replays canned operator answers
//! - [`RecordingRunner`]: records command invocations and returns canned output
//! - [`RecordingStage`]: a stage that records its executions

mod prompter;
mod runner;
mod stage;

pub use prompter::ScriptedPrompter;
pub use runner::RecordingRunner;
pub use stage::{RecordedExecution, RecordingStage};

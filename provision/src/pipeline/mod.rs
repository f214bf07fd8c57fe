//! Checkpointed, linear stage pipeline.
//!
//! Stages run one at a time in declared order. A stage whose checkpoint
//! already exists is offered for re-run according to the [`RerunPolicy`];
//! a stage whose required checkpoints are missing fails its precondition.
//! The first failure aborts the run and no later stage is attempted.

mod report;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use report::{CheckpointStatus, PipelineReport, StageReport};
pub use runner::{Pipeline, RerunPolicy};

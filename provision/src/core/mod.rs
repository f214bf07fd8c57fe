//! Core domain model types shared by the pipeline and its stages.
//!
//! - Stage status enum
//! - Stage output type with factory methods
//! - Records of rendered artifacts

mod artifact;
mod output;
mod status;

pub use artifact::{ArtifactKind, ArtifactRecord};
pub use output::StageOutput;
pub use status::StageStatus;

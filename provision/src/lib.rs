//! # Provision
//!
//! Checkpointed, resumable provisioning of the InfoCall stack on a single
//! Debian-family host.
//!
//! The installer is an ordered list of stages that configure the database,
//! the web server, the telephony server and the packet filter:
//!
//! - **Checkpointed execution**: every completed stage leaves a durable marker,
//!   so an interrupted run resumes where it stopped
//! - **Managed blocks**: shared configuration files are edited only inside
//!   marker-delimited regions, idempotently and atomically
//! - **Validated credentials**: operator input is checked before it reaches a
//!   template, and secrets are hashed or escaped before they are stored
//! - **Progress events**: each run writes a timestamped log tagged with its id
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use provision::prelude::*;
//!
//! let config = ConfigLoader::new().load()?;
//! let checkpoints = Arc::new(FileCheckpointStore::new(config.checkpoint_dir()));
//! let pipeline = default_pipeline(checkpoints)?;
//!
//! let mut ctx = StageContext::new(Arc::new(config), Gateways::system(), Box::new(TerminalPrompter::new()));
//! let report = pipeline.run(&mut ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod core;
pub mod credentials;
pub mod editor;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod pipeline;
pub mod render;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
    pub use crate::config::{ConfigLoader, ProvisionConfig};
    pub use crate::context::{Gateways, StageContext};
    pub use crate::core::{ArtifactKind, ArtifactRecord, StageOutput, StageStatus};
    pub use crate::credentials::{CredentialSet, Prompter, SecretString, TerminalPrompter};
    pub use crate::editor::{upsert_block, EditOutcome, ManagedBlock, Placement};
    pub use crate::errors::{ProvisionError, Result};
    pub use crate::events::{EventSink, NoOpEventSink, RunLog};
    pub use crate::pipeline::{CheckpointStatus, Pipeline, PipelineReport, RerunPolicy};
    pub use crate::stages::{default_pipeline, default_stages, Stage};
}

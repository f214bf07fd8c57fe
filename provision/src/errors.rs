//! Error types for the provisioning pipeline.
//!
//! Each subsystem owns a narrow error enum; [`ProvisionError`] unifies them
//! at the pipeline boundary. Input validation failures never reach this type:
//! the credential collector recovers from them by re-prompting.

use crate::config::ConfigError;
use crate::credentials::PromptError;
use crate::editor::BlockEditError;
use crate::gateway::ServiceError;
use crate::render::RenderError;
use std::path::Path;
use thiserror::Error;

/// The main error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The operator input stream failed or was closed.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A required checkpoint or prerequisite file is missing.
    #[error("precondition failed for stage '{stage}': {detail}")]
    Precondition {
        /// The stage whose precondition failed.
        stage: String,
        /// What was missing.
        detail: String,
    },

    /// An external command failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A managed block could not be repaired.
    #[error(transparent)]
    BlockEdit(#[from] BlockEditError),

    /// A template could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A checkpoint could not be read, written or removed.
    #[error("checkpoint for stage '{stage}' could not be updated: {source}")]
    Checkpoint {
        /// The stage the checkpoint belongs to.
        stage: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage failed; wraps the originating error.
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        /// The failing stage.
        stage: String,
        /// The originating error.
        #[source]
        source: Box<ProvisionError>,
    },

    /// No stage with the given name is registered.
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    /// The stage list cannot form a pipeline.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A filesystem operation outside the editor failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A credential could not be hashed.
    #[error("credential hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl ProvisionError {
    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Precondition {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Creates an IO error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an IO error naming the file involved.
    #[must_use]
    pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("failed to {action} {}", path.display()), source)
    }

    /// Wraps an error as the failure of a stage.
    ///
    /// Errors that already name a stage are returned unchanged.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            named if named.stage().is_some() => named,
            other => Self::StageFailed {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the name of the failing stage, if known.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. }
            | Self::Precondition { stage, .. }
            | Self::Checkpoint { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the innermost error, unwrapping stage failures.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if the operator closed the input stream.
    #[must_use]
    pub fn is_input_closed(&self) -> bool {
        matches!(self.root(), Self::Prompt(PromptError::Closed))
    }
}

/// Result alias for provisioning operations.
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

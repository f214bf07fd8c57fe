//! Marker-delimited block editing for shared configuration files.
//!
//! The orchestrator owns exactly one region of each shared file it touches.
//! That region is bracketed by a start and an end marker line; everything
//! outside the markers belongs to operators or other subsystems and is copied
//! through untouched. Rewrites go through [`atomic_write`] so a crash can never
//! leave a truncated file behind.

mod atomic;
mod block;
mod file;

pub use atomic::{atomic_write, atomic_write_with_mode};
pub use block::{apply_block, strip_block, ManagedBlock, Placement, StrippedContent};
pub use file::{commit_edit, plan_block, remove_block, upsert_block, EditOutcome, PlannedEdit};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while repairing a managed block.
///
/// None of these are recoverable within a run: the target file is left exactly
/// as it was found.
#[derive(Debug, Error)]
pub enum BlockEditError {
    /// The target file exists but could not be read completely.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file being edited.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The replacement file could not be written or renamed into place.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The file being edited.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A start marker was found without its end marker.
    #[error("managed block opened at line {line}{} has no closing '{end_marker}'", describe_path(path.as_deref()))]
    UnterminatedBlock {
        /// The file being edited, when known.
        path: Option<PathBuf>,
        /// One-based line number of the dangling start marker.
        line: usize,
        /// The end marker that was expected.
        end_marker: String,
    },

    /// The marker pair cannot delimit a block.
    #[error("invalid block markers: {0}")]
    InvalidMarkers(String),

    /// A body line would be read back as a block marker.
    #[error("block body line {line} repeats the marker '{marker}'")]
    InvalidBody {
        /// One-based line number within the body.
        line: usize,
        /// The marker the line matches.
        marker: String,
    },
}

impl BlockEditError {
    /// Attaches the file path to a content-level error.
    #[must_use]
    pub fn in_file(self, file: &Path) -> Self {
        match self {
            Self::UnterminatedBlock {
                path: None,
                line,
                end_marker,
            } => Self::UnterminatedBlock {
                path: Some(file.to_path_buf()),
                line,
                end_marker,
            },
            other => other,
        }
    }
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" of {}", p.display())).unwrap_or_default()
}

//! Records of artifacts a stage produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The kind of text a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A service configuration file or managed block.
    ServiceConfig,
    /// A batch of SQL statements.
    SqlBatch,
    /// A packet filter rule.
    FirewallRule,
    /// The application settings file.
    Settings,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceConfig => write!(f, "service_config"),
            Self::SqlBatch => write!(f, "sql_batch"),
            Self::FirewallRule => write!(f, "firewall_rule"),
            Self::Settings => write!(f, "settings"),
        }
    }
}

/// A loggable summary of a rendered artifact.
///
/// Only the digest of the content is kept, so records are safe to write to
/// the run log even when the artifact embeds secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// The template name.
    pub name: String,
    /// SHA-256 of the rendered content, hex encoded.
    pub digest: String,
    /// Where the artifact was written, if it was written to a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    /// Whether applying the artifact changed anything.
    pub changed: bool,
}

impl ArtifactRecord {
    /// Attaches the target path.
    #[must_use]
    pub fn at(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets whether the artifact changed its target.
    #[must_use]
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Returns the first twelve hex digits of the digest.
    #[must_use]
    pub fn short_digest(&self) -> &str {
        self.digest.get(..12).unwrap_or(&self.digest)
    }
}

//! Provisioning configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `INFOCALL_*` environment overrides. The result is validated once and
//! shared read-only for the rest of the run.

mod loader;
mod settings;

pub use loader::{apply_env_overrides, ConfigLoader, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use settings::{
    AdminConfig, CommandsConfig, DatabaseConfig, FirewallConfig, LimitsConfig, PathsConfig,
    ProvisionConfig, TelephonyConfig, WebConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be applied.
    #[error("invalid override {key}: {reason}")]
    Override {
        /// The environment variable.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates a validation error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

//! Layered configuration loading.

use super::{ConfigError, ProvisionConfig};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration file read when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/infocall/provision.toml";

/// Prefix of environment overrides, as in `INFOCALL_WEB_HTTP_PORT=8080`.
pub const ENV_PREFIX: &str = "INFOCALL_";

/// Variables under the prefix that are not overrides.
const RESERVED: &[&str] = &["INFOCALL_CONFIG", "INFOCALL_LOG"];

/// Loads configuration in layers.
///
/// Priority order, lowest first:
/// 1. Built-in defaults
/// 2. The TOML file (explicit path, else [`DEFAULT_CONFIG_PATH`] when present)
/// 3. `INFOCALL_<SECTION>_<FIELD>` environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// Creates a loader that reads the default file and the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path` instead of the default file. The file must exist.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Uses the given variables instead of the process environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Loads, overrides and validates the configuration.
    pub fn load(&self) -> Result<ProvisionConfig, ConfigError> {
        let mut config = match &self.file {
            Some(path) => Self::read_file(path)?,
            None => match Self::read_file(Path::new(DEFAULT_CONFIG_PATH)) {
                Ok(config) => config,
                Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    debug!(path = DEFAULT_CONFIG_PATH, "No config file, using defaults");
                    ProvisionConfig::default()
                }
                Err(e) => return Err(e),
            },
        };

        let vars = match &self.env {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };
        config = apply_env_overrides(config, &vars)?;

        config.validate()?;
        info!(log_dir = %config.paths.log_dir.display(), "Configuration loaded");
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<ProvisionConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Applies `INFOCALL_*` overrides from `vars` to `config`.
///
/// Each override replaces one existing scalar and is parsed as that scalar's
/// type. `INFOCALL_PACKAGES` replaces the package list with a comma or
/// whitespace separated list. Variables that name no known field are ignored
/// with a warning.
pub fn apply_env_overrides(
    config: ProvisionConfig,
    vars: &[(String, String)],
) -> Result<ProvisionConfig, ConfigError> {
    let mut overrides: Vec<_> = vars
        .iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX) && !RESERVED.contains(&key.as_str()))
        .collect();
    if overrides.is_empty() {
        return Ok(config);
    }
    overrides.sort();

    let mut root = toml::Value::try_from(&config).map_err(|e| ConfigError::invalid(e.to_string()))?;
    for (key, raw) in overrides {
        let path = key[ENV_PREFIX.len()..].to_ascii_lowercase();
        apply_override(&mut root, key, &path, raw)?;
    }

    root.try_into().map_err(|e: toml::de::Error| ConfigError::Override {
        key: "environment".to_string(),
        reason: e.to_string(),
    })
}

fn apply_override(root: &mut toml::Value, key: &str, path: &str, raw: &str) -> Result<(), ConfigError> {
    let reject = |reason: String| ConfigError::Override {
        key: key.to_string(),
        reason,
    };

    if path == "packages" {
        let list = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .map(|p| toml::Value::String(p.to_string()))
            .collect();
        if let Some(table) = root.as_table_mut() {
            table.insert("packages".to_string(), toml::Value::Array(list));
        }
        debug!(key, "Applied package list override");
        return Ok(());
    }

    let slot = path
        .split_once('_')
        .and_then(|(section, field)| root.get_mut(section)?.get_mut(field));
    let Some(slot) = slot else {
        warn!(key, "Ignoring unknown configuration override");
        return Ok(());
    };

    *slot = match &*slot {
        toml::Value::Integer(_) => toml::Value::Integer(
            raw.trim()
                .parse()
                .map_err(|e| reject(format!("expected an integer: {e}")))?,
        ),
        toml::Value::Boolean(_) => toml::Value::Boolean(
            raw.trim()
                .parse()
                .map_err(|e| reject(format!("expected true or false: {e}")))?,
        ),
        toml::Value::String(_) => toml::Value::String(raw.to_string()),
        other => return Err(reject(format!("cannot override a {} value", other.type_str()))),
    };
    debug!(key, "Applied configuration override");
    Ok(())
}

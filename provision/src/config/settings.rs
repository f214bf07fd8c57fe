//! Configuration schema and defaults.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete provisioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Database server and application account.
    pub database: DatabaseConfig,
    /// Asterisk integration.
    pub telephony: TelephonyConfig,
    /// Apache virtual host.
    pub web: WebConfig,
    /// Packet filter.
    pub firewall: FirewallConfig,
    /// Administrator account rules.
    pub admin: AdminConfig,
    /// Application rate limits written to the settings file.
    pub limits: LimitsConfig,
    /// External command names.
    pub commands: CommandsConfig,
    /// Packages installed by the first stage.
    pub packages: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            database: DatabaseConfig::default(),
            telephony: TelephonyConfig::default(),
            web: WebConfig::default(),
            firewall: FirewallConfig::default(),
            admin: AdminConfig::default(),
            limits: LimitsConfig::default(),
            commands: CommandsConfig::default(),
            packages: [
                "apache2",
                "libapache2-mod-wsgi-py3",
                "mariadb-server",
                "python3",
                "python3-pip",
                "python3-venv",
                "asterisk",
                "iptables-persistent",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ProvisionConfig {
    /// Checks ranges and cross-field rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.database.name) {
            return Err(ConfigError::invalid(format!(
                "database.name '{}' must be letters, digits and underscores",
                self.database.name
            )));
        }
        if !is_identifier(&self.database.app_user) {
            return Err(ConfigError::invalid(format!(
                "database.app_user '{}' must be letters, digits and underscores",
                self.database.app_user
            )));
        }
        if self.web.http_port == 0 {
            return Err(ConfigError::invalid("web.http_port must not be 0"));
        }
        if self.web.wsgi_threads == 0 {
            return Err(ConfigError::invalid("web.wsgi_threads must be at least 1"));
        }
        let extension = &self.telephony.ivr_extension;
        if !(3..=6).contains(&extension.len()) || !extension.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::invalid(format!(
                "telephony.ivr_extension '{extension}' must be 3 to 6 digits"
            )));
        }
        if !(4..=12).contains(&self.admin.passcode_digits) {
            return Err(ConfigError::invalid("admin.passcode_digits must be between 4 and 12"));
        }
        if self.admin.min_secret_len == 0 {
            return Err(ConfigError::invalid("admin.min_secret_len must be at least 1"));
        }
        if !(4..=31).contains(&self.admin.bcrypt_cost) {
            return Err(ConfigError::invalid("admin.bcrypt_cost must be between 4 and 31"));
        }
        if self.paths.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("paths.log_dir must not be empty"));
        }
        Ok(())
    }

    /// Directory holding stage checkpoints.
    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.paths.log_dir.join("checkpoints")
    }

    /// The append-only run log.
    #[must_use]
    pub fn run_log_path(&self) -> PathBuf {
        self.paths.log_dir.join("provision.log")
    }

    /// The application settings file.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.paths.app_root.join("config.py")
    }

    /// The WSGI entry point served by Apache.
    #[must_use]
    pub fn wsgi_entry(&self) -> PathBuf {
        self.paths.app_root.join("wsgi.py")
    }

    /// The Apache virtual host file for the application site.
    #[must_use]
    pub fn vhost_path(&self) -> PathBuf {
        self.paths
            .apache_sites_dir
            .join(format!("{}.conf", self.web.site_name))
    }

    /// The AMI account file.
    #[must_use]
    pub fn manager_conf(&self) -> PathBuf {
        self.paths.asterisk_dir.join("manager_custom.conf")
    }

    /// The dialplan include file.
    #[must_use]
    pub fn extensions_conf(&self) -> PathBuf {
        self.paths.asterisk_dir.join("extensions_custom.conf")
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.len() <= 64 && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Application checkout served by Apache.
    pub app_root: PathBuf,
    /// Directory for logs, the run log and checkpoints.
    pub log_dir: PathBuf,
    /// Schema script applied to the new database.
    pub schema_script: PathBuf,
    /// Asterisk configuration directory.
    pub asterisk_dir: PathBuf,
    /// Apache `sites-available` directory.
    pub apache_sites_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let app_root = PathBuf::from("/var/www/html/infocall");
        Self {
            log_dir: app_root.join("logs"),
            schema_script: app_root.join("database").join("schema.sql"),
            app_root,
            asterisk_dir: PathBuf::from("/etc/asterisk"),
            apache_sites_dir: PathBuf::from("/etc/apache2/sites-available"),
        }
    }
}

impl PathsConfig {
    /// Re-roots every path under `root`, for tests and staging hosts.
    #[must_use]
    pub fn rooted_at(&self, root: &Path) -> Self {
        let reroot = |p: &Path| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            app_root: reroot(&self.app_root),
            log_dir: reroot(&self.log_dir),
            schema_script: reroot(&self.schema_script),
            asterisk_dir: reroot(&self.asterisk_dir),
            apache_sites_dir: reroot(&self.apache_sites_dir),
        }
    }
}

/// Database server and application account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host used by the application.
    pub host: String,
    /// Application database name.
    pub name: String,
    /// Suggested application user.
    pub app_user: String,
    /// Host the application connects from.
    pub client_host: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            name: "infocall_db".to_string(),
            app_user: "infocall".to_string(),
            client_host: "localhost".to_string(),
        }
    }
}

/// Asterisk integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    /// Suggested AMI user.
    pub ami_user: String,
    /// AMI host the application connects to.
    pub ami_host: String,
    /// AMI port.
    pub ami_port: u16,
    /// Network allowed to use the AMI account.
    pub ami_permit: String,
    /// Suggested IVR extension.
    pub ivr_extension: String,
    /// Dialplan context holding the IVR.
    pub ivr_context: String,
    /// AGI script run by the IVR.
    pub agi_script: String,
    /// Existing context that includes the IVR context.
    pub include_context: String,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            ami_user: "infocall".to_string(),
            ami_host: "127.0.0.1".to_string(),
            ami_port: 5038,
            ami_permit: "127.0.0.1/255.255.255.255".to_string(),
            ivr_extension: "7777".to_string(),
            ivr_context: "infocall-ivr".to_string(),
            agi_script: "ivr_handler.agi".to_string(),
            include_context: "from-internal-custom".to_string(),
        }
    }
}

/// Apache virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listening port, also opened in the firewall.
    pub http_port: u16,
    /// `ServerName` of the virtual host.
    pub server_name: String,
    /// User the WSGI daemon runs as.
    pub wsgi_user: String,
    /// Group the WSGI daemon runs as.
    pub wsgi_group: String,
    /// WSGI daemon threads.
    pub wsgi_threads: u32,
    /// Site name passed to `a2ensite`.
    pub site_name: String,
    /// Service unit reloaded after configuration changes.
    pub service: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            server_name: "localhost".to_string(),
            wsgi_user: "www-data".to_string(),
            wsgi_group: "www-data".to_string(),
            wsgi_threads: 5,
            site_name: "infocall".to_string(),
            service: "apache2".to_string(),
        }
    }
}

/// Packet filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// Persistent `iptables-restore` rules file.
    pub rules_path: PathBuf,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("/etc/iptables/rules.v4"),
        }
    }
}

/// Administrator account rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Digits in the IVR passcode.
    pub passcode_digits: usize,
    /// Minimum length of passwords and secrets.
    pub min_secret_len: usize,
    /// Bcrypt work factor.
    pub bcrypt_cost: u32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            passcode_digits: 4,
            min_secret_len: 8,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Application rate limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Concurrent outbound calls.
    pub max_concurrent_calls: u32,
    /// Outbound SMS per minute.
    pub max_sms_per_minute: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 10,
            max_sms_per_minute: 60,
        }
    }
}

/// External command names or paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Package manager.
    pub apt_get: String,
    /// MySQL client.
    pub mysql: String,
    /// Apache module enabler.
    pub a2enmod: String,
    /// Apache site enabler.
    pub a2ensite: String,
    /// Apache control.
    pub apachectl: String,
    /// Service manager.
    pub systemctl: String,
    /// Asterisk binary.
    pub asterisk: String,
    /// Packet filter loader.
    pub iptables_restore: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            apt_get: "apt-get".to_string(),
            mysql: "mysql".to_string(),
            a2enmod: "a2enmod".to_string(),
            a2ensite: "a2ensite".to_string(),
            apachectl: "apachectl".to_string(),
            systemctl: "systemctl".to_string(),
            asterisk: "asterisk".to_string(),
            iptables_restore: "iptables-restore".to_string(),
        }
    }
}

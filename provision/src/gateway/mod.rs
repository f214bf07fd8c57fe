//! One-shot adapters over external service control surfaces.
//!
//! Every adapter call maps to a single command invocation. There are no
//! retries and no polling: a failure is surfaced with the command's exit
//! status and standard error exactly as reported.

mod accounts;
mod database;
mod firewall;
mod packages;
mod runner;
mod telephony;
mod webserver;

pub use accounts::{
    AccountCredentials, AccountStore, AccountUpsert, AdminAccountAdapter, InMemoryAccountStore,
    MysqlAccountStore, StoredAccount,
};
pub use database::DatabaseClient;
pub use firewall::FirewallControl;
pub use packages::PackageInstaller;
pub use runner::{run_checked, CommandOutput, CommandRunner, Invocation, TokioCommandRunner};
pub use telephony::TelephonyControl;
pub use webserver::{WebServerCommands, WebServerControl};

#[cfg(test)]
pub use runner::MockCommandRunner;

use thiserror::Error;

/// Errors raised by external service adapters.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The command could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line, without secrets.
        command: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Exchanging data with the running command failed.
    #[error("I/O with `{command}` failed: {source}")]
    Io {
        /// The command line, without secrets.
        command: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("`{command}` failed ({}): {}", describe_status(*code), stderr.trim())]
    NonZeroExit {
        /// The command line, without secrets.
        command: String,
        /// Exit code, or `None` if killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The command succeeded but its output could not be understood.
    #[error("unexpected output from `{command}`: {detail}")]
    UnexpectedOutput {
        /// The command line, without secrets.
        command: String,
        /// What was wrong.
        detail: String,
    },
}

fn describe_status(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_message() {
        let err = ServiceError::NonZeroExit {
            command: "iptables-restore --test /etc/iptables/rules.v4".to_string(),
            code: Some(2),
            stderr: "line 12 failed\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`iptables-restore --test /etc/iptables/rules.v4` failed (exit status 2): line 12 failed"
        );
    }

    #[test]
    fn test_signal_exit_message() {
        let err = ServiceError::NonZeroExit {
            command: "mysql".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}

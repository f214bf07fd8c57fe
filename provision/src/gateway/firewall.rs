//! Packet filter rules through `iptables-restore`.

use super::{run_checked, CommandRunner, Invocation, ServiceError};
use std::path::Path;
use std::sync::Arc;

/// Validates and applies a saved rules file.
#[derive(Clone)]
pub struct FirewallControl {
    runner: Arc<dyn CommandRunner>,
    iptables_restore: String,
}

impl FirewallControl {
    /// Creates a controller using the given `iptables-restore` binary.
    pub fn new(runner: Arc<dyn CommandRunner>, iptables_restore: impl Into<String>) -> Self {
        Self {
            runner,
            iptables_restore: iptables_restore.into(),
        }
    }

    /// Parses the rules file without committing it.
    pub async fn test(&self, rules: &Path) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.iptables_restore)
            .arg("--test")
            .arg(rules.display().to_string());
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Replaces the active ruleset with the rules file.
    pub async fn apply(&self, rules: &Path) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.iptables_restore).arg(rules.display().to_string());
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }
}

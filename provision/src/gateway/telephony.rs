//! Asterisk control through `asterisk -rx`.

use super::{run_checked, CommandRunner, Invocation, ServiceError};
use std::sync::Arc;

/// Sends CLI commands to the running Asterisk instance.
#[derive(Clone)]
pub struct TelephonyControl {
    runner: Arc<dyn CommandRunner>,
    asterisk: String,
}

impl TelephonyControl {
    /// Creates a controller using the given `asterisk` binary.
    pub fn new(runner: Arc<dyn CommandRunner>, asterisk: impl Into<String>) -> Self {
        Self {
            runner,
            asterisk: asterisk.into(),
        }
    }

    /// Runs one Asterisk CLI command and returns its output.
    pub async fn cli(&self, command: &str) -> Result<String, ServiceError> {
        let invocation = Invocation::new(&self.asterisk).args(["-rx", command]);
        let output = run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(output.stdout)
    }

    /// Reloads the manager interface so new AMI users take effect.
    pub async fn manager_reload(&self) -> Result<(), ServiceError> {
        self.cli("manager reload").await.map(drop)
    }

    /// Reloads the dialplan.
    pub async fn dialplan_reload(&self) -> Result<(), ServiceError> {
        self.cli("dialplan reload").await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[tokio::test]
    async fn test_reload_commands_are_single_arguments() {
        let runner = Arc::new(RecordingRunner::new());
        let asterisk = TelephonyControl::new(runner.clone(), "asterisk");

        asterisk.manager_reload().await.unwrap();
        asterisk.dialplan_reload().await.unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations[0].args, vec!["-rx", "manager reload"]);
        assert_eq!(invocations[1].args, vec!["-rx", "dialplan reload"]);
    }
}

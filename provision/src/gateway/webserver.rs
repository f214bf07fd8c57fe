//! Apache control.

use super::{run_checked, CommandRunner, Invocation, ServiceError};
use std::sync::Arc;

/// Binary names used by [`WebServerControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebServerCommands {
    /// Module enabler.
    pub a2enmod: String,
    /// Site enabler.
    pub a2ensite: String,
    /// Apache control program.
    pub apachectl: String,
    /// Service manager.
    pub systemctl: String,
}

/// Enables modules and sites, validates the configuration and reloads Apache.
#[derive(Clone)]
pub struct WebServerControl {
    runner: Arc<dyn CommandRunner>,
    commands: WebServerCommands,
    service: String,
}

impl WebServerControl {
    /// Creates a controller for the named service unit.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        commands: WebServerCommands,
        service: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            commands,
            service: service.into(),
        }
    }

    /// Enables an Apache module.
    pub async fn enable_module(&self, module: &str) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.commands.a2enmod).args(["-q", module]);
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Enables a site by name.
    pub async fn enable_site(&self, site: &str) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.commands.a2ensite).args(["-q", site]);
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Validates the full configuration.
    pub async fn config_test(&self) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.commands.apachectl).arg("configtest");
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Reloads the running server.
    pub async fn reload(&self) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.commands.systemctl).args(["reload", self.service.as_str()]);
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CommandOutput;
    use crate::testing::RecordingRunner;

    fn commands() -> WebServerCommands {
        WebServerCommands {
            a2enmod: "a2enmod".to_string(),
            a2ensite: "a2ensite".to_string(),
            apachectl: "apachectl".to_string(),
            systemctl: "systemctl".to_string(),
        }
    }

    #[tokio::test]
    async fn test_command_lines() {
        let runner = Arc::new(RecordingRunner::new());
        let web = WebServerControl::new(runner.clone(), commands(), "apache2");

        web.enable_module("wsgi").await.unwrap();
        web.enable_site("infocall").await.unwrap();
        web.config_test().await.unwrap();
        web.reload().await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "a2enmod -q wsgi",
                "a2ensite -q infocall",
                "apachectl configtest",
                "systemctl reload apache2",
            ]
        );
    }

    #[tokio::test]
    async fn test_config_test_failure_is_verbatim() {
        let runner = Arc::new(
            RecordingRunner::new()
                .respond_to("apachectl configtest", CommandOutput::failure(1, "AH00526: Syntax error")),
        );
        let web = WebServerControl::new(runner, commands(), "apache2");

        let err = web.config_test().await.unwrap_err();
        assert!(err.to_string().contains("AH00526: Syntax error"));
    }
}

//! Stage 1: system packages.

use super::Stage;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::json;

/// Refreshes the package index and installs the configured packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackagesStage;

impl PackagesStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "packages";
}

#[async_trait]
impl Stage for PackagesStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Install system packages"
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        let packages = ctx.config().packages.clone();
        if packages.is_empty() {
            return Ok(StageOutput::skip("no packages configured"));
        }

        let installer = ctx.packages();
        installer.update().await?;
        installer.install(&packages).await?;

        Ok(StageOutput::ok_value("packages", json!(packages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CommandOutput;
    use crate::stages::test_support::Host;
    use crate::testing::{RecordingRunner, ScriptedPrompter};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_updates_then_installs() {
        let mut host = Host::new();
        host.config.packages = vec!["apache2".to_string(), "asterisk".to_string()];
        let runner = Arc::new(RecordingRunner::new());
        let mut ctx = host.context(&runner, &ScriptedPrompter::default());

        let output = PackagesStage.execute(&mut ctx).await.unwrap();

        assert!(output.is_success());
        assert_eq!(
            runner.command_lines(),
            vec!["apt-get update", "apt-get install -y apache2 asterisk"]
        );
    }

    #[tokio::test]
    async fn test_install_failure_surfaces_stderr() {
        let host = Host::new();
        let runner = Arc::new(RecordingRunner::new().respond_to(
            "apt-get update",
            CommandOutput::failure(100, "E: Could not get lock /var/lib/apt/lists/lock"),
        ));
        let mut ctx = host.context(&runner, &ScriptedPrompter::default());

        let err = PackagesStage.execute(&mut ctx).await.unwrap_err();

        assert!(err.to_string().contains("Could not get lock"));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_skips() {
        let mut host = Host::new();
        host.config.packages.clear();
        let runner = Arc::new(RecordingRunner::new());
        let mut ctx = host.context(&runner, &ScriptedPrompter::default());

        let output = PackagesStage.execute(&mut ctx).await.unwrap();

        assert_eq!(output.skip_reason.as_deref(), Some("no packages configured"));
        assert!(runner.invocations().is_empty());
    }
}

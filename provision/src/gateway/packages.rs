//! Package installation through `apt-get`.

use super::{run_checked, CommandRunner, Invocation, ServiceError};
use std::sync::Arc;
use tracing::info;

/// Installs distribution packages non-interactively.
#[derive(Clone)]
pub struct PackageInstaller {
    runner: Arc<dyn CommandRunner>,
    apt_get: String,
}

impl PackageInstaller {
    /// Creates an installer using the given `apt-get` binary.
    pub fn new(runner: Arc<dyn CommandRunner>, apt_get: impl Into<String>) -> Self {
        Self {
            runner,
            apt_get: apt_get.into(),
        }
    }

    fn apt(&self) -> Invocation {
        Invocation::new(&self.apt_get).env("DEBIAN_FRONTEND", "noninteractive")
    }

    /// Refreshes the package index.
    pub async fn update(&self) -> Result<(), ServiceError> {
        run_checked(self.runner.as_ref(), &self.apt().arg("update")).await?;
        Ok(())
    }

    /// Installs the packages. Already installed packages are left as they are.
    pub async fn install(&self, packages: &[String]) -> Result<(), ServiceError> {
        if packages.is_empty() {
            return Ok(());
        }
        info!(count = packages.len(), "Installing packages");
        let invocation = self.apt().args(["install", "-y"]).args(packages.iter().cloned());
        run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[tokio::test]
    async fn test_install_invocation() {
        let runner = Arc::new(RecordingRunner::new());
        let installer = PackageInstaller::new(runner.clone(), "apt-get");

        installer.update().await.unwrap();
        installer
            .install(&["apache2".to_string(), "mariadb-server".to_string()])
            .await
            .unwrap();

        assert_eq!(
            runner.command_lines(),
            vec!["apt-get update", "apt-get install -y apache2 mariadb-server"]
        );
        assert_eq!(
            runner.invocations()[1].env,
            vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_install_runs_nothing() {
        let runner = Arc::new(RecordingRunner::new());
        let installer = PackageInstaller::new(runner.clone(), "apt-get");

        installer.install(&[]).await.unwrap();
        assert!(runner.invocations().is_empty());
    }
}

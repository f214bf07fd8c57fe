//! Stage trait and the InfoCall provisioning stages.
//!
//! Stages are the units of the provisioning pipeline. Each one is safe to
//! run again: files are rewritten only when their content changes, managed
//! blocks are replaced rather than duplicated and accounts are upserted.

mod admin;
mod ami;
mod database;
mod dialplan;
mod firewall;
mod packages;
mod settings;
mod web;

pub use admin::AdminAccountStage;
pub use ami::{ami_block, TelephonyAmiStage};
pub use database::DatabaseStage;
pub use dialplan::{dialplan_block, DialplanStage};
pub use firewall::{firewall_block, FirewallStage};
pub use packages::PackagesStage;
pub use settings::SettingsStage;
pub use web::WebServerStage;

use crate::checkpoint::CheckpointStore;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::editor::{atomic_write, atomic_write_with_mode};
use crate::errors::{ProvisionError, Result};
use crate::pipeline::Pipeline;
use crate::render::RenderedArtifact;
use async_trait::async_trait;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Trait for pipeline stages.
///
/// A stage is identified by its name, which is also its checkpoint key. The
/// pipeline verifies that every stage named by [`Stage::requires`] has a
/// checkpoint before calling [`Stage::execute`].
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns a one-line description for status listings.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the stages whose checkpoints must exist first.
    fn requires(&self) -> &[&str] {
        &[]
    }

    /// Executes the stage.
    ///
    /// An `Err` aborts the run; the stage's checkpoint is written only after
    /// an `Ok`.
    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput>;
}

/// The InfoCall stages in execution order.
#[must_use]
pub fn default_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(PackagesStage),
        Arc::new(DatabaseStage),
        Arc::new(SettingsStage),
        Arc::new(TelephonyAmiStage),
        Arc::new(DialplanStage),
        Arc::new(WebServerStage),
        Arc::new(FirewallStage),
        Arc::new(AdminAccountStage),
    ]
}

/// Builds the InfoCall pipeline over a checkpoint store.
pub fn default_pipeline(checkpoints: Arc<dyn CheckpointStore>) -> Result<Pipeline> {
    Pipeline::new(default_stages(), checkpoints)
}

/// Fails the stage's precondition unless `path` exists.
pub(crate) fn require_path(stage: &str, path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ProvisionError::precondition(
            stage,
            format!("{what} {} not found", path.display()),
        ))
    }
}

/// Writes a whole-file artifact atomically unless the file already holds it.
///
/// Returns true if the file was written.
pub(crate) fn write_artifact(path: &Path, artifact: &RenderedArtifact, mode: Option<u32>) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == artifact.content().as_bytes() => {
            debug!(path = %path.display(), artifact = artifact.name(), "Artifact already current");
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(ProvisionError::io_at("read", path, e)),
    }

    let bytes = artifact.content().as_bytes();
    match mode {
        Some(mode) => atomic_write_with_mode(path, bytes, mode),
        None => atomic_write(path, bytes),
    }
    .map_err(|e| ProvisionError::io_at("write", path, e))?;
    debug!(path = %path.display(), artifact = artifact.name(), "Artifact written");
    Ok(true)
}

/// Creates the parent directory of `path` if needed.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| ProvisionError::io_at("create", parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for stage tests.

    use crate::config::{PathsConfig, ProvisionConfig};
    use crate::context::{Gateways, StageContext};
    use crate::gateway::InMemoryAccountStore;
    use crate::testing::{RecordingRunner, ScriptedPrompter};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// A host filesystem rooted in a temporary directory.
    pub struct Host {
        pub root: TempDir,
        pub config: ProvisionConfig,
    }

    impl Host {
        pub fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let mut config = ProvisionConfig::default();
            config.paths = PathsConfig::default().rooted_at(root.path());
            config.firewall.rules_path = root.path().join("etc/iptables/rules.v4");
            config.admin.bcrypt_cost = 4;
            Self { root, config }
        }

        /// Creates the application checkout, schema and Asterisk directory.
        pub fn prepared() -> Self {
            let host = Self::new();
            fs::create_dir_all(&host.config.paths.app_root).unwrap();
            fs::write(host.config.wsgi_entry(), "application = None\n").unwrap();
            fs::create_dir_all(host.config.paths.schema_script.parent().unwrap()).unwrap();
            fs::write(
                &host.config.paths.schema_script,
                "CREATE TABLE users (id INT PRIMARY KEY);\n",
            )
            .unwrap();
            fs::create_dir_all(&host.config.paths.asterisk_dir).unwrap();
            fs::create_dir_all(&host.config.paths.apache_sites_dir).unwrap();
            host
        }

        pub fn context(
            &self,
            runner: &Arc<RecordingRunner>,
            prompter: &ScriptedPrompter,
        ) -> StageContext {
            StageContext::new(
                Arc::new(self.config.clone()),
                Gateways::new(runner.clone()),
                Box::new(prompter.clone()),
            )
        }

        pub fn context_with_accounts(
            &self,
            runner: &Arc<RecordingRunner>,
            prompter: &ScriptedPrompter,
            accounts: &Arc<InMemoryAccountStore>,
        ) -> StageContext {
            StageContext::new(
                Arc::new(self.config.clone()),
                Gateways::new(runner.clone()).with_account_store(accounts.clone()),
                Box::new(prompter.clone()),
            )
        }
    }
}

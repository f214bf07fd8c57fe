//! Execution context shared by the stages of one run.
//!
//! A [`StageContext`] carries the configuration, the operator prompter, the
//! credentials collected so far and the gateways to external services. It is
//! created once per run and handed to each stage in turn, so credentials
//! collected by an early stage are reused by later ones.

use crate::config::ProvisionConfig;
use crate::core::StageOutput;
use crate::credentials::{CredentialDefaults, CredentialSet, Prompter};
use crate::gateway::{
    AccountStore, AdminAccountAdapter, CommandRunner, DatabaseClient, FirewallControl,
    MysqlAccountStore, PackageInstaller, TelephonyControl, TokioCommandRunner, WebServerCommands,
    WebServerControl,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Access to external services.
#[derive(Clone)]
pub struct Gateways {
    /// Runs every external command.
    pub runner: Arc<dyn CommandRunner>,
    /// Account persistence; defaults to the application database.
    pub accounts: Option<Arc<dyn AccountStore>>,
}

impl Gateways {
    /// Creates gateways over the given command runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            accounts: None,
        }
    }

    /// Creates gateways that run real processes.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(TokioCommandRunner::new()))
    }

    /// Stores accounts in `store` instead of the application database.
    #[must_use]
    pub fn with_account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(store);
        self
    }
}

impl fmt::Debug for Gateways {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateways")
            .field("accounts", &self.accounts.is_some())
            .finish_non_exhaustive()
    }
}

/// The context for stage execution.
pub struct StageContext {
    /// The run identifier.
    run_id: Uuid,
    /// The stage currently executing.
    stage_name: String,
    /// Read-only configuration.
    config: Arc<ProvisionConfig>,
    /// External services.
    gateways: Gateways,
    /// Outputs of stages executed in this run.
    outputs: HashMap<String, StageOutput>,
    /// Credentials collected so far in this run.
    pub credentials: CredentialSet,
    /// The operator terminal.
    pub prompter: Box<dyn Prompter>,
}

impl StageContext {
    /// Creates a context for a new run.
    #[must_use]
    pub fn new(config: Arc<ProvisionConfig>, gateways: Gateways, prompter: Box<dyn Prompter>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage_name: String::new(),
            credentials: CredentialSet::new(CredentialDefaults::from_config(&config)),
            config,
            gateways,
            outputs: HashMap::new(),
            prompter,
        }
    }

    /// Uses a specific run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the name of the stage currently executing.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Returns the gateways.
    #[must_use]
    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    /// Returns the output of a stage executed earlier in this run.
    #[must_use]
    pub fn output(&self, stage: &str) -> Option<&StageOutput> {
        self.outputs.get(stage)
    }

    pub(crate) fn enter_stage(&mut self, stage: &str) {
        stage.clone_into(&mut self.stage_name);
    }

    pub(crate) fn record_output(&mut self, stage: &str, output: StageOutput) {
        self.outputs.insert(stage.to_string(), output);
    }

    /// Package manager adapter.
    #[must_use]
    pub fn packages(&self) -> PackageInstaller {
        PackageInstaller::new(self.gateways.runner.clone(), &self.config.commands.apt_get)
    }

    /// Database client adapter.
    #[must_use]
    pub fn database(&self) -> DatabaseClient {
        DatabaseClient::new(
            self.gateways.runner.clone(),
            &self.config.commands.mysql,
            &self.config.database.host,
        )
    }

    /// Web server adapter.
    #[must_use]
    pub fn web(&self) -> WebServerControl {
        let commands = &self.config.commands;
        WebServerControl::new(
            self.gateways.runner.clone(),
            WebServerCommands {
                a2enmod: commands.a2enmod.clone(),
                a2ensite: commands.a2ensite.clone(),
                apachectl: commands.apachectl.clone(),
                systemctl: commands.systemctl.clone(),
            },
            &self.config.web.service,
        )
    }

    /// Telephony control adapter.
    #[must_use]
    pub fn telephony(&self) -> TelephonyControl {
        TelephonyControl::new(self.gateways.runner.clone(), &self.config.commands.asterisk)
    }

    /// Packet filter adapter.
    #[must_use]
    pub fn firewall(&self) -> FirewallControl {
        FirewallControl::new(
            self.gateways.runner.clone(),
            &self.config.commands.iptables_restore,
        )
    }

    /// Administrator account adapter.
    #[must_use]
    pub fn admin_accounts(&self) -> AdminAccountAdapter {
        let store = self.gateways.accounts.clone().unwrap_or_else(|| {
            Arc::new(MysqlAccountStore::new(self.database(), &self.config.database.name))
        });
        AdminAccountAdapter::new(store, self.config.admin.bcrypt_cost)
    }
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("run_id", &self.run_id)
            .field("stage_name", &self.stage_name)
            .field("gateways", &self.gateways)
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

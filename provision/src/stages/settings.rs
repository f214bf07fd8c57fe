//! Stage 3: application settings file.

use super::{require_path, write_artifact, DatabaseStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::credentials::DatabaseCredentials;
use crate::errors::Result;
use crate::render::{python_literal, templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Settings file permissions: owner read-write, group read.
const SETTINGS_MODE: u32 = 0o640;

/// Writes the application's `config.py` with database, AMI and messaging
/// credentials.
///
/// The database credentials are verified by logging in before anything is
/// written. On failure the operator may re-enter them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsStage;

impl SettingsStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "settings";

    async fn verified_database_credentials(ctx: &mut StageContext) -> Result<DatabaseCredentials> {
        let database = ctx.config().database.name.clone();
        let client = ctx.database();
        loop {
            let creds = ctx.credentials.database(ctx.prompter.as_mut())?;
            match client.ping_as(&creds.user, &creds.password, &database).await {
                Ok(()) => return Ok(creds),
                Err(e) => {
                    warn!(user = %creds.user, error = %e, "Database login failed");
                    ctx.prompter
                        .notify(&format!("Could not log in to the database as '{}': {e}", creds.user));
                    if !ctx.prompter.confirm("Re-enter database credentials?")? {
                        return Err(e.into());
                    }
                    ctx.credentials.forget_database();
                }
            }
        }
    }
}

#[async_trait]
impl Stage for SettingsStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Write the application settings file"
    }

    fn requires(&self) -> &[&str] {
        &[DatabaseStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        require_path(Self::NAME, &ctx.config().paths.app_root, "application directory")?;

        let db = Self::verified_database_credentials(ctx).await?;
        let ami = ctx.credentials.ami(ctx.prompter.as_mut())?;
        let messaging = ctx.credentials.messaging(ctx.prompter.as_mut())?;

        let config = ctx.config();
        let service_sid = messaging
            .messaging_service_sid
            .as_deref()
            .map_or_else(|| "None".to_string(), python_literal);
        let settings = templates::APP_SETTINGS.render(
            &Substitutions::new()
                .with("DB_HOST", python_literal(&config.database.host))
                .with("DB_USER", python_literal(&db.user))
                .secret_with("DB_PASSWORD", &db.password, python_literal)
                .with("DB_NAME", python_literal(&config.database.name))
                .with("AMI_HOST", python_literal(&config.telephony.ami_host))
                .with("AMI_PORT", config.telephony.ami_port.to_string())
                .with("AMI_USERNAME", python_literal(&ami.user))
                .secret_with("AMI_SECRET", &ami.secret, python_literal)
                .with("TWILIO_ACCOUNT_SID", python_literal(&messaging.account_sid))
                .secret_with("TWILIO_AUTH_TOKEN", &messaging.auth_token, python_literal)
                .with("TWILIO_PHONE_NUMBER", python_literal(&messaging.phone_number))
                .with("TWILIO_MESSAGING_SERVICE_SID", service_sid)
                .with("MAX_CONCURRENT_CALLS", config.limits.max_concurrent_calls.to_string())
                .with("MAX_SMS_PER_MINUTE", config.limits.max_sms_per_minute.to_string()),
        )?;

        let path = config.settings_path();
        let changed = write_artifact(&path, &settings, Some(SETTINGS_MODE))?;
        info!(path = %path.display(), changed, "Settings file ready");

        Ok(StageOutput::ok_value("settings_path", json!(path))
            .with_artifact(settings.record().at(&path).with_changed(changed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProvisionError;
    use crate::gateway::CommandOutput;
    use crate::stages::test_support::Host;
    use crate::testing::{RecordingRunner, ScriptedPrompter};
    use std::fs;
    use std::sync::Arc;

    fn sid(prefix: &str) -> String {
        format!("{prefix}{}", "0123456789abcdef".repeat(2))
    }

    fn prompter(db: &[&str]) -> ScriptedPrompter {
        let prompter = ScriptedPrompter::new(db.iter().copied());
        for answer in ["", "ami-secret-1", "ami-secret-1"] {
            prompter.push(answer);
        }
        prompter.push(sid("AC"));
        prompter.push("f".repeat(32));
        prompter.push("+15551234567");
        prompter.push("");
        prompter
    }

    #[tokio::test]
    async fn test_writes_settings_with_restricted_mode() {
        let host = Host::prepared();
        let runner = Arc::new(RecordingRunner::new());
        let mut ctx = host.context(&runner, &prompter(&["", "db'password", "db'password"]));

        let output = SettingsStage.execute(&mut ctx).await.unwrap();

        let path = host.config.settings_path();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("DB_USER = 'infocall'\n"));
        assert!(content.contains("DB_PASSWORD = 'db\\'password'\n"));
        assert!(content.contains("AMI_PORT = 5038\n"));
        assert!(content.contains("TWILIO_MESSAGING_SERVICE_SID = None\n"));
        assert!(content.contains("MAX_SMS_PER_MINUTE = 60\n"));
        assert!(output.changed_anything());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o640);
        }

        let ping = &runner.invocations()[0];
        assert!(ping.args.contains(&"--user=infocall".to_string()));
        assert!(!ping.command_line().contains("db'password"));
    }

    #[tokio::test]
    async fn test_failed_login_can_be_retried() {
        let host = Host::prepared();
        let runner = Arc::new(RecordingRunner::new().respond_to(
            "mysql --batch --skip-column-names --host=localhost --user=wrong --database=infocall_db",
            CommandOutput::failure(1, "ERROR 1045 (28000): Access denied"),
        ));
        let answers = prompter(&[
            "wrong",
            "password1",
            "password1",
            "y",
            "",
            "password2",
            "password2",
        ]);
        let mut ctx = host.context(&runner, &answers);

        SettingsStage.execute(&mut ctx).await.unwrap();

        assert!(answers.messages().iter().any(|m| m.contains("Access denied")));
        let content = fs::read_to_string(host.config.settings_path()).unwrap();
        assert!(content.contains("DB_PASSWORD = 'password2'"));
    }

    #[tokio::test]
    async fn test_declining_retry_fails_with_diagnostic() {
        let host = Host::prepared();
        let runner = Arc::new(
            RecordingRunner::new().respond_when_stdin_contains(
                "SELECT 1;",
                CommandOutput::failure(1, "ERROR 1045 (28000): Access denied"),
            ),
        );
        let mut ctx = host.context(&runner, &prompter(&["", "password1", "password1", "n"]));

        let err = SettingsStage.execute(&mut ctx).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Service(_)));
        assert!(!host.config.settings_path().exists());
    }

    #[tokio::test]
    async fn test_rerun_with_same_answers_leaves_file_alone() {
        let host = Host::prepared();
        let runner = Arc::new(RecordingRunner::new());

        let mut first = host.context(&runner, &prompter(&["", "password1", "password1"]));
        SettingsStage.execute(&mut first).await.unwrap();
        let mut second = host.context(&runner, &prompter(&["", "password1", "password1"]));
        let output = SettingsStage.execute(&mut second).await.unwrap();

        assert!(!output.changed_anything());
    }
}

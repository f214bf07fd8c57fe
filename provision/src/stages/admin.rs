//! Stage 8: administrator account.

use super::{DatabaseStage, SettingsStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::Result;
use crate::gateway::AccountUpsert;
use async_trait::async_trait;
use serde_json::json;

/// Creates the administrator account, or replaces its credentials when an
/// account with the same email already exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminAccountStage;

impl AdminAccountStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "admin-account";
}

#[async_trait]
impl Stage for AdminAccountStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Create or update the administrator account"
    }

    fn requires(&self) -> &[&str] {
        &[DatabaseStage::NAME, SettingsStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        let profile = ctx.credentials.admin(ctx.prompter.as_mut())?;
        let outcome = ctx.admin_accounts().upsert(&profile).await?;

        let output = StageOutput::ok_value("email", json!(profile.email));
        Ok(match outcome {
            AccountUpsert::Created => output.with_value("outcome", json!("created")),
            AccountUpsert::Updated(id) => output
                .with_value("outcome", json!("updated"))
                .with_value("account_id", json!(id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryAccountStore;
    use crate::stages::test_support::Host;
    use crate::testing::{RecordingRunner, ScriptedPrompter};
    use std::sync::Arc;

    fn answers(password: &str) -> Vec<String> {
        [
            "admin@example.com",
            password,
            password,
            "2468",
            "2468",
            "5551234567",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    #[tokio::test]
    async fn test_creates_then_updates_single_account() {
        let host = Host::new();
        let runner = Arc::new(RecordingRunner::new());
        let accounts = Arc::new(InMemoryAccountStore::new());

        let prompter = ScriptedPrompter::new(answers("first-pass"));
        let mut ctx = host.context_with_accounts(&runner, &prompter, &accounts);
        let created = AdminAccountStage.execute(&mut ctx).await.unwrap();

        let prompter = ScriptedPrompter::new(answers("second-pass"));
        let mut ctx = host.context_with_accounts(&runner, &prompter, &accounts);
        let updated = AdminAccountStage.execute(&mut ctx).await.unwrap();

        assert_eq!(created.get("outcome"), Some(&json!("created")));
        assert_eq!(updated.get("outcome"), Some(&json!("updated")));
        assert_eq!(updated.get("account_id"), Some(&json!(1)));
        assert_eq!(accounts.len(), 1);

        let stored = accounts.get("admin@example.com").unwrap();
        assert!(bcrypt::verify("second-pass", &stored.password_hash).unwrap());
        assert!(bcrypt::verify("2468", &stored.ivr_passcode_hash).unwrap());
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_passwords_never_reach_output() {
        let host = Host::new();
        let runner = Arc::new(RecordingRunner::new());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let prompter = ScriptedPrompter::new(answers("visible-pass"));
        let mut ctx = host.context_with_accounts(&runner, &prompter, &accounts);

        let output = AdminAccountStage.execute(&mut ctx).await.unwrap();

        let serialized = serde_json::to_string(&output).unwrap();
        assert!(!serialized.contains("visible-pass"));
        assert!(!serialized.contains("2468"));
        assert_eq!(prompter.secret_prompts(), 4);
    }
}

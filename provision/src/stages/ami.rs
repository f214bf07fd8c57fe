//! Stage 4: Asterisk Manager Interface account.

use super::{require_path, PackagesStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::editor::{upsert_block, ManagedBlock, Placement};
use crate::errors::Result;
use crate::render::{templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// The managed block holding the AMI account in `manager_custom.conf`.
#[must_use]
pub fn ami_block() -> ManagedBlock {
    ManagedBlock::new("; BEGIN INFOCALL AMI USER", "; END INFOCALL AMI USER")
        .with_legacy("; InfoCall AMI user start", "; InfoCall AMI user end")
}

/// Adds the application's AMI account and reloads the manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelephonyAmiStage;

impl TelephonyAmiStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "telephony-ami";
}

#[async_trait]
impl Stage for TelephonyAmiStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Configure the Asterisk Manager Interface account"
    }

    fn requires(&self) -> &[&str] {
        &[PackagesStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        require_path(Self::NAME, &ctx.config().paths.asterisk_dir, "Asterisk configuration directory")?;

        let ami = ctx.credentials.ami(ctx.prompter.as_mut())?;
        let config = ctx.config();
        let stanza = templates::AMI_USER.render(
            &Substitutions::new()
                .with("AMI_USER", &ami.user)
                .secret("AMI_SECRET", &ami.secret)
                .with("AMI_PERMIT", &config.telephony.ami_permit),
        )?;

        let path = config.manager_conf();
        let outcome = upsert_block(&path, &ami_block(), stanza.content(), &Placement::AtEnd)?;
        ctx.telephony().manager_reload().await?;
        info!(path = %path.display(), changed = outcome.changed(), "AMI account configured");

        Ok(StageOutput::ok_value("ami_user", json!(ami.user))
            .with_artifact(stanza.record().at(&path).with_changed(outcome.changed())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProvisionError;
    use crate::stages::test_support::Host;
    use crate::testing::{RecordingRunner, ScriptedPrompter};
    use std::fs;
    use std::sync::Arc;

    fn answers() -> ScriptedPrompter {
        ScriptedPrompter::new(["", "Sup3rSecret", "Sup3rSecret"])
    }

    #[tokio::test]
    async fn test_appends_block_and_reloads() {
        let host = Host::prepared();
        let path = host.config.manager_conf();
        fs::write(&path, "[admin]\nsecret = operator\n").unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let mut ctx = host.context(&runner, &answers());

        let output = TelephonyAmiStage.execute(&mut ctx).await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[admin]\nsecret = operator\n; BEGIN INFOCALL AMI USER\n[infocall]\n"));
        assert!(content.contains("secret = Sup3rSecret\n"));
        assert!(content.ends_with("; END INFOCALL AMI USER\n"));
        assert_eq!(runner.command_lines(), vec!["asterisk -rx manager reload"]);
        assert!(!serde_json::to_string(&output).unwrap().contains("Sup3rSecret"));
    }

    #[tokio::test]
    async fn test_rerun_replaces_legacy_block_once() {
        let host = Host::prepared();
        let path = host.config.manager_conf();
        fs::write(
            &path,
            "; InfoCall AMI user start\n[infocall]\nsecret = old\n; InfoCall AMI user end\n[other]\n",
        )
        .unwrap();
        let runner = Arc::new(RecordingRunner::new());

        let mut first = host.context(&runner, &answers());
        TelephonyAmiStage.execute(&mut first).await.unwrap();
        let after_first = fs::read_to_string(&path).unwrap();
        let mut second = host.context(&runner, &answers());
        let output = TelephonyAmiStage.execute(&mut second).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
        assert_eq!(after_first.matches("[infocall]").count(), 1);
        assert!(!after_first.contains("secret = old"));
        assert!(after_first.starts_with("[other]\n"));
        assert!(!output.changed_anything());
    }

    #[tokio::test]
    async fn test_missing_asterisk_dir() {
        let host = Host::new();
        let runner = Arc::new(RecordingRunner::new());
        let mut ctx = host.context(&runner, &answers());

        let err = TelephonyAmiStage.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Precondition { .. }));
    }
}

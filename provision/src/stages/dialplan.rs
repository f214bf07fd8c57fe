//! Stage 5: IVR dialplan.

use super::{require_path, Stage, TelephonyAmiStage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::editor::{upsert_block, ManagedBlock, Placement};
use crate::errors::Result;
use crate::render::{templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// The managed block holding the IVR context in `extensions_custom.conf`.
#[must_use]
pub fn dialplan_block() -> ManagedBlock {
    ManagedBlock::new("; BEGIN INFOCALL IVR", "; END INFOCALL IVR")
        .with_legacy("; InfoCall IVR start", "; InfoCall IVR end")
}

/// Routes the IVR extension to the application's AGI script.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialplanStage;

impl DialplanStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "dialplan";
}

#[async_trait]
impl Stage for DialplanStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Install the IVR dialplan context"
    }

    fn requires(&self) -> &[&str] {
        &[TelephonyAmiStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        require_path(Self::NAME, &ctx.config().paths.asterisk_dir, "Asterisk configuration directory")?;

        let extension = ctx.credentials.ivr_extension(ctx.prompter.as_mut())?;
        let telephony = &ctx.config().telephony;
        let context = templates::IVR_DIALPLAN.render(
            &Substitutions::new()
                .with("IVR_CONTEXT", &telephony.ivr_context)
                .with("IVR_EXTENSION", &extension)
                .with("AGI_SCRIPT", &telephony.agi_script)
                .with("DIALPLAN_INCLUDE_CONTEXT", &telephony.include_context),
        )?;

        let path = ctx.config().extensions_conf();
        let outcome = upsert_block(&path, &dialplan_block(), context.content(), &Placement::AtEnd)?;
        ctx.telephony().dialplan_reload().await?;
        info!(extension = %extension, changed = outcome.changed(), "IVR dialplan installed");

        Ok(StageOutput::ok_value("ivr_extension", json!(extension))
            .with_artifact(context.record().at(&path).with_changed(outcome.changed())))
    }
}

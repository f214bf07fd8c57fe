//! Stage 7: packet filter.

use super::{ensure_parent, PackagesStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::editor::{commit_edit, plan_block, ManagedBlock, Placement};
use crate::errors::{ProvisionError, Result};
use crate::render::{templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Table header the accept rule belongs to.
const FILTER_TABLE: &str = "*filter";
/// Line that ends a table in `iptables-save` format.
const COMMIT: &str = "COMMIT";

/// The managed block holding the web accept rule in the saved ruleset.
#[must_use]
pub fn firewall_block() -> ManagedBlock {
    ManagedBlock::new("# BEGIN INFOCALL HTTP", "# END INFOCALL HTTP")
}

/// Opens the web port in the persisted ruleset.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirewallStage;

impl FirewallStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "firewall";
}

#[async_trait]
impl Stage for FirewallStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Allow HTTP through the packet filter"
    }

    fn requires(&self) -> &[&str] {
        &[PackagesStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        let config = ctx.config();
        let port = config.web.http_port;
        let rule = templates::FIREWALL_ACCEPT.render(&Substitutions::new().with("HTTP_PORT", port.to_string()))?;

        let path = config.firewall.rules_path.clone();
        let plan = plan_block(
            &path,
            &firewall_block(),
            rule.content(),
            &Placement::before_in_section(COMMIT, FILTER_TABLE),
        )?;

        // The saved ruleset is only replaced once the candidate passes.
        ensure_parent(&path)?;
        let candidate = write_candidate(&path, &plan.content)?;
        let firewall = ctx.firewall();
        firewall.test(candidate.path()).await?;
        let outcome = commit_edit(&path, &plan)?;
        firewall.apply(&path).await?;
        info!(port, changed = outcome.changed(), "Firewall rule active");

        Ok(StageOutput::ok_value("http_port", json!(port))
            .with_artifact(rule.record().at(&path).with_changed(outcome.changed())))
    }
}

/// Writes `content` to a temporary file beside `path`, removed on drop.
fn write_candidate(path: &Path, content: &str) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let write = || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(".infocall-rules-")
            .suffix(".candidate")
            .tempfile_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(file)
    };
    let candidate = write().map_err(|e| ProvisionError::io_at("stage candidate rules for", path, e))?;
    debug!(candidate = %candidate.path().display(), "Candidate ruleset written");
    Ok(candidate)
}

//! Stage 6: Apache virtual host.

use super::{ensure_parent, require_path, write_artifact, SettingsStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::{ProvisionError, Result};
use crate::render::{templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use tracing::info;

/// WSGI module enabled for the site.
const WSGI_MODULE: &str = "wsgi";

/// Serves the application through `mod_wsgi`.
///
/// The configuration is always tested before Apache is reloaded, so a broken
/// virtual host never replaces a working one in the running server.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebServerStage;

impl WebServerStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "web-server";
}

#[async_trait]
impl Stage for WebServerStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Configure and reload the Apache virtual host"
    }

    fn requires(&self) -> &[&str] {
        &[SettingsStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        let config = ctx.config();
        require_path(Self::NAME, &config.wsgi_entry(), "WSGI entry point")?;

        let log_dir = &config.paths.log_dir;
        fs::create_dir_all(log_dir).map_err(|e| ProvisionError::io_at("create", log_dir, e))?;

        let vhost = templates::APACHE_VHOST.render(
            &Substitutions::new()
                .with("HTTP_PORT", config.web.http_port.to_string())
                .with("SERVER_NAME", &config.web.server_name)
                .with("WSGI_USER", &config.web.wsgi_user)
                .with("WSGI_GROUP", &config.web.wsgi_group)
                .with("WSGI_THREADS", config.web.wsgi_threads.to_string())
                .with("APP_ROOT", config.paths.app_root.display().to_string())
                .with("LOG_DIR", log_dir.display().to_string()),
        )?;

        let path = config.vhost_path();
        ensure_parent(&path)?;
        let changed = write_artifact(&path, &vhost, None)?;
        let site = config.web.site_name.clone();

        let web = ctx.web();
        web.enable_module(WSGI_MODULE).await?;
        web.enable_site(&site).await?;
        web.config_test().await?;
        web.reload().await?;
        info!(site = %site, changed, "Virtual host active");

        Ok(StageOutput::ok_value("site", json!(site))
            .with_artifact(vhost.record().at(&path).with_changed(changed)))
    }
}

//! Stage 2: application database.

use super::{require_path, PackagesStage, Stage};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::{ProvisionError, Result};
use crate::render::{sql_string, templates, Substitutions};
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use tracing::info;

/// Creates the database and application account, then imports the schema.
///
/// The schema is only imported into a database without tables, so a re-run
/// refreshes the account without touching existing data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseStage;

impl DatabaseStage {
    /// Stage name and checkpoint key.
    pub const NAME: &'static str = "database";
}

#[async_trait]
impl Stage for DatabaseStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Create the database, application user and schema"
    }

    fn requires(&self) -> &[&str] {
        &[PackagesStage::NAME]
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<StageOutput> {
        let schema_path = ctx.config().paths.schema_script.clone();
        require_path(Self::NAME, &schema_path, "schema script")?;
        let schema = fs::read_to_string(&schema_path)
            .map_err(|e| ProvisionError::io_at("read", &schema_path, e))?;

        let creds = ctx.credentials.database(ctx.prompter.as_mut())?;
        let db_config = &ctx.config().database;
        let bootstrap = templates::DB_BOOTSTRAP.render(
            &Substitutions::new()
                .with("DB_NAME", &db_config.name)
                .with("DB_USER", sql_string(&creds.user))
                .with("DB_CLIENT_HOST", sql_string(&db_config.client_host))
                .secret_with("DB_PASSWORD", &creds.password, sql_string),
        )?;
        let name = db_config.name.clone();

        let db = ctx.database();
        db.execute(&bootstrap).await?;

        let tables = db.table_count(&name).await?;
        let imported = tables == 0;
        if imported {
            db.import_schema(&name, &schema).await?;
            info!(database = %name, "Schema imported");
        } else {
            info!(database = %name, tables, "Database already has tables, schema import skipped");
        }

        Ok(StageOutput::ok_value("database", json!(name))
            .with_value("db_user", json!(creds.user))
            .with_value("schema_imported", json!(imported))
            .with_artifact(bootstrap.record().with_changed(true)))
    }
}

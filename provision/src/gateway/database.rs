//! MySQL access through the `mysql` client.

use super::{run_checked, CommandRunner, Invocation, ServiceError};
use crate::credentials::SecretString;
use crate::render::{sql_string, templates, RenderedArtifact, Substitutions};
use std::sync::Arc;
use tracing::debug;

/// Runs SQL through the `mysql` command line client.
///
/// Administrative statements run as the local superuser over the server's
/// socket. SQL always travels on standard input and passwords in the
/// `MYSQL_PWD` environment variable, so neither shows up in a process list.
#[derive(Clone)]
pub struct DatabaseClient {
    runner: Arc<dyn CommandRunner>,
    mysql: String,
    host: String,
}

impl DatabaseClient {
    /// Creates a client using the given `mysql` binary and server host.
    pub fn new(runner: Arc<dyn CommandRunner>, mysql: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            runner,
            mysql: mysql.into(),
            host: host.into(),
        }
    }

    fn base(&self, database: Option<&str>) -> Invocation {
        let invocation = Invocation::new(&self.mysql).args(["--batch", "--skip-column-names"]);
        match database {
            Some(db) => invocation.arg(format!("--database={db}")),
            None => invocation,
        }
    }

    /// Executes a rendered SQL batch as the superuser.
    pub async fn execute(&self, batch: &RenderedArtifact) -> Result<(), ServiceError> {
        self.execute_in(None, batch).await
    }

    /// Executes a rendered SQL batch as the superuser against `database`.
    pub async fn execute_in(
        &self,
        database: Option<&str>,
        batch: &RenderedArtifact,
    ) -> Result<(), ServiceError> {
        debug!(batch = batch.name(), digest = %batch.digest(), "Executing SQL batch");
        let invocation = self.base(database).stdin(batch.content());
        match run_checked(self.runner.as_ref(), &invocation).await {
            Ok(_) => Ok(()),
            // mysql quotes the failing statement, secrets included.
            Err(ServiceError::NonZeroExit { command, code, stderr }) if batch.is_sensitive() => {
                Err(ServiceError::NonZeroExit { command, code, stderr: batch.redact(&stderr) })
            }
            Err(e) => Err(e),
        }
    }

    /// Applies a schema script verbatim to `database`.
    pub async fn import_schema(&self, database: &str, script: &str) -> Result<(), ServiceError> {
        debug!(database, bytes = script.len(), "Importing schema");
        let invocation = self.base(Some(database)).stdin(script);
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Runs a query as the superuser and returns its tab-separated rows.
    pub async fn query(&self, database: Option<&str>, sql: &str) -> Result<Vec<Vec<String>>, ServiceError> {
        let invocation = self.base(database).stdin(sql);
        let output = run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(output
            .stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.split('\t').map(str::to_string).collect())
            .collect())
    }

    /// Verifies that `user` can log in with `password` and reach `database`.
    pub async fn ping_as(
        &self,
        user: &str,
        password: &SecretString,
        database: &str,
    ) -> Result<(), ServiceError> {
        let invocation = Invocation::new(&self.mysql)
            .args(["--batch", "--skip-column-names"])
            .arg(format!("--host={}", self.host))
            .arg(format!("--user={user}"))
            .arg(format!("--database={database}"))
            .env("MYSQL_PWD", password.expose())
            .stdin("SELECT 1;\n");
        run_checked(self.runner.as_ref(), &invocation).await.map(drop)
    }

    /// Returns the number of tables in `database`.
    pub async fn table_count(&self, database: &str) -> Result<u64, ServiceError> {
        let subs = Substitutions::new().with("DB_NAME", sql_string(database));
        let sql = templates::TABLE_COUNT
            .render(&subs)
            .map_err(|e| ServiceError::UnexpectedOutput {
                command: self.mysql.clone(),
                detail: e.to_string(),
            })?;
        let rows = self.query(None, sql.content()).await?;

        rows.first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.trim().parse().ok())
            .ok_or_else(|| ServiceError::UnexpectedOutput {
                command: self.base(None).command_line(),
                detail: format!("expected a table count, got {rows:?}"),
            })
    }
}

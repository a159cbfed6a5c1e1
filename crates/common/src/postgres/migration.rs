use crate::postgres::PostgresConfig;
use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Applies the goose migrations for the location store.
///
/// `goose up` only applies versions not yet recorded in the database, so
/// running this on every start is safe.
pub struct PostgresMigrator {
    goose_binary_path: String,
    migrations_dir: String,
    dsn: String,
}

impl PostgresMigrator {
    pub fn new(config: &PostgresConfig) -> Self {
        Self::from_parts(
            config.goose_binary_path.clone(),
            config.migrations_dir.clone(),
            config.dsn(),
        )
    }

    pub fn from_parts(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            dsn,
        }
    }

    /// Runs all pending migrations
    ///
    /// # Errors
    /// Fails if the goose binary cannot be spawned, the database is
    /// unreachable, or a migration fails to apply.
    pub async fn run_migrations(&self) -> Result<()> {
        info!(migrations_dir = %self.migrations_dir, "running postgres migrations");

        let output = Command::new(&self.goose_binary_path)
            .args(["-dir", &self.migrations_dir, "postgres", &self.dsn, "up"])
            .output()
            .await
            .with_context(|| format!("failed to execute {}", self.goose_binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!("Migration failed.\nstdout: {}\nstderr: {}", stdout, stderr);
        }

        debug!(
            "migrations completed successfully:\n{}",
            String::from_utf8_lossy(&output.stdout)
        );
        Ok(())
    }
}

//! Schema management for the backend's `Posts` table.

use logipost_core::{CoreError, DatabaseError};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;


pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!(url = %self.connection_string, "Connected to database");
        self.pool = Some(pool);
        Ok(())
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| DatabaseError::NotConnected.into())
    }

    /// Applies every pending migration.
    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        MIGRATOR
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        info!(latest = ?self.applied_versions().await?.last(), "Migrations up to date");
        Ok(())
    }

    /// Reverts the most recently applied migration. Returns its version, or
    /// `None` when nothing was applied.
    pub async fn revert_last(&self) -> Result<Option<i64>, CoreError> {
        let applied = self.applied_versions().await?;
        let Some(&last) = applied.last() else {
            return Ok(None);
        };
        let target = applied.iter().rev().nth(1).copied().unwrap_or(0);

        MIGRATOR
            .undo(self.pool()?, target)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: format!("{}: {}", last, e),
            })?;
        info!(version = last, "Reverted migration");
        Ok(Some(last))
    }

    /// Versions recorded as applied, oldest first.
    pub async fn applied_versions(&self) -> Result<Vec<i64>, CoreError> {
        let pool = self.pool()?;
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_one(pool)
        .await
        .map_err(DatabaseError::from)?;
        if exists == 0 {
            return Ok(Vec::new());
        }

        let versions: Vec<i64> = sqlx::query_scalar(
            "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
        )
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(versions)
    }

    pub async fn column_names(&self, table: &str) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::from(e).into())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

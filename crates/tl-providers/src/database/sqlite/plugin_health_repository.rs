//! SQLite plugin-health repository.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use tl_domain::entities::PluginHealth;
use tl_domain::error::Result;
use tl_domain::ports::PluginHealthRepository;

use super::row::{db_err, fmt_time, health_from_row};

/// Plugin-health persistence over SQLite.
pub struct SqlitePluginHealthRepository {
    pool: SqlitePool,
}

impl SqlitePluginHealthRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PluginHealthRepository for SqlitePluginHealthRepository {
    async fn get(&self, name: &str) -> Result<Option<PluginHealth>> {
        let row = sqlx::query("SELECT * FROM plugin_health WHERE plugin_name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(health_from_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<PluginHealth>> {
        let rows = sqlx::query("SELECT * FROM plugin_health ORDER BY plugin_name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(health_from_row).collect()
    }

    async fn upsert(&self, health: &PluginHealth) -> Result<()> {
        sqlx::query(
            "INSERT INTO plugin_health
                (plugin_name, last_run, last_success, last_error, consecutive_failures, total_runs, success_rate, is_healthy)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (plugin_name) DO UPDATE SET
                last_run = excluded.last_run,
                last_success = excluded.last_success,
                last_error = excluded.last_error,
                consecutive_failures = excluded.consecutive_failures,
                total_runs = excluded.total_runs,
                success_rate = excluded.success_rate,
                is_healthy = excluded.is_healthy",
        )
        .bind(&health.plugin_name)
        .bind(health.last_run.map(fmt_time))
        .bind(health.last_success.map(fmt_time))
        .bind(&health.last_error)
        .bind(i64::from(health.consecutive_failures))
        .bind(health.total_runs as i64)
        .bind(health.success_rate)
        .bind(i64::from(health.is_healthy))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plugin_health WHERE plugin_name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

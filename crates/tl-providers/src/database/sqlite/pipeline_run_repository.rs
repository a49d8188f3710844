//! SQLite pipeline-run repository.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use tl_domain::entities::PipelineRun;
use tl_domain::error::Result;
use tl_domain::ports::PipelineRunRepository;

use super::row::{db_err, fmt_time, run_from_row};

/// Pipeline-run persistence over SQLite.
pub struct SqlitePipelineRunRepository {
    pool: SqlitePool,
}

impl SqlitePipelineRunRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRunRepository for SqlitePipelineRunRepository {
    async fn save(&self, run: &PipelineRun) -> Result<()> {
        sqlx::query(
            "INSERT INTO pipeline_runs
                (id, started_at, completed_at, status, items_in, items_out, topics, trends, errors, config_snapshot)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                completed_at = excluded.completed_at,
                status = excluded.status,
                items_in = excluded.items_in,
                items_out = excluded.items_out,
                topics = excluded.topics,
                trends = excluded.trends,
                errors = excluded.errors",
        )
        .bind(run.id.to_string())
        .bind(fmt_time(run.started_at))
        .bind(run.completed_at.map(fmt_time))
        .bind(run.status.to_string())
        .bind(run.items_in as i64)
        .bind(run.items_out as i64)
        .bind(run.topics as i64)
        .bind(run.trends as i64)
        .bind(serde_json::to_string(&run.errors)?)
        .bind(serde_json::to_string(&run.config_snapshot)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        let row = sqlx::query("SELECT * FROM pipeline_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<PipelineRun>> {
        let rows = sqlx::query("SELECT * FROM pipeline_runs ORDER BY started_at DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(run_from_row).collect()
    }
}

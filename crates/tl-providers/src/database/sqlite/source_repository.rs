//! SQLite collector-source repository.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use tl_domain::entities::CollectorSource;
use tl_domain::error::{Error, Result};
use tl_domain::ports::CollectorSourceRepository;

use super::row::{db_err, fmt_time, source_from_row};

/// Collector-source persistence over SQLite.
pub struct SqliteCollectorSourceRepository {
    pool: SqlitePool,
}

impl SqliteCollectorSourceRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn auth_json(source: &CollectorSource) -> Result<Option<String>> {
        source
            .auth
            .as_ref()
            .map(|auth| serde_json::to_string(auth).map_err(Error::from))
            .transpose()
    }

    fn unique_violation(e: &sqlx::Error) -> bool {
        matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
    }
}

#[async_trait]
impl CollectorSourceRepository for SqliteCollectorSourceRepository {
    async fn list_all(&self) -> Result<Vec<CollectorSource>> {
        let rows = sqlx::query("SELECT * FROM collector_sources ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(source_from_row).collect()
    }

    async fn list_enabled(&self) -> Result<Vec<CollectorSource>> {
        let rows =
            sqlx::query("SELECT * FROM collector_sources WHERE enabled = 1 ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.iter().map(source_from_row).collect()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<CollectorSource>> {
        let row = sqlx::query("SELECT * FROM collector_sources WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn create(&self, source: &CollectorSource) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO collector_sources
                (name, source_type, url, schedule, rate_limit_per_hour, timeout_secs, language,
                 include_keywords, exclude_keywords, auth, code_body, enabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&source.name)
        .bind(source.source_type.to_string())
        .bind(&source.url)
        .bind(&source.schedule)
        .bind(i64::from(source.rate_limit_per_hour))
        .bind(source.timeout_secs as i64)
        .bind(&source.language)
        .bind(serde_json::to_string(&source.include_keywords)?)
        .bind(serde_json::to_string(&source.exclude_keywords)?)
        .bind(Self::auth_json(source)?)
        .bind(&source.code_body)
        .bind(i64::from(source.enabled))
        .bind(fmt_time(source.created_at))
        .bind(fmt_time(source.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::unique_violation(&e) {
                Error::validation(format!("source name '{}' is already taken", source.name))
            } else {
                db_err(e)
            }
        })?;
        Ok(result.last_insert_rowid())
    }

    async fn update(&self, source: &CollectorSource) -> Result<()> {
        let result = sqlx::query(
            "UPDATE collector_sources SET
                name = ?, source_type = ?, url = ?, schedule = ?, rate_limit_per_hour = ?,
                timeout_secs = ?, language = ?, include_keywords = ?, exclude_keywords = ?,
                auth = ?, code_body = ?, enabled = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&source.name)
        .bind(source.source_type.to_string())
        .bind(&source.url)
        .bind(&source.schedule)
        .bind(i64::from(source.rate_limit_per_hour))
        .bind(source.timeout_secs as i64)
        .bind(&source.language)
        .bind(serde_json::to_string(&source.include_keywords)?)
        .bind(serde_json::to_string(&source.exclude_keywords)?)
        .bind(Self::auth_json(source)?)
        .bind(&source.code_body)
        .bind(i64::from(source.enabled))
        .bind(fmt_time(chrono::Utc::now()))
        .bind(source.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("collector source {}", source.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collector_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE collector_sources SET enabled = ?, updated_at = ? WHERE name = ?",
        )
        .bind(i64::from(enabled))
        .bind(fmt_time(chrono::Utc::now()))
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("collector source '{name}'")));
        }
        Ok(())
    }
}

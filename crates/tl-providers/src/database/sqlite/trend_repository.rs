//! SQLite trend repository.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::QueryBuilder;
use uuid::Uuid;

use tl_domain::entities::{Category, Trend};
use tl_domain::error::Result;
use tl_domain::ports::TrendRepository;
use tl_domain::value_objects::ListFilter;

use super::row::{db_err, fmt_time, trend_from_row};

/// Trend persistence over SQLite.
pub struct SqliteTrendRepository {
    pool: SqlitePool,
}

impl SqliteTrendRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &ListFilter) {
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(states) = &filter.states
            && !states.is_empty()
        {
            qb.push(" AND state IN (");
            let mut separated = qb.separated(", ");
            for state in states {
                separated.push_bind(state.to_string());
            }
            qb.push(")");
        }
        if let Some(sources) = &filter.sources
            && !sources.is_empty()
        {
            // sources is a JSON array column; membership via the quoted form.
            qb.push(" AND (");
            for (i, source) in sources.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("sources LIKE ")
                    .push_bind(format!("%\"{source}\"%"));
            }
            qb.push(")");
        }
        if let Some(language) = &filter.language {
            qb.push(" AND language = ").push_bind(language.clone());
        }
        if let Some(min_score) = filter.min_score {
            qb.push(" AND score >= ").push_bind(min_score);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(fmt_time(from));
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(fmt_time(to));
        }
    }

    async fn upsert(&self, trend: &Trend) -> Result<()> {
        sqlx::query(
            "INSERT INTO trends (id, topic_id, rank, score, state, velocity, sources, language, title, summary, category, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                topic_id = excluded.topic_id,
                rank = excluded.rank,
                score = excluded.score,
                state = excluded.state,
                velocity = excluded.velocity,
                sources = excluded.sources,
                language = excluded.language,
                title = excluded.title,
                summary = excluded.summary,
                category = excluded.category,
                created_at = excluded.created_at",
        )
        .bind(trend.id.to_string())
        .bind(trend.topic_id.to_string())
        .bind(i64::from(trend.rank))
        .bind(trend.score)
        .bind(trend.state.to_string())
        .bind(trend.velocity)
        .bind(serde_json::to_string(&trend.sources)?)
        .bind(&trend.language)
        .bind(&trend.title)
        .bind(&trend.summary)
        .bind(trend.category.to_string())
        .bind(fmt_time(trend.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl TrendRepository for SqliteTrendRepository {
    async fn save(&self, trend: &Trend) -> Result<()> {
        self.upsert(trend).await
    }

    async fn save_batch(&self, trends: &[Trend]) -> Result<()> {
        for trend in trends {
            self.upsert(trend).await?;
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trend>> {
        let row = sqlx::query("SELECT * FROM trends WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(trend_from_row).transpose()
    }

    async fn get_by_topic(&self, topic_id: Uuid) -> Result<Option<Trend>> {
        let row = sqlx::query(
            "SELECT * FROM trends WHERE topic_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(topic_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(trend_from_row).transpose()
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Trend>> {
        let mut qb = QueryBuilder::new("SELECT * FROM trends WHERE 1=1");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY score DESC, id ASC");
        qb.push(" LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(50)));
        qb.push(" OFFSET ")
            .push_bind(i64::from(filter.offset.unwrap_or(0)));

        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(trend_from_row).collect()
    }

    async fn count(&self, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM trends WHERE 1=1");
        Self::push_filter(&mut qb, filter);
        let row = qb.build().fetch_one(&self.pool).await.map_err(db_err)?;
        let n: i64 = sqlx::Row::try_get(&row, "n").map_err(db_err)?;
        Ok(n.max(0) as u64)
    }

    async fn top(&self, limit: u32, category: Option<Category>) -> Result<Vec<Trend>> {
        let filter = ListFilter {
            category,
            limit: Some(limit),
            ..Default::default()
        };
        self.list(&filter).await
    }

    async fn search(&self, keywords: &[String], limit: u32) -> Result<Vec<Trend>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new("SELECT * FROM trends WHERE 1=1 AND (");
        for (i, keyword) in keywords.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            let pattern = format!("%{}%", keyword.to_lowercase());
            qb.push("LOWER(title) LIKE ").push_bind(pattern.clone());
            qb.push(" OR LOWER(summary) LIKE ").push_bind(pattern);
        }
        qb.push(") ORDER BY score DESC, id ASC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(trend_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trends WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

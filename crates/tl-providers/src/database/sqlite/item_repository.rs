//! SQLite processed-item repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use tl_domain::entities::ProcessedItem;
use tl_domain::error::Result;
use tl_domain::ports::ItemRepository;

use super::row::{db_err, fmt_time, item_from_row};

/// Processed-item persistence over SQLite.
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn count_all(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_items")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn save_batch(&self, items: &[ProcessedItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let before = self.count_all().await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for item in items {
            sqlx::query(
                "INSERT INTO processed_items
                    (id, source, source_id, url, title, normalized_title, body, author, published_at,
                     upvotes, downvotes, comments, shares, views, category, language_hint, language,
                     language_confidence, keywords, sentiment, tags, processed_at, embedded)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
                 ON CONFLICT (source, source_id) DO UPDATE SET
                    title = excluded.title,
                    normalized_title = excluded.normalized_title,
                    body = excluded.body,
                    author = excluded.author,
                    upvotes = excluded.upvotes,
                    downvotes = excluded.downvotes,
                    comments = excluded.comments,
                    shares = excluded.shares,
                    views = excluded.views,
                    category = excluded.category,
                    language = excluded.language,
                    language_confidence = excluded.language_confidence,
                    keywords = excluded.keywords,
                    sentiment = excluded.sentiment,
                    tags = excluded.tags,
                    processed_at = excluded.processed_at",
            )
            .bind(item.id.to_string())
            .bind(&item.source)
            .bind(&item.source_id)
            .bind(&item.url)
            .bind(&item.title)
            .bind(&item.normalized_title)
            .bind(&item.body)
            .bind(&item.author)
            .bind(fmt_time(item.published_at))
            .bind(item.engagement.upvotes as i64)
            .bind(item.engagement.downvotes as i64)
            .bind(item.engagement.comments as i64)
            .bind(item.engagement.shares as i64)
            .bind(item.engagement.views as i64)
            .bind(item.category.to_string())
            .bind(&item.language_hint)
            .bind(&item.language)
            .bind(item.language_confidence)
            .bind(serde_json::to_string(&item.keywords)?)
            .bind(item.sentiment)
            .bind(serde_json::to_string(&item.tags)?)
            .bind(fmt_time(item.processed_at))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        let after = self.count_all().await?;
        Ok((after - before).max(0) as u64)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessedItem>> {
        let row = sqlx::query("SELECT * FROM processed_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn get_items_without_embeddings(&self, limit: u32) -> Result<Vec<ProcessedItem>> {
        let rows = sqlx::query(
            "SELECT * FROM processed_items WHERE embedded = 0 ORDER BY processed_at ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn mark_embedded(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for id in ids {
            sqlx::query("UPDATE processed_items SET embedded = 1 WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_items WHERE published_at < ?")
            .bind(fmt_time(cutoff))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

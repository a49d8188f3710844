//! SQLite topic repository with explicit junction handling.

use async_trait::async_trait;
use sqlx::QueryBuilder;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use tl_domain::entities::Topic;
use tl_domain::error::Result;
use tl_domain::ports::TopicRepository;
use tl_domain::value_objects::ListFilter;

use super::row::{db_err, fmt_time, get_uuid, item_from_row, topic_from_row};

/// Topic persistence over SQLite.
pub struct SqliteTopicRepository {
    pool: SqlitePool,
}

impl SqliteTopicRepository {
    /// Repository over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        topic: &Topic,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO topics (id, title, summary, category, keywords, item_count, upvotes, downvotes, comments, shares, views, max_velocity, first_seen, last_updated, language)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                category = excluded.category,
                keywords = excluded.keywords,
                item_count = excluded.item_count,
                upvotes = excluded.upvotes,
                downvotes = excluded.downvotes,
                comments = excluded.comments,
                shares = excluded.shares,
                views = excluded.views,
                max_velocity = MAX(topics.max_velocity, excluded.max_velocity),
                first_seen = excluded.first_seen,
                last_updated = excluded.last_updated,
                language = excluded.language",
        )
        .bind(topic.id.to_string())
        .bind(&topic.title)
        .bind(&topic.summary)
        .bind(topic.category.to_string())
        .bind(serde_json::to_string(&topic.keywords)?)
        .bind(topic.item_count as i64)
        .bind(topic.engagement.upvotes as i64)
        .bind(topic.engagement.downvotes as i64)
        .bind(topic.engagement.comments as i64)
        .bind(topic.engagement.shares as i64)
        .bind(topic.engagement.views as i64)
        .bind(topic.max_velocity)
        .bind(fmt_time(topic.first_seen))
        .bind(fmt_time(topic.last_updated))
        .bind(&topic.language)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        // Junction rows are replaced wholesale; the upsert owns membership.
        sqlx::query("DELETE FROM topic_items WHERE topic_id = ?")
            .bind(topic.id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        for item_id in &topic.item_ids {
            sqlx::query("INSERT OR IGNORE INTO topic_items (topic_id, item_id) VALUES (?, ?)")
                .bind(topic.id.to_string())
                .bind(item_id.to_string())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl TopicRepository for SqliteTopicRepository {
    async fn save(&self, topic: &Topic) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        Self::upsert_in_tx(&mut tx, topic).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn save_batch(&self, topics: &[Topic]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for topic in topics {
            Self::upsert_in_tx(&mut tx, topic).await?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT * FROM topics WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut topic = topic_from_row(&row)?;

        let junction_rows = sqlx::query("SELECT item_id FROM topic_items WHERE topic_id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        topic.item_ids = junction_rows
            .iter()
            .map(|row| get_uuid(row, "item_id"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(topic))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Topic>> {
        let mut qb = QueryBuilder::new("SELECT * FROM topics WHERE 1=1");
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(language) = &filter.language {
            qb.push(" AND language = ").push_bind(language.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND last_updated >= ").push_bind(fmt_time(from));
        }
        if let Some(to) = filter.to {
            qb.push(" AND last_updated <= ").push_bind(fmt_time(to));
        }
        qb.push(" ORDER BY (upvotes + comments + shares) DESC, id ASC");
        qb.push(" LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(50)));
        qb.push(" OFFSET ")
            .push_bind(i64::from(filter.offset.unwrap_or(0)));

        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(topic_from_row).collect()
    }

    async fn count(&self, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM topics WHERE 1=1");
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(language) = &filter.language {
            qb.push(" AND language = ").push_bind(language.clone());
        }
        let row = qb.build().fetch_one(&self.pool).await.map_err(db_err)?;
        let n: i64 = sqlx::Row::try_get(&row, "n").map_err(db_err)?;
        Ok(n.max(0) as u64)
    }

    async fn topic_of_item(&self, item_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT topic_id FROM topic_items WHERE item_id = ? LIMIT 1")
            .bind(item_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(|row| get_uuid(row, "topic_id")).transpose()
    }

    async fn get_items_by_topic(
        &self,
        topic_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<tl_domain::entities::ProcessedItem>> {
        let rows = sqlx::query(
            "SELECT i.* FROM processed_items i
             JOIN topic_items ti ON ti.item_id = i.id
             WHERE ti.topic_id = ?
             ORDER BY i.published_at DESC, i.id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(topic_id.to_string())
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

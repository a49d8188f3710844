//! Repository ports over the metadata store.
//!
//! Repositories return materialized entities; joins are explicit queries,
//! never lazy traversals. `save` is idempotent on identity: repeated saves
//! update in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    Category, CollectorSource, PipelineRun, PluginHealth, ProcessedItem, Topic, Trend,
};
use crate::error::Result;
use crate::value_objects::ListFilter;

/// Persistence contract for ranked trends.
#[async_trait]
pub trait TrendRepository: Send + Sync {
    /// Upsert one trend.
    async fn save(&self, trend: &Trend) -> Result<()>;

    /// Upsert a batch of trends.
    async fn save_batch(&self, trends: &[Trend]) -> Result<()>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<Trend>>;

    /// Fetch the trend projecting a given topic, if one exists.
    async fn get_by_topic(&self, topic_id: Uuid) -> Result<Option<Trend>>;

    /// List under the stable order (score desc, UUID asc).
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Trend>>;

    /// Count rows matching the filter.
    async fn count(&self, filter: &ListFilter) -> Result<u64>;

    /// Top trends by score, optionally scoped to a category.
    async fn top(&self, limit: u32, category: Option<Category>) -> Result<Vec<Trend>>;

    /// Keyword search over title and summary.
    async fn search(&self, keywords: &[String], limit: u32) -> Result<Vec<Trend>>;

    /// Delete by id; returns whether a row was removed. The trend's vector
    /// entry is left as a tombstone until the next sweep.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Persistence contract for topics and their item junctions.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Upsert one topic and replace its item junction rows.
    async fn save(&self, topic: &Topic) -> Result<()>;

    /// Upsert a batch of topics with their junctions.
    async fn save_batch(&self, topics: &[Topic]) -> Result<()>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<Topic>>;

    /// List under the stable order (engagement desc, UUID asc).
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Topic>>;

    /// Count rows matching the filter.
    async fn count(&self, filter: &ListFilter) -> Result<u64>;

    /// Topic owning an item, resolved through the junction table.
    async fn topic_of_item(&self, item_id: Uuid) -> Result<Option<Uuid>>;

    /// Items belonging to a topic, one explicit junction query.
    async fn get_items_by_topic(
        &self,
        topic_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ProcessedItem>>;

    /// Delete by id, cascading junction rows; vector entries become
    /// tombstones until the next sweep.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Persistence contract for processed items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Upsert a batch; `(source, source_id)` uniqueness makes this idempotent.
    /// Returns how many rows were newly inserted.
    async fn save_batch(&self, items: &[ProcessedItem]) -> Result<u64>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<ProcessedItem>>;

    /// Items that have not been pushed to the vector index yet.
    async fn get_items_without_embeddings(&self, limit: u32) -> Result<Vec<ProcessedItem>>;

    /// Mark items as present in the vector index.
    async fn mark_embedded(&self, ids: &[Uuid]) -> Result<()>;

    /// Remove items older than the cutoff; returns how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Persistence contract for plugin health records.
#[async_trait]
pub trait PluginHealthRepository: Send + Sync {
    /// Fetch one record by plugin name.
    async fn get(&self, name: &str) -> Result<Option<PluginHealth>>;

    /// All known records.
    async fn get_all(&self) -> Result<Vec<PluginHealth>>;

    /// Atomic upsert (INSERT ... ON CONFLICT DO UPDATE).
    async fn upsert(&self, health: &PluginHealth) -> Result<()>;

    /// Delete one record; returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// Persistence contract for admin-managed collector sources.
#[async_trait]
pub trait CollectorSourceRepository: Send + Sync {
    /// All sources, enabled or not.
    async fn list_all(&self) -> Result<Vec<CollectorSource>>;

    /// Enabled sources only.
    async fn list_enabled(&self) -> Result<Vec<CollectorSource>>;

    /// Fetch by unique name.
    async fn get_by_name(&self, name: &str) -> Result<Option<CollectorSource>>;

    /// Insert a new source; returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the name is already taken.
    async fn create(&self, source: &CollectorSource) -> Result<i64>;

    /// Update an existing source by id.
    async fn update(&self, source: &CollectorSource) -> Result<()>;

    /// Delete by id; returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Flip the enabled flag by name.
    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()>;
}

/// Persistence contract for pipeline run accounting.
#[async_trait]
pub trait PipelineRunRepository: Send + Sync {
    /// Insert or update a run record.
    async fn save(&self, run: &PipelineRun) -> Result<()>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<PipelineRun>>;

    /// Most recent runs, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<PipelineRun>>;
}

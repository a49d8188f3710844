//! Orchestrator re-entrancy: one cycle at a time, second caller rejected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tl_application::orchestrator::Orchestrator;
use tl_application::pipeline::{Pipeline, PipelineConfig};
use tl_application::runtime::rate_limit::InMemoryRateLimiter;
use tl_application::runtime::{CollectorRuntime, RuntimeConfig};
use tl_domain::Result;
use tl_domain::entities::*;
use tl_domain::error::Error;
use tl_domain::ports::*;
use tl_domain::value_objects::*;

// -----------------------------------------------------------------------------
// Minimal mocks: just enough state for a cycle over zero collectors.
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct NullEmbedding;

#[async_trait]
impl EmbeddingProvider for NullEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|_| Embedding::new(vec![1.0, 0.0], "null"))
            .collect())
    }
    fn dimensions(&self) -> usize {
        2
    }
    fn provider_name(&self) -> &str {
        "null"
    }
}

#[derive(Debug, Default)]
struct NullVectorStore;

#[async_trait]
impl VectorStoreProvider for NullVectorStore {
    async fn upsert(&self, _record: VectorRecord) -> Result<()> {
        Ok(())
    }
    async fn upsert_batch(&self, _records: Vec<VectorRecord>) -> Result<()> {
        Ok(())
    }
    async fn search(
        &self,
        _vector: &[f32],
        _limit: usize,
        _min_score: f32,
        _filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorHit>> {
        Ok(Vec::new())
    }
    async fn get(&self, _id: &str) -> Result<Option<VectorRecord>> {
        Ok(None)
    }
    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }
    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn provider_name(&self) -> &str {
        "null"
    }
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct NullCache;

#[async_trait]
impl CacheProvider for NullCache {
    async fn get_json(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn set_json(&self, _key: &str, _value: &str, _config: CacheEntryConfig) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }
    async fn delete_pattern(&self, _pattern: &str) -> Result<u64> {
        Ok(0)
    }
    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }
    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64> {
        Ok(1)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    fn provider_name(&self) -> &str {
        "null"
    }
}

#[derive(Debug, Default)]
struct MapHealthRepository {
    records: tokio::sync::Mutex<HashMap<String, PluginHealth>>,
}

#[async_trait]
impl PluginHealthRepository for MapHealthRepository {
    async fn get(&self, name: &str) -> Result<Option<PluginHealth>> {
        Ok(self.records.lock().await.get(name).cloned())
    }
    async fn get_all(&self) -> Result<Vec<PluginHealth>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
    async fn upsert(&self, health: &PluginHealth) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(health.plugin_name.clone(), health.clone());
        Ok(())
    }
    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.records.lock().await.remove(name).is_some())
    }
}

#[derive(Debug, Default)]
struct EmptySourceRepository;

#[async_trait]
impl CollectorSourceRepository for EmptySourceRepository {
    async fn list_all(&self) -> Result<Vec<CollectorSource>> {
        Ok(Vec::new())
    }
    async fn list_enabled(&self) -> Result<Vec<CollectorSource>> {
        Ok(Vec::new())
    }
    async fn get_by_name(&self, _name: &str) -> Result<Option<CollectorSource>> {
        Ok(None)
    }
    async fn create(&self, _source: &CollectorSource) -> Result<i64> {
        Ok(1)
    }
    async fn update(&self, _source: &CollectorSource) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _id: i64) -> Result<bool> {
        Ok(false)
    }
    async fn set_enabled(&self, name: &str, _enabled: bool) -> Result<()> {
        Err(Error::not_found(format!("collector source '{name}'")))
    }
}

struct NoopCrypto;

impl CryptoProvider for NoopCrypto {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData> {
        Ok(EncryptedData::new(plaintext.to_vec(), vec![0; 12]))
    }
    fn decrypt(&self, encrypted_data: &EncryptedData) -> Result<Vec<u8>> {
        Ok(encrypted_data.ciphertext.clone())
    }
    fn provider_name(&self) -> &str {
        "noop"
    }
}

struct NoopSandbox;

#[async_trait]
impl SandboxEngine for NoopSandbox {
    fn validate(&self, _code: &str) -> Result<()> {
        Ok(())
    }
    async fn execute(&self, _code: &str, _context: SandboxContext) -> Result<Vec<RawItem>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct NullItemRepository;

#[async_trait]
impl ItemRepository for NullItemRepository {
    async fn save_batch(&self, items: &[ProcessedItem]) -> Result<u64> {
        Ok(items.len() as u64)
    }
    async fn get(&self, _id: Uuid) -> Result<Option<ProcessedItem>> {
        Ok(None)
    }
    async fn get_items_without_embeddings(&self, _limit: u32) -> Result<Vec<ProcessedItem>> {
        Ok(Vec::new())
    }
    async fn mark_embedded(&self, _ids: &[Uuid]) -> Result<()> {
        Ok(())
    }
    async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

#[derive(Debug, Default)]
struct NullTopicRepository;

#[async_trait]
impl TopicRepository for NullTopicRepository {
    async fn save(&self, _topic: &Topic) -> Result<()> {
        Ok(())
    }
    async fn save_batch(&self, _topics: &[Topic]) -> Result<()> {
        Ok(())
    }
    async fn get(&self, _id: Uuid) -> Result<Option<Topic>> {
        Ok(None)
    }
    async fn list(&self, _filter: &ListFilter) -> Result<Vec<Topic>> {
        Ok(Vec::new())
    }
    async fn count(&self, _filter: &ListFilter) -> Result<u64> {
        Ok(0)
    }
    async fn topic_of_item(&self, _item_id: Uuid) -> Result<Option<Uuid>> {
        Ok(None)
    }
    async fn get_items_by_topic(
        &self,
        _topic_id: Uuid,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<ProcessedItem>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _id: Uuid) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Debug, Default)]
struct NullTrendRepository;

#[async_trait]
impl TrendRepository for NullTrendRepository {
    async fn save(&self, _trend: &Trend) -> Result<()> {
        Ok(())
    }
    async fn save_batch(&self, _trends: &[Trend]) -> Result<()> {
        Ok(())
    }
    async fn get(&self, _id: Uuid) -> Result<Option<Trend>> {
        Ok(None)
    }
    async fn get_by_topic(&self, _topic_id: Uuid) -> Result<Option<Trend>> {
        Ok(None)
    }
    async fn list(&self, _filter: &ListFilter) -> Result<Vec<Trend>> {
        Ok(Vec::new())
    }
    async fn count(&self, _filter: &ListFilter) -> Result<u64> {
        Ok(0)
    }
    async fn top(&self, _limit: u32, _category: Option<Category>) -> Result<Vec<Trend>> {
        Ok(Vec::new())
    }
    async fn search(&self, _keywords: &[String], _limit: u32) -> Result<Vec<Trend>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _id: Uuid) -> Result<bool> {
        Ok(false)
    }
}

/// Run repository whose save stalls long enough for a second cycle to knock.
#[derive(Debug)]
struct SlowRunRepository {
    delay: Duration,
}

#[async_trait]
impl PipelineRunRepository for SlowRunRepository {
    async fn save(&self, _run: &PipelineRun) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
    async fn get(&self, _id: Uuid) -> Result<Option<PipelineRun>> {
        Ok(None)
    }
    async fn list_recent(&self, _limit: u32) -> Result<Vec<PipelineRun>> {
        Ok(Vec::new())
    }
}

fn orchestrator(save_delay: Duration) -> Arc<Orchestrator> {
    let runtime = Arc::new(CollectorRuntime::new(
        Arc::new(MapHealthRepository::default()),
        Arc::new(EmptySourceRepository),
        Arc::new(InMemoryRateLimiter::new()),
        Arc::new(NoopCrypto),
        Arc::new(NoopSandbox),
        RuntimeConfig::default(),
    ));
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(NullEmbedding),
        PipelineConfig::default(),
    ));
    Arc::new(Orchestrator::new(
        runtime,
        pipeline,
        Arc::new(NullItemRepository),
        Arc::new(NullTopicRepository),
        Arc::new(NullTrendRepository),
        Arc::new(SlowRunRepository { delay: save_delay }),
        Arc::new(NullEmbedding),
        Arc::new(NullVectorStore),
        Arc::new(NullCache),
    ))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_cycles_are_rejected() {
    let orchestrator = orchestrator(Duration::from_millis(300));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_cycle(false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orchestrator.run_cycle(false).await;
    assert!(matches!(second, Err(Error::Validation { .. })));

    let first = first.await.expect("join");
    assert!(first.is_ok());

    // The guard releases once the first cycle finishes.
    let third = orchestrator.run_cycle(false).await;
    assert!(third.is_ok());
}

#[tokio::test]
async fn empty_cycle_completes() {
    let orchestrator = orchestrator(Duration::ZERO);
    let run = orchestrator.run_cycle(false).await.expect("cycle");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.items_in, 0);
}

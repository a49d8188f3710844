//! Search service tests over mock providers.
//!
//! Mocks are deliberately real enough to validate behavior: the cache stores,
//! the vector store searches, the embedding provider counts its calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tl_application::search::SearchService;
use tl_domain::Result;
use tl_domain::entities::{Category, ProcessedItem, Topic, Trend, TrendState};
use tl_domain::error::Error;
use tl_domain::ports::*;
use tl_domain::value_objects::*;

// -----------------------------------------------------------------------------
// Mock providers
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CountingEmbeddingProvider {
    calls: AtomicU32,
}

#[async_trait]
impl EmbeddingProvider for CountingEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                // Angle derived from text length keeps vectors deterministic.
                let angle = t.len() as f32 * 0.1;
                Embedding::new(vec![angle.cos(), angle.sin()], "counting")
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

#[derive(Debug, Default)]
struct StoringCache {
    entries: tokio::sync::Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CacheProvider for StoringCache {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }
    async fn set_json(&self, key: &str, value: &str, _config: CacheEntryConfig) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }
    async fn delete_pattern(&self, _pattern: &str) -> Result<u64> {
        Ok(0)
    }
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(key))
    }
    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64> {
        Ok(1)
    }
    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
    fn provider_name(&self) -> &str {
        "storing-mock"
    }
}

#[derive(Debug, Default)]
struct MapVectorStore {
    records: tokio::sync::Mutex<HashMap<String, VectorRecord>>,
}

#[async_trait]
impl VectorStoreProvider for MapVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorHit>> {
        let records = self.records.lock().await;
        let mut hits: Vec<VectorHit> = records
            .values()
            .filter(|r| filter.is_none_or(|f| f.matches(&r.payload)))
            .filter_map(|r| {
                let score = cosine_similarity(vector, &r.embedding.vector);
                (score >= min_score).then(|| VectorHit {
                    id: r.id.clone(),
                    score,
                    payload: r.payload.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }
    async fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().await.remove(id);
        Ok(())
    }
    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.records.lock().await.keys().cloned().collect())
    }
    fn provider_name(&self) -> &str {
        "map-mock"
    }
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MapTrendRepository {
    trends: tokio::sync::Mutex<HashMap<Uuid, Trend>>,
}

#[async_trait]
impl TrendRepository for MapTrendRepository {
    async fn save(&self, trend: &Trend) -> Result<()> {
        self.trends.lock().await.insert(trend.id, trend.clone());
        Ok(())
    }
    async fn save_batch(&self, trends: &[Trend]) -> Result<()> {
        for trend in trends {
            self.save(trend).await?;
        }
        Ok(())
    }
    async fn get(&self, id: Uuid) -> Result<Option<Trend>> {
        Ok(self.trends.lock().await.get(&id).cloned())
    }
    async fn get_by_topic(&self, topic_id: Uuid) -> Result<Option<Trend>> {
        Ok(self
            .trends
            .lock()
            .await
            .values()
            .find(|t| t.topic_id == topic_id)
            .cloned())
    }
    async fn list(&self, _filter: &ListFilter) -> Result<Vec<Trend>> {
        Ok(self.trends.lock().await.values().cloned().collect())
    }
    async fn count(&self, _filter: &ListFilter) -> Result<u64> {
        Ok(self.trends.lock().await.len() as u64)
    }
    async fn top(&self, _limit: u32, _category: Option<Category>) -> Result<Vec<Trend>> {
        self.list(&ListFilter::default()).await
    }
    async fn search(&self, _keywords: &[String], _limit: u32) -> Result<Vec<Trend>> {
        Ok(Vec::new())
    }
    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.trends.lock().await.remove(&id).is_some())
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

// -----------------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------------

fn trend(title: &str) -> Trend {
    Trend {
        id: Uuid::new_v4(),
        topic_id: Uuid::new_v4(),
        rank: 1,
        score: 80.0,
        state: TrendState::Emerging,
        velocity: 10.0,
        sources: vec!["hackernews".to_owned()],
        language: "en".to_owned(),
        title: title.to_owned(),
        summary: String::new(),
        category: Category::Technology,
        created_at: Utc::now(),
    }
}

fn record(trend: &Trend, vector: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: format!("trend:{}", trend.id),
        embedding: Embedding::new(vector, "counting"),
        payload: VectorPayload {
            entity: EntityKind::Trend,
            category: trend.category,
            state: Some(trend.state),
            language: trend.language.clone(),
            sources: trend.sources.clone(),
            score: trend.score,
            published_at: trend.created_at,
        },
    }
}

struct Harness {
    embedding: Arc<CountingEmbeddingProvider>,
    vector_store: Arc<MapVectorStore>,
    trend_repo: Arc<MapTrendRepository>,
    service: SearchService,
}

fn harness() -> Harness {
    let embedding = Arc::new(CountingEmbeddingProvider::default());
    let vector_store = Arc::new(MapVectorStore::default());
    let trend_repo = Arc::new(MapTrendRepository::default());
    let cache = Arc::new(StoringCache::default());
    let service = SearchService::new(
        Arc::clone(&embedding) as Arc<dyn EmbeddingProvider>,
        Arc::clone(&vector_store) as Arc<dyn VectorStoreProvider>,
        Arc::clone(&trend_repo) as Arc<dyn TrendRepository>,
        Arc::new(NullTopicRepository) as Arc<dyn TopicRepository>,
        cache as Arc<dyn CacheProvider>,
    );
    Harness {
        embedding,
        vector_store,
        trend_repo,
        service,
    }
}

async fn seed(h: &Harness, title: &str, vector: Vec<f32>) -> Trend {
    let t = trend(title);
    h.trend_repo.save(&t).await.expect("save trend");
    h.vector_store
        .upsert(record(&t, vector))
        .await
        .expect("upsert vector");
    t
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[tokio::test]
async fn query_search_returns_hydrated_trends_in_similarity_order() {
    let h = harness();
    // The counting provider maps a 12-char query to this direction.
    let angle = 12.0f32 * 0.1;
    let close = seed(&h, "close", vec![angle.cos(), angle.sin()]).await;
    let _far = seed(&h, "far", vec![-angle.cos(), -angle.sin()]).await;

    let request = SearchRequest {
        query: Some("abcdefghijkl".to_owned()),
        limit: 10,
        min_similarity: 0.5,
        ..Default::default()
    };
    let results = h.service.search(request).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, close.id);
}

#[tokio::test]
async fn embedding_cache_prevents_repeat_provider_calls() {
    let h = harness();
    seed(&h, "anything", vec![1.0, 0.0]).await;

    let request = SearchRequest {
        query: Some("repeated query".to_owned()),
        limit: 5,
        min_similarity: 0.0,
        ..Default::default()
    };
    let first = h.service.search(request.clone()).await.expect("search");
    let second = h.service.search(request).await.expect("search");

    // Identical output, one provider call: the second run hit the
    // fingerprint cache.
    assert_eq!(
        first.iter().map(|t| t.id).collect::<Vec<_>>(),
        second.iter().map(|t| t.id).collect::<Vec<_>>()
    );
    assert_eq!(h.embedding.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn similar_never_returns_the_reference_trend() {
    let h = harness();
    let reference = seed(&h, "reference", vec![1.0, 0.0]).await;
    let near = seed(&h, "near", vec![0.99, 0.14]).await;
    let _far = seed(&h, "far", vec![0.0, 1.0]).await;

    let results = h
        .service
        .similar(reference.id, 5, 0.7)
        .await
        .expect("similar");
    assert!(!results.is_empty());
    assert!(results.iter().all(|t| t.id != reference.id));
    assert!(results.iter().any(|t| t.id == near.id));
    assert!(results.iter().all(|t| t.id != reference.id));
}

#[tokio::test]
async fn similar_for_unknown_trend_is_not_found() {
    let h = harness();
    let err = h.service.similar(Uuid::new_v4(), 5, 0.7).await;
    assert!(matches!(err, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn tombstoned_ids_drop_out_of_results() {
    let h = harness();
    let angle = 5.0f32 * 0.1;
    let alive = seed(&h, "alive", vec![angle.cos(), angle.sin()]).await;
    let ghost = seed(&h, "ghost", vec![angle.cos(), angle.sin()]).await;
    // Delete the entity but leave its vector: a tombstone.
    h.trend_repo.delete(ghost.id).await.expect("delete");

    let request = SearchRequest {
        query: Some("abcde".to_owned()),
        limit: 10,
        min_similarity: 0.0,
        ..Default::default()
    };
    let results = h.service.search(request).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, alive.id);
}

#[tokio::test]
async fn search_without_query_or_embedding_is_invalid() {
    let h = harness();
    let err = h.service.search(SearchRequest::default()).await;
    assert!(matches!(err, Err(Error::Validation { .. })));
}

//! Semantic search service.
//!
//! Fingerprint the query, embed it (with a 7-day cache on the fingerprint),
//! run a filtered vector search with overfetch, then hydrate the surviving
//! ids from the metadata store. Deleted entities drop out silently
//! (tombstones); an unavailable vector backend surfaces as
//! `ServiceUnavailable` — there is no silent keyword fallback.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use tl_domain::compute_fingerprint;
use tl_domain::constants::{cache_keys, search as search_defaults};
use tl_domain::entities::Trend;
use tl_domain::error::{Error, Result};
use tl_domain::ports::{
    CacheEntryConfig, CacheProvider, EmbeddingProvider, SearchServiceInterface, TopicRepository,
    TrendRepository, VectorStoreProvider,
};
use tl_domain::value_objects::{
    EntityKind, SearchRequest, SearchType, VectorFilter, VectorHit,
};

/// Implementation of [`SearchServiceInterface`].
pub struct SearchService {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    trend_repo: Arc<dyn TrendRepository>,
    topic_repo: Arc<dyn TopicRepository>,
    cache: Arc<dyn CacheProvider>,
}

impl SearchService {
    /// Create the service with injected dependencies.
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        trend_repo: Arc<dyn TrendRepository>,
        topic_repo: Arc<dyn TopicRepository>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            trend_repo,
            topic_repo,
            cache,
        }
    }

    /// Resolve the query embedding: direct vector, cached fingerprint, or a
    /// fresh provider call.
    async fn query_vector(&self, request: &SearchRequest) -> Result<Vec<f32>> {
        if let Some(vector) = &request.embedding {
            return Ok(vector.clone());
        }
        let query = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| Error::validation("search needs a query or an embedding"))?;

        let key = cache_keys::embedding(&compute_fingerprint(query));
        if let Ok(Some(cached)) = self.cache.get_json(&key).await
            && let Ok(vector) = serde_json::from_str::<Vec<f32>>(&cached)
        {
            return Ok(vector);
        }

        let embedding = self.embedding.embed(query).await?;
        if let Ok(json) = serde_json::to_string(&embedding.vector) {
            let config = CacheEntryConfig::with_ttl(cache_keys::EMBEDDING_TTL);
            if let Err(err) = self.cache.set_json(&key, &json, config).await {
                tracing::debug!(error = %err, "embedding cache write failed");
            }
        }
        Ok(embedding.vector)
    }

    /// Hydrate vector hits into trends, dropping tombstoned ids and keeping
    /// the similarity order.
    async fn hydrate(&self, hits: Vec<VectorHit>, limit: usize) -> Result<Vec<Trend>> {
        let mut trends = Vec::with_capacity(limit);
        let mut seen: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
        for hit in hits {
            if trends.len() == limit {
                break;
            }
            let Some(entity_id) = hit.entity_id() else {
                continue;
            };
            let resolved = if hit.id.starts_with("trend:") {
                self.trend_repo.get(entity_id).await?
            } else {
                // Item hit: follow the junction to its topic's trend.
                match self.topic_repo.topic_of_item(entity_id).await? {
                    Some(topic_id) => self.trend_repo.get_by_topic(topic_id).await?,
                    None => None,
                }
            };
            if let Some(trend) = resolved
                && seen.insert(trend.id)
            {
                trends.push(trend);
            }
        }
        Ok(trends)
    }

    fn entity_filter(request: &SearchRequest) -> VectorFilter {
        let mut filter = request.filters.clone();
        filter.entity = match request.search_type {
            SearchType::Trends => Some(EntityKind::Trend),
            SearchType::Topics => Some(EntityKind::Item),
            SearchType::All => None,
        };
        filter
    }
}

#[async_trait]
impl SearchServiceInterface for SearchService {
    async fn search(&self, request: SearchRequest) -> Result<Vec<Trend>> {
        let limit = if request.limit == 0 {
            search_defaults::DEFAULT_SEARCH_LIMIT
        } else {
            request.limit
        };
        let min_similarity = if request.min_similarity <= 0.0 {
            search_defaults::DEFAULT_MIN_SIMILARITY
        } else {
            request.min_similarity
        };

        let usage_key = cache_keys::usage("search", chrono::Utc::now());
        if let Err(err) = self.cache.incr(&usage_key, cache_keys::USAGE_TTL).await {
            tracing::debug!(error = %err, "usage counter failed");
        }

        let vector = self.query_vector(&request).await?;
        let filter = Self::entity_filter(&request);
        let hits = self
            .vector_store
            .search(
                &vector,
                limit * search_defaults::SEARCH_OVERFETCH_MULTIPLIER,
                min_similarity,
                Some(&filter),
            )
            .await?;

        self.hydrate(hits, limit).await
    }

    async fn similar(
        &self,
        trend_id: Uuid,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<Trend>> {
        let cache_key = cache_keys::trends_similar(trend_id, limit, min_similarity);
        if let Ok(Some(cached)) = self.cache.get_json(&cache_key).await
            && let Ok(trends) = serde_json::from_str::<Vec<Trend>>(&cached)
        {
            return Ok(trends);
        }

        let key = format!("trend:{trend_id}");
        let record = self
            .vector_store
            .get(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("trend {trend_id}")))?;

        let filter = VectorFilter {
            entity: Some(EntityKind::Trend),
            ..Default::default()
        };
        let hits = self
            .vector_store
            .search(
                &record.embedding.vector,
                (limit + 1) * search_defaults::SEARCH_OVERFETCH_MULTIPLIER,
                min_similarity,
                Some(&filter),
            )
            .await?;
        // The reference trend is its own nearest neighbor; exclude it.
        let hits: Vec<VectorHit> = hits.into_iter().filter(|h| h.id != key).collect();

        let trends = self.hydrate(hits, limit).await?;
        if let Ok(json) = serde_json::to_string(&trends) {
            let config = CacheEntryConfig::with_ttl(cache_keys::TRENDS_SIMILAR_TTL);
            if let Err(err) = self.cache.set_json(&cache_key, &json, config).await {
                tracing::debug!(error = %err, "similar cache write failed");
            }
        }
        Ok(trends)
    }
}

//! Orchestrator: sequences collect → process → persist → index → invalidate.
//!
//! Re-entrancy is guarded by a compare-and-swap flag: a second concurrent
//! cycle is rejected instead of queued. Every persistence step is idempotent
//! on identity, so a cycle interrupted between steps can be re-run safely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tl_domain::constants::{cache_keys, ranking};
use tl_domain::entities::{PipelineRun, ProcessedItem, RunStatus, Topic, Trend};
use tl_domain::error::{Error, Result};
use tl_domain::ports::{
    CacheProvider, CollectorRuntimeInterface, EmbeddingProvider, ItemRepository,
    OrchestratorInterface, PipelineRunRepository, TopicRepository, TrendRepository,
    VectorStoreProvider,
};
use tl_domain::value_objects::{Embedding, EntityKind, VectorFilter, VectorHit, VectorPayload, VectorRecord};

use crate::pipeline::{Pipeline, rank};
use crate::runtime::CollectorRuntime;

/// Batch size for the item embedding backfill.
const EMBED_BACKFILL_BATCH: u32 = 500;

/// Implementation of [`OrchestratorInterface`].
pub struct Orchestrator {
    runtime: Arc<CollectorRuntime>,
    pipeline: Arc<Pipeline>,
    item_repo: Arc<dyn ItemRepository>,
    topic_repo: Arc<dyn TopicRepository>,
    trend_repo: Arc<dyn TrendRepository>,
    run_repo: Arc<dyn PipelineRunRepository>,
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    cache: Arc<dyn CacheProvider>,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Assemble the orchestrator over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime: Arc<CollectorRuntime>,
        pipeline: Arc<Pipeline>,
        item_repo: Arc<dyn ItemRepository>,
        topic_repo: Arc<dyn TopicRepository>,
        trend_repo: Arc<dyn TrendRepository>,
        run_repo: Arc<dyn PipelineRunRepository>,
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            runtime,
            pipeline,
            item_repo,
            topic_repo,
            trend_repo,
            run_repo,
            embedding,
            vector_store,
            cache,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Signal cancellation to the in-flight cycle, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn trend_record(trend: &Trend, vector: Vec<f32>, model: &str) -> VectorRecord {
        VectorRecord {
            id: trend.vector_key(),
            embedding: tl_domain::value_objects::Embedding::new(vector, model),
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

    fn item_record(item: &ProcessedItem, vector: Vec<f32>, model: &str) -> VectorRecord {
        VectorRecord {
            id: format!("item:{}", item.id),
            embedding: tl_domain::value_objects::Embedding::new(vector, model),
            payload: VectorPayload {
                entity: EntityKind::Item,
                category: item.category,
                state: None,
                language: item.language.clone(),
                sources: vec![item.source.clone()],
                score: item.engagement.total() as f64,
                published_at: item.published_at,
            },
        }
    }

    /// Embed freshly ranked trends. Returns one embedding per trend or the
    /// error that prevented it.
    async fn embed_trends(&self, trends: &[Trend]) -> Result<Vec<Embedding>> {
        if trends.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = trends
            .iter()
            .map(|t| format!("{} {}", t.title, t.summary))
            .collect();
        self.embedding.embed_batch(&texts).await
    }

    /// Topic continuity: a new trend whose vector is near a prior trend's
    /// vector continues that topic's lineage. Fold the prior lineage's
    /// max-observed velocity into the new topic and recompute the lifecycle
    /// state, so "current velocity < 0.5 * max-observed" sees across runs.
    async fn resolve_lineage(
        &self,
        topics: &mut [Topic],
        trends: &mut [Trend],
        embeddings: &[Embedding],
    ) {
        let config = self.pipeline.config();
        let now = chrono::Utc::now();
        let filter = VectorFilter {
            entity: Some(EntityKind::Trend),
            ..Default::default()
        };

        for (trend, embedding) in trends.iter_mut().zip(embeddings) {
            let hits = match self
                .vector_store
                .search(
                    &embedding.vector,
                    2,
                    ranking::LINEAGE_MIN_SIMILARITY,
                    Some(&filter),
                )
                .await
            {
                Ok(hits) => hits,
                Err(err) => {
                    tracing::debug!(error = %err, "lineage lookup failed");
                    continue;
                }
            };

            let own_key = trend.vector_key();
            let Some(prior_id) = hits
                .iter()
                .filter(|h| h.id != own_key)
                .find_map(VectorHit::entity_id)
            else {
                continue;
            };
            let prior_topic_id = match self.trend_repo.get(prior_id).await {
                Ok(Some(prior)) if prior.topic_id != trend.topic_id => prior.topic_id,
                _ => continue,
            };
            let Ok(Some(prior_topic)) = self.topic_repo.get(prior_topic_id).await else {
                continue;
            };
            let Some(topic) = topics.iter_mut().find(|t| t.id == trend.topic_id) else {
                continue;
            };

            if prior_topic.max_velocity > topic.max_velocity {
                topic.max_velocity = prior_topic.max_velocity;
                trend.state = rank::lifecycle_for(
                    trend.velocity,
                    topic.observed_max_velocity(now),
                    topic.age_hours(now),
                    config,
                );
                tracing::debug!(
                    trend = %trend.id,
                    prior_topic = %prior_topic_id,
                    max_velocity = topic.max_velocity,
                    state = %trend.state,
                    "lineage carried max-observed velocity"
                );
            }
        }
    }

    /// Embed any persisted items that never made it into the vector index.
    async fn backfill_item_embeddings(&self) -> Result<u64> {
        let items = self
            .item_repo
            .get_items_without_embeddings(EMBED_BACKFILL_BATCH)
            .await?;
        if items.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = items.iter().map(ProcessedItem::embedding_text).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        let records: Vec<VectorRecord> = items
            .iter()
            .zip(embeddings)
            .map(|(item, e)| Self::item_record(item, e.vector, &e.model))
            .collect();
        self.vector_store.upsert_batch(records).await?;
        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        self.item_repo.mark_embedded(&ids).await?;
        Ok(ids.len() as u64)
    }

    async fn persist_and_index(
        &self,
        run: &mut PipelineRun,
        items: &[ProcessedItem],
        topics: &mut [Topic],
        trends: &mut [Trend],
    ) -> Result<()> {
        // Embed trends up front: the vectors resolve lineage against the
        // existing index before persistence, then get upserted after it.
        let trend_embeddings = match self.embed_trends(trends).await {
            Ok(embeddings) => embeddings,
            Err(err) => {
                run.errors.push(format!("trend embedding: {err}"));
                tracing::warn!(error = %err, "trend embedding failed");
                Vec::new()
            }
        };
        if trend_embeddings.len() == trends.len() {
            self.resolve_lineage(topics, trends, &trend_embeddings).await;
        }

        // Items first, then topics (junction rows reference items), then trends.
        self.item_repo.save_batch(items).await?;
        self.topic_repo.save_batch(topics).await?;
        self.trend_repo.save_batch(trends).await?;

        if trend_embeddings.len() == trends.len() && !trends.is_empty() {
            let records: Vec<VectorRecord> = trends
                .iter()
                .zip(trend_embeddings)
                .map(|(trend, e)| Self::trend_record(trend, e.vector, &e.model))
                .collect();
            if let Err(err) = self.vector_store.upsert_batch(records).await {
                // Indexing failures leave metadata intact; the backfill and
                // the next cycle catch up.
                run.errors.push(format!("trend indexing: {err}"));
                tracing::warn!(error = %err, "trend indexing failed");
            }
        }
        match self.backfill_item_embeddings().await {
            Ok(indexed) if indexed > 0 => {
                tracing::debug!(indexed, "item embedding backfill done");
            }
            Ok(_) => {}
            Err(err) => {
                run.errors.push(format!("item indexing: {err}"));
                tracing::warn!(error = %err, "item embedding backfill failed");
            }
        }

        for glob in [
            cache_keys::TRENDS_INVALIDATION_GLOB,
            cache_keys::TOPICS_INVALIDATION_GLOB,
        ] {
            if let Err(err) = self.cache.delete_pattern(glob).await {
                tracing::warn!(pattern = glob, error = %err, "cache invalidation failed");
            }
        }

        let usage_key = cache_keys::usage("pipeline_run", chrono::Utc::now());
        if let Err(err) = self
            .cache
            .incr(&usage_key, cache_keys::USAGE_TTL)
            .await
        {
            tracing::debug!(error = %err, "usage counter failed");
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestratorInterface for Orchestrator {
    async fn run_cycle(&self, force: bool) -> Result<PipelineRun> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::validation("a pipeline cycle is already running"));
        }

        let result = async {
            // Step 1: collect from due, healthy plugins. With `force`, every
            // enabled plugin runs and the limiter is bypassed.
            let raw = if force {
                let mut collated = Vec::new();
                for status in self.runtime.status_all().await? {
                    if !status.enabled {
                        continue;
                    }
                    match self.runtime.run(&status.name, true).await {
                        Ok(mut items) => collated.append(&mut items),
                        Err(err) => {
                            tracing::warn!(plugin = %status.name, error = %err, "forced run failed");
                        }
                    }
                }
                collated
            } else {
                self.runtime.run_due().await
            };

            // Step 2: feed the pipeline.
            let crate::pipeline::PipelineOutcome {
                mut run,
                items,
                mut topics,
                mut trends,
            } = self.pipeline.run(raw, &self.cancel).await;

            if run.status != RunStatus::Completed {
                self.run_repo.save(&run).await?;
                return Ok(run);
            }

            // Steps 3-5: persist, index, invalidate.
            match self
                .persist_and_index(&mut run, &items, &mut topics, &mut trends)
                .await
            {
                Ok(()) => {
                    self.run_repo.save(&run).await?;
                    Ok(run)
                }
                Err(err) => {
                    run.errors.push(err.to_string());
                    run.finish(RunStatus::Failed);
                    self.run_repo.save(&run).await?;
                    Err(err)
                }
            }
        }
        .await;

        self.running.store(false, Ordering::Release);
        result
    }

    async fn sweep_tombstones(&self) -> Result<u64> {
        let ids = self.vector_store.list_ids().await?;
        let mut swept = 0u64;
        for id in ids {
            let Some((kind, raw)) = id.split_once(':') else {
                continue;
            };
            let Ok(entity_id) = Uuid::parse_str(raw) else {
                continue;
            };
            let orphaned = match kind {
                "trend" => self.trend_repo.get(entity_id).await?.is_none(),
                "item" => self.item_repo.get(entity_id).await?.is_none(),
                _ => false,
            };
            if orphaned {
                self.vector_store.delete(&id).await?;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::info!(swept, "tombstone sweep removed orphaned vectors");
        }
        Ok(swept)
    }
}

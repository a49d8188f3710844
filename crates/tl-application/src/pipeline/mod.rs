//! Processing pipeline: normalize → detect language → dedup → cluster → rank.
//!
//! Stages execute serially within one run; a fatal stage error marks the run
//! failed and discards partial outputs. CPU-bound stages yield to the
//! scheduler periodically so large batches do not starve the runtime.

pub mod cluster;
pub mod dedup;
pub mod language;
pub mod normalize;
pub mod rank;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tl_domain::constants::{pipeline as pdefaults, ranking as rdefaults, retry};
use tl_domain::entities::{PipelineRun, ProcessedItem, RawItem, RunStatus, Topic, Trend};
use tl_domain::error::{Error, Result};
use tl_domain::ports::EmbeddingProvider;

pub use cluster::TopicDraft;

/// Tunable knobs for one pipeline run. Snapshotted into the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cosine similarity at or above which two items are duplicates.
    pub dedup_threshold: f32,
    /// Batch size above which dedup uses near-neighbor candidates.
    pub near_neighbor_cutover: usize,
    /// Minimum items per topic.
    pub min_cluster_size: usize,
    /// Cosine-distance epsilon for density clustering.
    pub clustering_distance: f32,
    /// Trends kept per category after ranking.
    pub max_trends_per_category: usize,
    /// Whether the per-source share cap is applied.
    pub source_diversity_enabled: bool,
    /// Maximum share of the top-N any single source may supply.
    pub max_percentage_per_source: f64,
    /// Composite score weight: engagement.
    pub weight_engagement: f64,
    /// Composite score weight: recency.
    pub weight_recency: f64,
    /// Composite score weight: velocity.
    pub weight_velocity: f64,
    /// Composite score weight: source diversity.
    pub weight_diversity: f64,
    /// Recency decay time constant in hours.
    pub recency_tau_hours: f64,
    /// Velocity threshold for Emerging.
    pub velocity_emerge: f64,
    /// Absolute velocity threshold for Viral.
    pub velocity_viral: f64,
    /// Lower bound of the Sustained band.
    pub velocity_sustain_low: f64,
    /// Upper bound of the Sustained band.
    pub velocity_sustain_high: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: pdefaults::DEDUP_THRESHOLD,
            near_neighbor_cutover: pdefaults::DEDUP_NEAR_NEIGHBOR_CUTOVER,
            min_cluster_size: pdefaults::MIN_CLUSTER_SIZE,
            clustering_distance: pdefaults::CLUSTERING_DISTANCE,
            max_trends_per_category: rdefaults::MAX_TRENDS_PER_CATEGORY,
            source_diversity_enabled: rdefaults::SOURCE_DIVERSITY_ENABLED,
            max_percentage_per_source: rdefaults::MAX_PERCENTAGE_PER_SOURCE,
            weight_engagement: rdefaults::WEIGHT_ENGAGEMENT,
            weight_recency: rdefaults::WEIGHT_RECENCY,
            weight_velocity: rdefaults::WEIGHT_VELOCITY,
            weight_diversity: rdefaults::WEIGHT_DIVERSITY,
            recency_tau_hours: rdefaults::RECENCY_TAU_HOURS,
            velocity_emerge: rdefaults::VELOCITY_EMERGE,
            velocity_viral: rdefaults::VELOCITY_VIRAL,
            velocity_sustain_low: rdefaults::VELOCITY_SUSTAIN_LOW,
            velocity_sustain_high: rdefaults::VELOCITY_SUSTAIN_HIGH,
        }
    }
}

/// Everything one pipeline run produced. When the run did not complete the
/// output collections are empty and only the run record is meaningful.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Accounting record for this run.
    pub run: PipelineRun,
    /// Deduplicated processed items (including cluster noise).
    pub items: Vec<ProcessedItem>,
    /// Topics produced by clustering.
    pub topics: Vec<Topic>,
    /// Ranked trends.
    pub trends: Vec<Trend>,
}

impl PipelineOutcome {
    fn terminal(run: PipelineRun) -> Self {
        Self {
            run,
            items: Vec::new(),
            topics: Vec::new(),
            trends: Vec::new(),
        }
    }
}

/// The serial stage executor.
pub struct Pipeline {
    embedding: Arc<dyn EmbeddingProvider>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline over the given embedding provider.
    pub fn new(embedding: Arc<dyn EmbeddingProvider>, config: PipelineConfig) -> Self {
        Self { embedding, config }
    }

    /// The configuration this pipeline snapshots into run records.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one full run over a batch of raw items.
    ///
    /// Never fails for data reasons: stage failures and cancellation are
    /// reported through the returned run record's status.
    pub async fn run(&self, raw: Vec<RawItem>, cancel: &CancellationToken) -> PipelineOutcome {
        let snapshot = serde_json::to_value(&self.config).unwrap_or_default();
        let mut run = PipelineRun::start(snapshot);
        run.items_in = raw.len() as u64;
        tracing::info!(run_id = %run.id, items_in = run.items_in, "pipeline run started");

        // Stage 1+2: normalize, then tag languages. Pure CPU.
        let items = normalize::normalize_batch(raw).await;
        let items = language::detect_batch(items).await;
        if cancel.is_cancelled() {
            run.finish(RunStatus::Cancelled);
            return PipelineOutcome::terminal(run);
        }

        // Embeddings once, shared by dedup and clustering.
        let vectors = match self.embed_items(&items).await {
            Ok(vectors) => vectors,
            Err(err) => {
                tracing::error!(run_id = %run.id, error = %err, "embedding stage failed");
                run.errors.push(format!("embedding: {err}"));
                run.finish(RunStatus::Failed);
                return PipelineOutcome::terminal(run);
            }
        };

        // Stage 3: dedup.
        let dedup_outcome = dedup::dedup(
            items,
            &vectors,
            self.config.dedup_threshold,
            self.config.near_neighbor_cutover,
        )
        .await;
        let items = dedup_outcome.kept;
        run.items_out = items.len() as u64;
        if cancel.is_cancelled() {
            run.finish(RunStatus::Cancelled);
            return PipelineOutcome::terminal(run);
        }

        // Stage 4: cluster. Items without a detected language stay out of
        // cross-language clustering and are persisted as plain items.
        let drafts = cluster::cluster(&items, &vectors, &self.config).await;
        run.topics = drafts.len() as u64;

        // Stage 5: rank.
        let trends = rank::rank(&drafts, chrono::Utc::now(), &self.config);
        run.trends = trends.len() as u64;

        run.finish(RunStatus::Completed);
        tracing::info!(
            run_id = %run.id,
            items_out = run.items_out,
            topics = run.topics,
            trends = run.trends,
            "pipeline run completed"
        );
        PipelineOutcome {
            run,
            items,
            topics: drafts.into_iter().map(|d| d.topic).collect(),
            trends,
        }
    }

    async fn embed_items(
        &self,
        items: &[ProcessedItem],
    ) -> Result<HashMap<Uuid, Vec<f32>>> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }
        let texts: Vec<String> = items.iter().map(ProcessedItem::embedding_text).collect();
        let embeddings = tokio::time::timeout(
            retry::EMBEDDING_BATCH_TIMEOUT,
            self.embedding.embed_batch(&texts),
        )
        .await
        .map_err(|_| Error::resource_exhausted("embedding batch timed out"))??;

        if embeddings.len() != items.len() {
            return Err(Error::embedding(format!(
                "embedding batch returned {} vectors for {} items",
                embeddings.len(),
                items.len()
            )));
        }
        Ok(items
            .iter()
            .zip(embeddings)
            .map(|(item, e)| (item.id, e.vector))
            .collect())
    }
}

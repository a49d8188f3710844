//! Application service ports consumed by the API facade.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{CollectorStatus, PipelineRun, RawItem, Trend};
use crate::error::Result;
use crate::value_objects::SearchRequest;

/// Semantic search over indexed trends and topics.
#[async_trait]
pub trait SearchServiceInterface: Send + Sync {
    /// Run a semantic search; see the request type for knobs.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Trend>>;

    /// Trends similar to an existing trend, excluding the trend itself.
    async fn similar(&self, trend_id: Uuid, limit: usize, min_similarity: f32)
    -> Result<Vec<Trend>>;
}

/// Full ingest-process-persist-index cycle.
#[async_trait]
pub trait OrchestratorInterface: Send + Sync {
    /// Run one full cycle. A second concurrent cycle for the same scope is
    /// rejected with `Validation("already running")` semantics.
    async fn run_cycle(&self, force: bool) -> Result<PipelineRun>;

    /// Delete vector entries whose owning entity no longer exists.
    async fn sweep_tombstones(&self) -> Result<u64>;
}

/// Admin surface of the collector runtime.
#[async_trait]
pub trait CollectorRuntimeInterface: Send + Sync {
    /// Status of every registered collector.
    async fn status_all(&self) -> Result<Vec<CollectorStatus>>;

    /// Run one collector by name, honoring the rate limiter unless `force`.
    async fn run(&self, name: &str, force: bool) -> Result<Vec<RawItem>>;

    /// Enable a collector by name.
    async fn enable_by_name(&self, name: &str) -> Result<()>;

    /// Disable a collector by name.
    async fn disable_by_name(&self, name: &str) -> Result<()>;

    /// Admin reset of a plugin's health record.
    async fn reset_health(&self, name: &str) -> Result<()>;

    /// One probe call against the collector's endpoint; returns latency in
    /// milliseconds on success.
    async fn test_connection(&self, name: &str) -> Result<u64>;
}

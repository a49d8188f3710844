//! External provider ports.

use std::time::Duration;

use async_trait::async_trait;

use crate::entities::{AuthEnvelope, CollectorMetadata, EncryptedData, RawItem};
use crate::error::Result;
use crate::value_objects::{Embedding, VectorFilter, VectorHit, VectorRecord};

// ============================================================================
// Embedding
// ============================================================================

/// Text-to-vector provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_owned()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::embedding("No embedding returned"))
    }

    /// Embed a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &str;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}

// ============================================================================
// Vector store
// ============================================================================

/// Vector index; keys follow the `"trend:{uuid}"` / `"item:{uuid}"` convention.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace one record.
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// Insert or replace a batch of records.
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// K-nearest search with cosine similarity and payload filtering.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// Fetch one record by key.
    async fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    /// Delete one record by key; absent keys are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// All record keys, used by the tombstone sweep.
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &str;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<()>;
}

// ============================================================================
// Cache
// ============================================================================

/// Per-entry options for cache writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheEntryConfig {
    /// Time to live; `None` means the backend default.
    pub ttl: Option<Duration>,
}

impl CacheEntryConfig {
    /// Entry config with an explicit TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// TTL-bounded cache with counters, shared by read paths and the rate limiter.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug {
    /// Fetch a JSON string by key.
    async fn get_json(&self, key: &str) -> Result<Option<String>>;

    /// Store a JSON string under `key`.
    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()>;

    /// Delete one key; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete all keys matching a glob pattern; returns how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    /// Whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomically increment a counter, creating it with `ttl` on first use.
    /// Returns the post-increment value.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64>;

    /// Drop everything.
    async fn clear(&self) -> Result<()>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &str;
}

// ============================================================================
// Crypto
// ============================================================================

/// Encryption at rest for credential envelopes.
pub trait CryptoProvider: Send + Sync {
    /// Encrypt plaintext bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher rejects the input.
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData>;

    /// Decrypt a ciphertext container.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure or malformed input.
    fn decrypt(&self, encrypted_data: &EncryptedData) -> Result<Vec<u8>>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &str;
}

// ============================================================================
// Collectors
// ============================================================================

/// A component that produces raw items from one source.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Static metadata describing this collector.
    fn metadata(&self) -> &CollectorMetadata;

    /// Fetch a batch of raw items. May block on I/O.
    async fn collect(&self) -> Result<Vec<RawItem>>;

    /// Cheap per-item sanity check applied before the item enters the pipeline.
    fn validate(&self, item: &RawItem) -> bool {
        !item.title.trim().is_empty() && !item.url.is_empty() && !item.source_id.is_empty()
    }
}

/// Execution context handed to a sandboxed collector script.
#[derive(Debug, Clone)]
pub struct SandboxContext {
    /// Source tag stamped onto emitted items.
    pub source_name: String,
    /// Endpoint URL made available to the script.
    pub url: String,
    /// Decrypted credentials, if the source has any.
    pub auth: Option<AuthEnvelope>,
    /// Wall-clock budget for the invocation.
    pub timeout: Duration,
}

/// Restricted execution environment for user-supplied collector code.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Static validation: syntax check plus word-boundary blacklist scan.
    ///
    /// # Errors
    ///
    /// Returns `SandboxSecurity` when the code references a blacklisted
    /// identifier or fails to compile.
    fn validate(&self, code: &str) -> Result<()>;

    /// Run the script's entry point and collect the items it yields.
    ///
    /// # Errors
    ///
    /// Returns `SandboxSecurity` for policy violations and
    /// `ResourceExhausted` when the time or operation budget is exceeded.
    async fn execute(&self, code: &str, context: SandboxContext) -> Result<Vec<RawItem>>;
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Sliding-window rate limiter keyed by plugin name and UTC hour bucket.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check-and-count: returns `false` once the current hour's count has
    /// reached `limit`. Each allowed call consumes one unit of budget.
    async fn check_allowed(&self, plugin: &str, limit: u32) -> Result<bool>;
}

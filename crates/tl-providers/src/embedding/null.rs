//! Null embedding provider.
//!
//! Produces deterministic pseudo-embeddings derived from a content hash.
//! Identical texts map to identical vectors, which is exactly what offline
//! runs and tests need; semantic quality is obviously nil.

use std::sync::Arc;

use async_trait::async_trait;

use tl_domain::compute_fingerprint;
use tl_domain::error::Result;
use tl_domain::ports::EmbeddingProvider;
use tl_domain::registry::embedding::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use tl_domain::value_objects::{Embedding, normalize_vector};

const DEFAULT_DIMENSIONS: usize = 64;

/// Hash-derived deterministic embedding provider.
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    /// Provider emitting vectors of the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|text| {
                let digest = compute_fingerprint(text);
                let bytes = digest.as_bytes();
                let mut vector: Vec<f32> = (0..self.dimensions)
                    .map(|i| {
                        let b = bytes[i % bytes.len()];
                        (f32::from(b) - 80.0) / 80.0
                    })
                    .collect();
                normalize_vector(&mut vector);
                Embedding::new(vector, "null")
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "null"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn null_factory(
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    Ok(Arc::new(NullEmbeddingProvider::new(
        config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
    )))
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static NULL_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "null",
    description: "Deterministic hash-derived embeddings for offline use",
    build: null_factory,
};

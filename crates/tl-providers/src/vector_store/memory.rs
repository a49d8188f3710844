//! In-memory vector store.
//!
//! Exact cosine scan over a concurrent map. Suits single-node deployments
//! and tests; remote stores take over at scale.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use tl_domain::error::Result;
use tl_domain::ports::VectorStoreProvider;
use tl_domain::registry::vector_store::{
    VECTOR_STORE_PROVIDERS, VectorStoreProviderConfig, VectorStoreProviderEntry,
};
use tl_domain::value_objects::{VectorFilter, VectorHit, VectorRecord, cosine_similarity};

/// Concurrent in-memory vector index with exact search.
#[derive(Debug, Default)]
pub struct MemoryVectorStoreProvider {
    records: DashMap<String, VectorRecord>,
}

impl MemoryVectorStoreProvider {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStoreProvider {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            self.records.insert(record.id.clone(), record);
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
        let mut hits: Vec<VectorHit> = self
            .records
            .iter()
            .filter(|entry| filter.is_none_or(|f| f.matches(&entry.payload)))
            .filter_map(|entry| {
                let score = cosine_similarity(vector, &entry.embedding.vector);
                (score >= min_score).then(|| VectorHit {
                    id: entry.id.clone(),
                    score,
                    payload: entry.payload.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.records.iter().map(|r| r.id.clone()).collect())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn memory_factory(
    _config: &VectorStoreProviderConfig,
) -> std::result::Result<Arc<dyn VectorStoreProvider>, String> {
    Ok(Arc::new(MemoryVectorStoreProvider::new()))
}

#[linkme::distributed_slice(VECTOR_STORE_PROVIDERS)]
static MEMORY_PROVIDER: VectorStoreProviderEntry = VectorStoreProviderEntry {
    name: "memory",
    description: "In-memory exact-search vector store",
    build: memory_factory,
};

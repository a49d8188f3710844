//! Ollama embedding provider.
//!
//! Talks to a local or remote Ollama instance over its REST API. Batch
//! requests are sequential single calls; Ollama has no native batch endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tl_application::retry::retry_with_backoff;
use tl_domain::constants::retry as retry_defaults;
use tl_domain::error::{Error, Result};
use tl_domain::ports::EmbeddingProvider;
use tl_domain::registry::embedding::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use tl_domain::value_objects::Embedding;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider backed by Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Provider for the given base URL and model.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(retry_defaults::HTTP_TIMEOUT)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| Error::transient_with_source("ollama request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            if status.is_server_error() {
                return Err(Error::transient(format!("ollama returned HTTP {status}")));
            }
            return Err(Error::embedding(format!("ollama returned HTTP {status}")));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("ollama response parse failed: {e}")))?;
        Ok(Embedding::new(body.embedding, self.model.clone()))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let embedding = retry_with_backoff(
                retry_defaults::EMBEDDING_RETRY_COUNT,
                retry_defaults::EMBEDDING_RETRY_BACKOFF,
                Error::is_retryable,
                |_| self.embed_one(text),
            )
            .await?;
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn ollama_factory(
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    let base_url = config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
    let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned());
    let dimensions = config.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
    Ok(Arc::new(OllamaEmbeddingProvider::new(
        base_url, model, dimensions,
    )))
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static OLLAMA_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "ollama",
    description: "Ollama local embedding API",
    build: ollama_factory,
};

//! OpenAI-compatible embedding provider.
//!
//! Works against the official API and any server implementing the
//! `/v1/embeddings` contract.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Embedding provider for the OpenAI `/v1/embeddings` API.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    /// Provider for the given endpoint and credentials.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(retry_defaults::HTTP_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::transient_with_source("openai request failed", e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(match retry_after {
                Some(after) => Error::rate_limited_after("openai rate limit", after),
                None => Error::rate_limited("openai rate limit"),
            });
        }
        if !status.is_success() {
            if status.is_server_error() {
                return Err(Error::transient(format!("openai returned HTTP {status}")));
            }
            return Err(Error::embedding(format!("openai returned HTTP {status}")));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("openai response parse failed: {e}")))?;
        body.data.sort_by_key(|d| d.index);
        Ok(body
            .data
            .into_iter()
            .map(|d| Embedding::new(d.embedding, self.model.clone()))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        retry_with_backoff(
            retry_defaults::EMBEDDING_RETRY_COUNT,
            retry_defaults::EMBEDDING_RETRY_BACKOFF,
            Error::is_retryable,
            |_| self.request_batch(texts),
        )
        .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn openai_factory(
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| "OpenAI embedding provider requires api_key in config".to_owned())?;
    let base_url = config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
    let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned());
    let dimensions = config.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
    Ok(Arc::new(OpenAiEmbeddingProvider::new(
        base_url, api_key, model, dimensions,
    )))
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static OPENAI_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "openai",
    description: "OpenAI-compatible embeddings API",
    build: openai_factory,
};

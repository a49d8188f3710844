//! Qdrant vector store adapter over the REST API.
//!
//! Record keys (`"trend:{uuid}"`) are mapped to deterministic UUIDv5 point
//! ids; the original key rides along in the payload. A connection failure
//! surfaces as `ServiceUnavailable` so callers never silently fall back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use uuid::Uuid;

use tl_domain::constants::retry as retry_defaults;
use tl_domain::error::{Error, Result};
use tl_domain::ports::VectorStoreProvider;
use tl_domain::registry::vector_store::{
    VECTOR_STORE_PROVIDERS, VectorStoreProviderConfig, VectorStoreProviderEntry,
};
use tl_domain::value_objects::{Embedding, VectorFilter, VectorHit, VectorPayload, VectorRecord};

const DEFAULT_URL: &str = "http://localhost:6333";
const DEFAULT_COLLECTION: &str = "trendlens";
const SCROLL_PAGE: usize = 256;

/// Qdrant REST adapter.
pub struct QdrantVectorStoreProvider {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dimensions: usize,
    collection_ready: OnceCell<()>,
}

impl QdrantVectorStoreProvider {
    /// Adapter for the given endpoint and collection.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            collection: collection.into(),
            api_key,
            dimensions,
            collection_ready: OnceCell::new(),
        }
    }

    fn point_id(key: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .timeout(retry_defaults::HTTP_TIMEOUT);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::service_unavailable("qdrant")
            } else {
                Error::transient_with_source("qdrant request failed", e)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::vector_db(format!(
                "qdrant returned HTTP {status}: {detail}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("qdrant response parse failed: {e}")))
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                let response = self
                    .request(
                        reqwest::Method::GET,
                        &format!("/collections/{}", self.collection),
                    )
                    .send()
                    .await
                    .map_err(|_| Error::service_unavailable("qdrant"))?;
                if response.status().is_success() {
                    return Ok(());
                }
                self.send(
                    self.request(
                        reqwest::Method::PUT,
                        &format!("/collections/{}", self.collection),
                    )
                    .json(&json!({
                        "vectors": { "size": self.dimensions, "distance": "Cosine" }
                    })),
                )
                .await
                .map(|_| ())
            })
            .await
            .map(|_| ())
    }

    fn payload_json(record: &VectorRecord) -> Value {
        let mut payload = serde_json::to_value(&record.payload).unwrap_or_default();
        if let Value::Object(map) = &mut payload {
            map.insert("key".to_owned(), json!(record.id));
            map.insert(
                "published_ts".to_owned(),
                json!(record.payload.published_at.timestamp()),
            );
        }
        payload
    }

    fn filter_json(filter: &VectorFilter) -> Value {
        let mut must = Vec::new();
        if let Some(entity) = filter.entity {
            must.push(json!({"key": "entity", "match": {"value": entity.to_string()}}));
        }
        if let Some(category) = filter.category {
            must.push(json!({"key": "category", "match": {"value": category.to_string()}}));
        }
        if let Some(states) = &filter.states {
            let values: Vec<String> = states.iter().map(ToString::to_string).collect();
            must.push(json!({"key": "state", "match": {"any": values}}));
        }
        if let Some(language) = &filter.language {
            must.push(json!({"key": "language", "match": {"value": language}}));
        }
        if let Some(sources) = &filter.sources_any {
            must.push(json!({"key": "sources", "match": {"any": sources}}));
        }
        if let Some(min_score) = filter.min_score {
            must.push(json!({"key": "score", "range": {"gte": min_score}}));
        }
        if filter.published_after.is_some() || filter.published_before.is_some() {
            let mut range = serde_json::Map::new();
            if let Some(after) = filter.published_after {
                range.insert("gte".to_owned(), json!(after.timestamp()));
            }
            if let Some(before) = filter.published_before {
                range.insert("lte".to_owned(), json!(before.timestamp()));
            }
            must.push(json!({"key": "published_ts", "range": range}));
        }
        json!({"must": must})
    }

    fn parse_payload(value: &Value) -> Option<(String, VectorPayload)> {
        let key = value.get("key")?.as_str()?.to_owned();
        let mut clean = value.clone();
        if let Value::Object(map) = &mut clean {
            map.remove("key");
            map.remove("published_ts");
        }
        let payload = serde_json::from_value(clean).ok()?;
        Some((key, payload))
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStoreProvider {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;
        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": Self::point_id(&record.id),
                    "vector": record.embedding.vector,
                    "payload": Self::payload_json(record),
                })
            })
            .collect();
        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&json!({ "points": points })),
        )
        .await
        .map(|_| ())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<VectorHit>> {
        self.ensure_collection().await?;
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = Self::filter_json(filter);
        }
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points/search", self.collection),
                )
                .json(&body),
            )
            .await?;

        let hits = response
            .get("result")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|point| {
                        let score = point.get("score")?.as_f64()? as f32;
                        let (key, payload) = Self::parse_payload(point.get("payload")?)?;
                        Some(VectorHit {
                            id: key,
                            score,
                            payload,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        self.ensure_collection().await?;
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points", self.collection),
                )
                .json(&json!({
                    "ids": [Self::point_id(id)],
                    "with_payload": true,
                    "with_vector": true,
                })),
            )
            .await?;

        let record = response
            .get("result")
            .and_then(Value::as_array)
            .and_then(|points| points.first())
            .and_then(|point| {
                let vector: Vec<f32> = point
                    .get("vector")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
                let (key, payload) = Self::parse_payload(point.get("payload")?)?;
                Some(VectorRecord {
                    id: key,
                    embedding: Embedding::new(vector, "qdrant"),
                    payload,
                })
            });
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_collection().await?;
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
            )
            .json(&json!({ "points": [Self::point_id(id)] })),
        )
        .await
        .map(|_| ())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        self.ensure_collection().await?;
        let mut ids = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({ "limit": SCROLL_PAGE, "with_payload": true });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }
            let response = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/collections/{}/points/scroll", self.collection),
                    )
                    .json(&body),
                )
                .await?;

            if let Some(points) = response.pointer("/result/points").and_then(Value::as_array) {
                for point in points {
                    if let Some(key) = point.pointer("/payload/key").and_then(Value::as_str) {
                        ids.push(key.to_owned());
                    }
                }
            }
            match response.pointer("/result/next_page_offset") {
                Some(next) if !next.is_null() => offset = Some(next.clone()),
                _ => break,
            }
        }
        Ok(ids)
    }

    fn provider_name(&self) -> &str {
        "qdrant"
    }

    async fn health_check(&self) -> Result<()> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("/collections/{}", self.collection),
        ))
        .await
        .map(|_| ())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn qdrant_factory(
    config: &VectorStoreProviderConfig,
) -> std::result::Result<Arc<dyn VectorStoreProvider>, String> {
    let url = config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_owned());
    let collection = config
        .collection
        .clone()
        .unwrap_or_else(|| DEFAULT_COLLECTION.to_owned());
    let dimensions = config
        .dimensions
        .ok_or_else(|| "Qdrant vector store requires dimensions in config".to_owned())?;
    Ok(Arc::new(QdrantVectorStoreProvider::new(
        url,
        collection,
        config.api_key.clone(),
        dimensions,
    )))
}

#[linkme::distributed_slice(VECTOR_STORE_PROVIDERS)]
static QDRANT_PROVIDER: VectorStoreProviderEntry = VectorStoreProviderEntry {
    name: "qdrant",
    description: "Qdrant remote vector store (REST)",
    build: qdrant_factory,
};

//! Semantic search endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use tl_domain::entities::{Category, Trend, TrendState};
use tl_domain::ports::SearchServiceInterface;
use tl_domain::value_objects::{SearchRequest, SearchType, VectorFilter};
use tl_infrastructure::AppContext;

use crate::error::ApiResult;

pub(crate) fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/search", post(search))
}

/// Wire shape of a search request; flattened filters keep the JSON surface
/// friendlier than the internal filter object.
#[derive(Debug, Default, Deserialize)]
struct SearchPayload {
    query: Option<String>,
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    min_similarity: f32,
    category: Option<Category>,
    states: Option<Vec<TrendState>>,
    sources: Option<Vec<String>>,
    language: Option<String>,
    min_score: Option<f64>,
    published_after: Option<chrono::DateTime<chrono::Utc>>,
    published_before: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    search_type: SearchType,
}

impl From<SearchPayload> for SearchRequest {
    fn from(payload: SearchPayload) -> Self {
        Self {
            query: payload.query,
            embedding: payload.embedding,
            limit: payload.limit,
            min_similarity: payload.min_similarity,
            filters: VectorFilter {
                entity: None,
                category: payload.category,
                states: payload.states,
                language: payload.language,
                sources_any: payload.sources,
                min_score: payload.min_score,
                published_after: payload.published_after,
                published_before: payload.published_before,
            },
            search_type: payload.search_type,
        }
    }
}

async fn search(
    State(context): State<Arc<AppContext>>,
    Json(payload): Json<SearchPayload>,
) -> ApiResult<Json<Vec<Trend>>> {
    let trends = context.search.search(payload.into()).await?;
    Ok(Json(trends))
}

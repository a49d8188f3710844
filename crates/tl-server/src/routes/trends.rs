//! Trend read paths, cached with the shared key conventions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use tl_domain::compute_fingerprint;
use tl_domain::constants::cache_keys;
use tl_domain::entities::{Category, Trend, TrendState};
use tl_domain::error::Error;
use tl_domain::ports::{CacheEntryConfig, SearchServiceInterface};
use tl_domain::value_objects::ListFilter;
use tl_infrastructure::AppContext;

use crate::error::ApiResult;

pub(crate) fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/trends", get(list_trends))
        .route("/trends/{id}", get(get_trend))
        .route("/trends/{id}/similar", get(similar_trends))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    category: Option<Category>,
    state: Option<TrendState>,
    language: Option<String>,
    source: Option<String>,
    min_score: Option<f64>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl ListQuery {
    fn to_filter(&self) -> ListFilter {
        ListFilter {
            category: self.category,
            states: self.state.map(|s| vec![s]),
            sources: self.source.clone().map(|s| vec![s]),
            language: self.language.clone(),
            min_score: self.min_score,
            limit: self.limit,
            offset: self.offset,
            ..Default::default()
        }
    }

    fn fingerprint(&self) -> String {
        compute_fingerprint(&format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.category,
            self.state,
            self.language,
            self.source,
            self.min_score,
            self.limit,
            self.offset
        ))
    }
}

async fn list_trends(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Trend>>> {
    let cache_key = cache_keys::trends_list(&query.fingerprint());
    if let Ok(Some(cached)) = context.cache.get_json(&cache_key).await
        && let Ok(trends) = serde_json::from_str::<Vec<Trend>>(&cached)
    {
        return Ok(Json(trends));
    }

    let trends = context.trend_repo.list(&query.to_filter()).await?;

    if let Ok(json) = serde_json::to_string(&trends) {
        let config = CacheEntryConfig::with_ttl(cache_keys::TRENDS_LIST_TTL);
        let _ = context.cache.set_json(&cache_key, &json, config).await;
    }
    Ok(Json(trends))
}

async fn get_trend(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Trend>> {
    let cache_key = cache_keys::trends_detail(id);
    if let Ok(Some(cached)) = context.cache.get_json(&cache_key).await
        && let Ok(trend) = serde_json::from_str::<Trend>(&cached)
    {
        return Ok(Json(trend));
    }

    let trend = context
        .trend_repo
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("trend {id}")))?;

    if let Ok(json) = serde_json::to_string(&trend) {
        let config = CacheEntryConfig::with_ttl(cache_keys::TRENDS_DETAIL_TTL);
        let _ = context.cache.set_json(&cache_key, &json, config).await;
    }
    Ok(Json(trend))
}

#[derive(Debug, Deserialize)]
struct SimilarQuery {
    limit: Option<usize>,
    min_similarity: Option<f32>,
}

async fn similar_trends(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<Json<Vec<Trend>>> {
    let trends = context
        .search
        .similar(
            id,
            query.limit.unwrap_or(10),
            query.min_similarity.unwrap_or(0.7),
        )
        .await?;
    Ok(Json(trends))
}

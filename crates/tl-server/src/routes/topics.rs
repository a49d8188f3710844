//! Topic read paths.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use tl_domain::constants::cache_keys;
use tl_domain::entities::{ProcessedItem, Topic};
use tl_domain::error::Error;
use tl_domain::ports::CacheEntryConfig;
use tl_infrastructure::AppContext;

use crate::error::ApiResult;

pub(crate) fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/topics/{id}", get(get_topic))
        .route("/topics/{id}/items", get(get_topic_items))
}

async fn get_topic(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Topic>> {
    let topic = context
        .topic_repo
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("topic {id}")))?;
    Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn get_topic_items(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<Json<Vec<ProcessedItem>>> {
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let cache_key = cache_keys::topics_items(id, limit, offset);
    if let Ok(Some(cached)) = context.cache.get_json(&cache_key).await
        && let Ok(items) = serde_json::from_str::<Vec<ProcessedItem>>(&cached)
    {
        return Ok(Json(items));
    }

    let items = context
        .topic_repo
        .get_items_by_topic(id, limit, offset)
        .await?;

    if let Ok(json) = serde_json::to_string(&items) {
        let config = CacheEntryConfig::with_ttl(cache_keys::TOPICS_ITEMS_TTL);
        let _ = context.cache.set_json(&cache_key, &json, config).await;
    }
    Ok(Json(items))
}

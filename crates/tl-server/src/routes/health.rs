//! Liveness and dependency health.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use tl_infrastructure::AppContext;

pub(crate) fn router() -> Router<Arc<AppContext>> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    embedding: bool,
    vector_store: bool,
}

async fn health(State(context): State<Arc<AppContext>>) -> Json<HealthResponse> {
    let embedding = context.embedding.health_check().await.is_ok();
    let vector_store = context.vector_store.health_check().await.is_ok();
    let status = if embedding && vector_store {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        embedding,
        vector_store,
    })
}

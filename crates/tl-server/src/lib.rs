//! # HTTP Facade
//!
//! Thin axum layer over the application services: trend read paths, semantic
//! search, and the collector admin surface. All business logic lives below;
//! handlers translate HTTP to port calls and domain errors to status codes.

mod error;
mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tl_infrastructure::AppContext;

pub use error::ApiError;

/// Build the full router over an initialized application context.
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .merge(routes::trends::router())
        .merge(routes::search::router())
        .merge(routes::topics::router())
        .merge(routes::admin::router())
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(context)
}

/// Bind and serve until the process is signalled.
///
/// # Errors
///
/// Returns an error when the listener cannot bind.
pub async fn serve(context: Arc<AppContext>) -> tl_domain::error::Result<()> {
    let addr = format!(
        "{}:{}",
        context.config.server.host, context.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API listening");
    axum::serve(listener, router(context))
        .await
        .map_err(|e| tl_domain::error::Error::internal(format!("server exited: {e}")))
}

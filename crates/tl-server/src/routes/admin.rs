//! Admin surface: collector sources, manual runs, health, pipeline control.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use tl_application::runtime::scheduler::parse_schedule;
use tl_domain::entities::{
    AuthEnvelope, CollectorSource, CollectorStatus, PipelineRun, PluginHealth, SourceType,
};
use tl_domain::error::Error;
use tl_domain::ports::{CollectorRuntimeInterface, OrchestratorInterface};
use tl_infrastructure::AppContext;

use crate::error::ApiResult;

pub(crate) fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/admin/collectors", get(list_collectors))
        .route("/admin/collectors/{name}/run", post(run_collector))
        .route("/admin/collectors/{name}/enable", post(enable_collector))
        .route("/admin/collectors/{name}/disable", post(disable_collector))
        .route("/admin/collectors/{name}/health", get(get_health))
        .route("/admin/collectors/{name}/reset-health", post(reset_health))
        .route("/admin/collectors/{name}/test", post(test_connection))
        .route("/admin/sources", get(list_sources).post(create_source))
        .route("/admin/sources/{id}", put(update_source).delete(delete_source))
        .route("/admin/pipeline/run", post(run_pipeline))
        .route("/admin/pipeline/sweep", post(sweep_tombstones))
        .route("/admin/runs", get(list_runs))
}

async fn list_collectors(
    State(context): State<Arc<AppContext>>,
) -> ApiResult<Json<Vec<CollectorStatus>>> {
    Ok(Json(context.runtime.status_all().await?))
}

#[derive(Debug, Default, Deserialize)]
struct ForceQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    items: usize,
}

async fn run_collector(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
    Query(query): Query<ForceQuery>,
) -> ApiResult<Json<RunResponse>> {
    let items = context.runtime.run(&name, query.force).await?;
    Ok(Json(RunResponse { items: items.len() }))
}

async fn enable_collector(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    context.runtime.enable_by_name(&name).await?;
    Ok(Json(serde_json::json!({ "enabled": true })))
}

async fn disable_collector(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    context.runtime.disable_by_name(&name).await?;
    Ok(Json(serde_json::json!({ "enabled": false })))
}

async fn get_health(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<PluginHealth>> {
    let health = context
        .health_repo
        .get(&name)
        .await?
        .ok_or_else(|| Error::not_found(format!("health record for '{name}'")))?;
    Ok(Json(health))
}

async fn reset_health(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    context.runtime.reset_health(&name).await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

#[derive(Debug, Serialize)]
struct ProbeResponse {
    ok: bool,
    latency_ms: u64,
}

async fn test_connection(
    State(context): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProbeResponse>> {
    let latency_ms = context.runtime.test_connection(&name).await?;
    Ok(Json(ProbeResponse {
        ok: true,
        latency_ms,
    }))
}

async fn list_sources(
    State(context): State<Arc<AppContext>>,
) -> ApiResult<Json<Vec<CollectorSource>>> {
    let mut sources = context.source_repo.list_all().await?;
    // Never hand ciphertext to the dashboard.
    for source in &mut sources {
        source.auth = None;
    }
    Ok(Json(sources))
}

/// Source create/update payload; credentials arrive in clear over the admin
/// channel and are encrypted before they touch the database.
#[derive(Debug, Deserialize)]
struct SourcePayload {
    name: String,
    source_type: SourceType,
    url: String,
    schedule: String,
    #[serde(default = "default_rate_limit")]
    rate_limit_per_hour: u32,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
    language: Option<String>,
    #[serde(default)]
    include_keywords: Vec<String>,
    #[serde(default)]
    exclude_keywords: Vec<String>,
    api_key: Option<String>,
    oauth_token: Option<String>,
    code_body: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_rate_limit() -> u32 {
    60
}
fn default_timeout() -> u64 {
    30
}
fn default_enabled() -> bool {
    true
}

impl SourcePayload {
    fn into_source(self, context: &AppContext, id: i64) -> Result<CollectorSource, Error> {
        parse_schedule(&self.schedule)?;

        if self.source_type == SourceType::Custom {
            let code = self
                .code_body
                .as_deref()
                .ok_or_else(|| Error::validation("custom sources need a code body"))?;
            // Activation gate: invalid scripts never reach the database.
            context.sandbox.validate(code)?;
        }

        let auth = if self.api_key.is_some() || self.oauth_token.is_some() {
            let envelope = AuthEnvelope {
                api_key: self.api_key.clone(),
                oauth_token: self.oauth_token.clone(),
            };
            let plaintext = serde_json::to_vec(&envelope)?;
            Some(context.crypto.encrypt(&plaintext)?)
        } else {
            None
        };

        let now = chrono::Utc::now();
        Ok(CollectorSource {
            id,
            name: self.name,
            source_type: self.source_type,
            url: self.url,
            schedule: self.schedule,
            rate_limit_per_hour: self.rate_limit_per_hour,
            timeout_secs: self.timeout_secs,
            language: self.language,
            include_keywords: self.include_keywords,
            exclude_keywords: self.exclude_keywords,
            auth,
            code_body: self.code_body,
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
        })
    }
}

async fn create_source(
    State(context): State<Arc<AppContext>>,
    Json(payload): Json<SourcePayload>,
) -> ApiResult<Json<serde_json::Value>> {
    let source = payload.into_source(&context, 0)?;
    let id = context.source_repo.create(&source).await?;
    if let Err(err) = context.runtime.load_db_defined().await {
        tracing::warn!(error = %err, "reloading collectors after create failed");
    }
    Ok(Json(serde_json::json!({ "id": id })))
}

async fn update_source(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<i64>,
    Json(payload): Json<SourcePayload>,
) -> ApiResult<Json<serde_json::Value>> {
    let source = payload.into_source(&context, id)?;
    context.source_repo.update(&source).await?;
    if let Err(err) = context.runtime.load_db_defined().await {
        tracing::warn!(error = %err, "reloading collectors after update failed");
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn delete_source(
    State(context): State<Arc<AppContext>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = context.source_repo.delete(id).await?;
    if !removed {
        return Err(Error::not_found(format!("collector source {id}")).into());
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn run_pipeline(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<ForceQuery>,
) -> ApiResult<Json<PipelineRun>> {
    let run = context.orchestrator.run_cycle(query.force).await?;
    Ok(Json(run))
}

async fn sweep_tombstones(
    State(context): State<Arc<AppContext>>,
) -> ApiResult<Json<serde_json::Value>> {
    let swept = context.orchestrator.sweep_tombstones().await?;
    Ok(Json(serde_json::json!({ "swept": swept })))
}

#[derive(Debug, Deserialize)]
struct RunsQuery {
    limit: Option<u32>,
}

async fn list_runs(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<Vec<PipelineRun>>> {
    let runs = context
        .run_repo
        .list_recent(query.limit.unwrap_or(20))
        .await?;
    Ok(Json(runs))
}

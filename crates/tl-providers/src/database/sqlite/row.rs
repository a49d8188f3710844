//! Row-to-entity conversion helpers shared by the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use tl_domain::entities::{
    Category, CollectorSource, EncryptedData, EngagementMetrics, PipelineRun, PluginHealth,
    ProcessedItem, RunStatus, SourceType, Topic, Trend, TrendState,
};
use tl_domain::error::{Error, Result};

pub(crate) fn db_err(e: sqlx::Error) -> Error {
    Error::database_with_source("sqlite operation failed", e)
}

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    Uuid::parse_str(&raw).map_err(|e| Error::database(format!("bad uuid in '{column}': {e}")))
}

pub(crate) fn get_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("bad timestamp in '{column}': {e}")))
}

pub(crate) fn get_datetime_opt(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column).map_err(db_err)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::database(format!("bad timestamp in '{column}': {e}")))
    })
    .transpose()
}

pub(crate) fn get_json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::database(format!("bad JSON list in '{column}': {e}")))
}

pub(crate) fn get_enum<T: FromStr>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    T::from_str(&raw).map_err(|_| Error::database(format!("bad enum value '{raw}' in '{column}'")))
}

pub(crate) fn get_engagement(row: &SqliteRow) -> Result<EngagementMetrics> {
    Ok(EngagementMetrics {
        upvotes: row.try_get::<i64, _>("upvotes").map_err(db_err)?.max(0) as u64,
        downvotes: row.try_get::<i64, _>("downvotes").map_err(db_err)?.max(0) as u64,
        comments: row.try_get::<i64, _>("comments").map_err(db_err)?.max(0) as u64,
        shares: row.try_get::<i64, _>("shares").map_err(db_err)?.max(0) as u64,
        views: row.try_get::<i64, _>("views").map_err(db_err)?.max(0) as u64,
    })
}

pub(crate) fn item_from_row(row: &SqliteRow) -> Result<ProcessedItem> {
    Ok(ProcessedItem {
        id: get_uuid(row, "id")?,
        source: row.try_get("source").map_err(db_err)?,
        source_id: row.try_get("source_id").map_err(db_err)?,
        url: row.try_get("url").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        normalized_title: row.try_get("normalized_title").map_err(db_err)?,
        body: row.try_get("body").map_err(db_err)?,
        author: row.try_get("author").map_err(db_err)?,
        published_at: get_datetime(row, "published_at")?,
        engagement: get_engagement(row)?,
        category: get_enum::<Category>(row, "category")?,
        language_hint: row.try_get("language_hint").map_err(db_err)?,
        language: row.try_get("language").map_err(db_err)?,
        language_confidence: row.try_get("language_confidence").map_err(db_err)?,
        keywords: get_json_list(row, "keywords")?,
        sentiment: row.try_get("sentiment").map_err(db_err)?,
        tags: get_json_list(row, "tags")?,
        processed_at: get_datetime(row, "processed_at")?,
    })
}

pub(crate) fn topic_from_row(row: &SqliteRow) -> Result<Topic> {
    Ok(Topic {
        id: get_uuid(row, "id")?,
        title: row.try_get("title").map_err(db_err)?,
        summary: row.try_get("summary").map_err(db_err)?,
        category: get_enum::<Category>(row, "category")?,
        keywords: get_json_list(row, "keywords")?,
        item_count: row.try_get::<i64, _>("item_count").map_err(db_err)?.max(0) as u64,
        engagement: get_engagement(row)?,
        max_velocity: row.try_get("max_velocity").map_err(db_err)?,
        first_seen: get_datetime(row, "first_seen")?,
        last_updated: get_datetime(row, "last_updated")?,
        language: row.try_get("language").map_err(db_err)?,
        item_ids: Vec::new(),
    })
}

pub(crate) fn trend_from_row(row: &SqliteRow) -> Result<Trend> {
    Ok(Trend {
        id: get_uuid(row, "id")?,
        topic_id: get_uuid(row, "topic_id")?,
        rank: row.try_get::<i64, _>("rank").map_err(db_err)?.max(0) as u32,
        score: row.try_get("score").map_err(db_err)?,
        state: get_enum::<TrendState>(row, "state")?,
        velocity: row.try_get("velocity").map_err(db_err)?,
        sources: get_json_list(row, "sources")?,
        language: row.try_get("language").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        summary: row.try_get("summary").map_err(db_err)?,
        category: get_enum::<Category>(row, "category")?,
        created_at: get_datetime(row, "created_at")?,
    })
}

pub(crate) fn health_from_row(row: &SqliteRow) -> Result<PluginHealth> {
    Ok(PluginHealth {
        plugin_name: row.try_get("plugin_name").map_err(db_err)?,
        last_run: get_datetime_opt(row, "last_run")?,
        last_success: get_datetime_opt(row, "last_success")?,
        last_error: row.try_get("last_error").map_err(db_err)?,
        consecutive_failures: row
            .try_get::<i64, _>("consecutive_failures")
            .map_err(db_err)?
            .max(0) as u32,
        total_runs: row.try_get::<i64, _>("total_runs").map_err(db_err)?.max(0) as u64,
        success_rate: row.try_get("success_rate").map_err(db_err)?,
        is_healthy: row.try_get::<i64, _>("is_healthy").map_err(db_err)? != 0,
    })
}

pub(crate) fn source_from_row(row: &SqliteRow) -> Result<CollectorSource> {
    let auth: Option<String> = row.try_get("auth").map_err(db_err)?;
    let auth: Option<EncryptedData> = auth
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| Error::database(format!("bad auth envelope: {e}")))
        })
        .transpose()?;
    Ok(CollectorSource {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        source_type: get_enum::<SourceType>(row, "source_type")?,
        url: row.try_get("url").map_err(db_err)?,
        schedule: row.try_get("schedule").map_err(db_err)?,
        rate_limit_per_hour: row
            .try_get::<i64, _>("rate_limit_per_hour")
            .map_err(db_err)?
            .max(0) as u32,
        timeout_secs: row.try_get::<i64, _>("timeout_secs").map_err(db_err)?.max(0) as u64,
        language: row.try_get("language").map_err(db_err)?,
        include_keywords: get_json_list(row, "include_keywords")?,
        exclude_keywords: get_json_list(row, "exclude_keywords")?,
        auth,
        code_body: row.try_get("code_body").map_err(db_err)?,
        enabled: row.try_get::<i64, _>("enabled").map_err(db_err)? != 0,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub(crate) fn run_from_row(row: &SqliteRow) -> Result<PipelineRun> {
    let errors: String = row.try_get("errors").map_err(db_err)?;
    let config_snapshot: String = row.try_get("config_snapshot").map_err(db_err)?;
    Ok(PipelineRun {
        id: get_uuid(row, "id")?,
        started_at: get_datetime(row, "started_at")?,
        completed_at: get_datetime_opt(row, "completed_at")?,
        status: get_enum::<RunStatus>(row, "status")?,
        items_in: row.try_get::<i64, _>("items_in").map_err(db_err)?.max(0) as u64,
        items_out: row.try_get::<i64, _>("items_out").map_err(db_err)?.max(0) as u64,
        topics: row.try_get::<i64, _>("topics").map_err(db_err)?.max(0) as u64,
        trends: row.try_get::<i64, _>("trends").map_err(db_err)?.max(0) as u64,
        errors: serde_json::from_str(&errors)
            .map_err(|e| Error::database(format!("bad errors list: {e}")))?,
        config_snapshot: serde_json::from_str(&config_snapshot)
            .map_err(|e| Error::database(format!("bad config snapshot: {e}")))?,
    })
}

/// RFC3339 with consistent subsecond precision so string ordering matches
/// chronological ordering.
pub(crate) fn fmt_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

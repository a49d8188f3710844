//! Collector plugin definitions: metadata, health, and DB-defined sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static description of a collector plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorMetadata {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Source tag stamped onto emitted items.
    pub source: String,
    /// Cron schedule expression.
    pub schedule: String,
    /// Requests-per-hour budget.
    pub rate_limit_per_hour: u32,
    /// Per-run timeout in seconds.
    pub timeout_secs: u64,
    /// Network retry budget per run.
    pub retry_count: u32,
    /// Whether the scheduler considers this plugin.
    pub enabled: bool,
}

impl CollectorMetadata {
    /// Metadata with conservative defaults for the given name and source tag.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_owned(),
            source: source.into(),
            schedule: "0 */15 * * * *".to_owned(),
            rate_limit_per_hour: 60,
            timeout_secs: 30,
            retry_count: 3,
            enabled: true,
        }
    }
}

/// Point-in-time status of one registered collector, as reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorStatus {
    /// Plugin name.
    pub name: String,
    /// Source tag.
    pub source: String,
    /// Whether the plugin is enabled.
    pub enabled: bool,
    /// Whether health tracking considers the plugin healthy.
    pub healthy: bool,
    /// Cron schedule expression.
    pub schedule: String,
    /// Last run, if any.
    pub last_run: Option<DateTime<Utc>>,
    /// Last successful run, if any.
    pub last_success: Option<DateTime<Utc>>,
    /// Most recent error string, if any.
    pub last_error: Option<String>,
}

/// Durable per-collector health record.
///
/// Invariant: `is_healthy = consecutive_failures < threshold && success_rate >= floor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginHealth {
    /// Plugin name; unique identity.
    pub plugin_name: String,
    /// When the plugin last ran.
    pub last_run: Option<DateTime<Utc>>,
    /// When the plugin last succeeded.
    pub last_success: Option<DateTime<Utc>>,
    /// Error string of the most recent failure.
    pub last_error: Option<String>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Total recorded runs.
    pub total_runs: u64,
    /// Success rate in [0, 1].
    pub success_rate: f64,
    /// Cached healthiness verdict.
    pub is_healthy: bool,
}

impl PluginHealth {
    /// Fresh record for a plugin that has never run.
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            last_run: None,
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
            total_runs: 0,
            success_rate: 1.0,
            is_healthy: true,
        }
    }

    /// Record a successful run at `now` and recompute the verdict.
    pub fn record_success(&mut self, now: DateTime<Utc>, threshold: u32, floor: f64) {
        let successes = self.success_rate * self.total_runs as f64 + 1.0;
        self.total_runs += 1;
        self.success_rate = successes / self.total_runs as f64;
        self.consecutive_failures = 0;
        self.last_run = Some(now);
        self.last_success = Some(now);
        self.last_error = None;
        self.recompute(threshold, floor);
    }

    /// Record a failed run at `now` and recompute the verdict.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        threshold: u32,
        floor: f64,
    ) {
        let successes = self.success_rate * self.total_runs as f64;
        self.total_runs += 1;
        self.success_rate = successes / self.total_runs as f64;
        self.consecutive_failures += 1;
        self.last_run = Some(now);
        self.last_error = Some(error.into());
        self.recompute(threshold, floor);
    }

    /// Admin reset: clear failures and restore the healthy verdict.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
        self.success_rate = 1.0;
        self.is_healthy = true;
    }

    fn recompute(&mut self, threshold: u32, floor: f64) {
        self.is_healthy = self.consecutive_failures < threshold && self.success_rate >= floor;
    }
}

/// Collector source type for DB-defined collectors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    /// RSS or Atom feed.
    Rss,
    /// Twitter/X search or timeline.
    Twitter,
    /// Reddit listing.
    Reddit,
    /// YouTube channel or search.
    Youtube,
    /// User-supplied sandboxed script.
    Custom,
}

/// Decrypted credential envelope handed to a collector for the duration of
/// one run. Never persisted in clear text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthEnvelope {
    /// Static API key, if the source uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OAuth bearer token, if the source uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
}

/// Ciphertext container for an [`AuthEnvelope`] encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// AES-GCM ciphertext.
    pub ciphertext: Vec<u8>,
    /// Nonce used for this ciphertext.
    pub nonce: Vec<u8>,
}

impl EncryptedData {
    /// Bundle ciphertext with its nonce.
    #[must_use]
    pub fn new(ciphertext: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { ciphertext, nonce }
    }
}

/// Admin-managed, DB-defined collector definition.
///
/// For `custom` sources the `code_body` must pass sandbox validation before
/// the source can be activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSource {
    /// Numeric identity.
    pub id: i64,
    /// Unique name.
    pub name: String,
    /// Which built-in (or custom) collector to instantiate.
    pub source_type: SourceType,
    /// Endpoint URL.
    pub url: String,
    /// Cron schedule expression.
    pub schedule: String,
    /// Requests-per-hour budget.
    pub rate_limit_per_hour: u32,
    /// Per-run timeout in seconds.
    pub timeout_secs: u64,
    /// Expected content language, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Keep only items matching at least one of these keywords (empty = all).
    #[serde(default)]
    pub include_keywords: Vec<String>,
    /// Drop items matching any of these keywords.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Credential envelope, encrypted at rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<EncryptedData>,
    /// Script body for `custom` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_body: Option<String>,
    /// Whether the source is active.
    pub enabled: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl CollectorSource {
    /// Collector metadata derived from this source definition.
    #[must_use]
    pub fn metadata(&self) -> CollectorMetadata {
        CollectorMetadata {
            name: self.name.clone(),
            version: "db".to_owned(),
            source: self.name.clone(),
            schedule: self.schedule.clone(),
            rate_limit_per_hour: self.rate_limit_per_hour,
            timeout_secs: self.timeout_secs,
            retry_count: 3,
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_resets_consecutive_failures_on_success() {
        let mut h = PluginHealth::new("hn");
        let now = Utc::now();
        h.record_failure("timeout", now, 3, 0.5);
        h.record_failure("timeout", now, 3, 0.5);
        assert_eq!(h.consecutive_failures, 2);
        assert!(h.is_healthy);

        h.record_failure("timeout", now, 3, 0.5);
        assert!(!h.is_healthy);

        h.record_success(now, 3, 0.5);
        assert_eq!(h.consecutive_failures, 0);
        // 1 success out of 4 runs is below the 0.5 floor
        assert!(!h.is_healthy);
        assert!((h.success_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_health() {
        let mut h = PluginHealth::new("hn");
        let now = Utc::now();
        for _ in 0..5 {
            h.record_failure("boom", now, 3, 0.5);
        }
        assert!(!h.is_healthy);
        h.reset();
        assert!(h.is_healthy);
        assert_eq!(h.consecutive_failures, 0);
    }
}

//! Collector runtime: registration, dynamic loading, scheduling, rate
//! limiting, and health tracking.
//!
//! Static collectors arrive through [`CollectorRuntime::register_static`];
//! DB-defined sources are instantiated from the collector registry at load
//! time. The two sets form an explicit union — there is no directory
//! scanning. One plugin's failure never aborts a cycle.

pub mod rate_limit;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use tl_domain::constants::retry as retry_defaults;
use tl_domain::entities::{
    AuthEnvelope, CollectorMetadata, CollectorStatus, PluginHealth, RawItem, SourceType,
};
use tl_domain::error::{Error, Result};
use tl_domain::ports::{
    Collector, CollectorRuntimeInterface, CryptoProvider, PluginHealthRepository, RateLimiter,
    SandboxEngine,
};
use tl_domain::ports::CollectorSourceRepository;
use tl_domain::registry::collector::{CollectorSettings, resolve_collector};

use crate::retry::retry_with_backoff;

/// Health policy knobs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Consecutive failures after which a plugin is unhealthy.
    pub failure_threshold: u32,
    /// Minimum success rate for a plugin to stay healthy.
    pub success_rate_floor: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_rate_floor: 0.5,
        }
    }
}

struct Registered {
    collector: Arc<dyn Collector>,
    metadata: CollectorMetadata,
    url: Option<String>,
}

/// Only network-shaped failures are retried for collector runs; sandbox
/// violations and budget exhaustion are recorded and never retried.
fn network_retryable(error: &Error) -> bool {
    matches!(
        error,
        Error::Transient { .. } | Error::RateLimited { .. }
    )
}

/// The collector runtime.
pub struct CollectorRuntime {
    registry: tokio::sync::Mutex<HashMap<String, Registered>>,
    run_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    health_repo: Arc<dyn PluginHealthRepository>,
    source_repo: Arc<dyn CollectorSourceRepository>,
    rate_limiter: Arc<dyn RateLimiter>,
    crypto: Arc<dyn CryptoProvider>,
    sandbox: Arc<dyn SandboxEngine>,
    http: reqwest::Client,
    config: RuntimeConfig,
}

impl CollectorRuntime {
    /// Assemble a runtime over the given ports.
    pub fn new(
        health_repo: Arc<dyn PluginHealthRepository>,
        source_repo: Arc<dyn CollectorSourceRepository>,
        rate_limiter: Arc<dyn RateLimiter>,
        crypto: Arc<dyn CryptoProvider>,
        sandbox: Arc<dyn SandboxEngine>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            registry: tokio::sync::Mutex::new(HashMap::new()),
            run_locks: DashMap::new(),
            health_repo,
            source_repo,
            rate_limiter,
            crypto,
            sandbox,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Register statically-constructed collectors.
    pub async fn register_static(&self, collectors: Vec<Arc<dyn Collector>>) {
        let mut registry = self.registry.lock().await;
        for collector in collectors {
            let metadata = collector.metadata().clone();
            tracing::info!(plugin = %metadata.name, "registered static collector");
            registry.insert(
                metadata.name.clone(),
                Registered {
                    collector,
                    metadata,
                    url: None,
                },
            );
        }
    }

    /// Instantiate every enabled DB-defined source and add it to the
    /// registry. Custom sources are validated by the sandbox first; a source
    /// failing validation is skipped and its failure recorded.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source listing itself fails; per-source
    /// problems are recorded as health failures.
    pub async fn load_db_defined(&self) -> Result<usize> {
        let sources = self.source_repo.list_enabled().await?;
        let mut loaded = 0usize;
        for source in sources {
            let auth = match &source.auth {
                Some(encrypted) => match self.decrypt_auth(encrypted) {
                    Ok(envelope) => Some(envelope),
                    Err(err) => {
                        tracing::warn!(source = %source.name, error = %err, "auth decryption failed");
                        self.record_failure(&source.name, &err).await;
                        continue;
                    }
                },
                None => None,
            };

            if source.source_type == SourceType::Custom {
                let Some(code) = source.code_body.as_deref() else {
                    self.record_failure(
                        &source.name,
                        &Error::validation("custom source has no code body"),
                    )
                    .await;
                    continue;
                };
                if let Err(err) = self.sandbox.validate(code) {
                    tracing::warn!(source = %source.name, error = %err, "custom source rejected");
                    self.record_failure(&source.name, &err).await;
                    continue;
                }
            }

            let settings = CollectorSettings {
                name: source.name.clone(),
                url: source.url.clone(),
                schedule: source.schedule.clone(),
                rate_limit_per_hour: source.rate_limit_per_hour,
                timeout_secs: source.timeout_secs,
                retry_count: retry_defaults::COLLECTOR_RETRY_COUNT,
                include_keywords: source.include_keywords.clone(),
                exclude_keywords: source.exclude_keywords.clone(),
                language: source.language.clone(),
                auth,
                code_body: source.code_body.clone(),
            };

            match resolve_collector(source.source_type, &settings) {
                Ok(collector) => {
                    let metadata = collector.metadata().clone();
                    let mut registry = self.registry.lock().await;
                    registry.insert(
                        source.name.clone(),
                        Registered {
                            collector,
                            metadata,
                            url: Some(source.url.clone()),
                        },
                    );
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(source = %source.name, error = %err, "collector construction failed");
                    self.record_failure(&source.name, &err).await;
                }
            }
        }
        tracing::info!(loaded, "loaded DB-defined collectors");
        Ok(loaded)
    }

    /// Update a plugin's cron schedule.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad expression, `NotFound` for an unknown
    /// plugin.
    pub async fn schedule(&self, name: &str, cron_expr: &str) -> Result<()> {
        scheduler::parse_schedule(cron_expr)?;
        let mut registry = self.registry.lock().await;
        let registered = registry
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("collector '{name}'")))?;
        registered.metadata.schedule = cron_expr.to_owned();
        Ok(())
    }

    /// Run every due, healthy, enabled plugin once and collate the items.
    /// Per-plugin failures are recorded and skipped, never propagated.
    pub async fn run_due(&self) -> Vec<RawItem> {
        let now = Utc::now();
        let candidates: Vec<(String, String)> = {
            let registry = self.registry.lock().await;
            registry
                .values()
                .filter(|r| r.metadata.enabled)
                .map(|r| (r.metadata.name.clone(), r.metadata.schedule.clone()))
                .collect()
        };

        let mut collated = Vec::new();
        for (name, schedule_expr) in candidates {
            let health = self.health_repo.get(&name).await.ok().flatten();
            if let Some(health) = &health
                && !health.is_healthy
            {
                tracing::debug!(plugin = %name, "skipping unhealthy plugin");
                continue;
            }
            let due = scheduler::parse_schedule(&schedule_expr)
                .map(|s| scheduler::is_due(&s, health.and_then(|h| h.last_run), now))
                .unwrap_or(false);
            if !due {
                continue;
            }
            match self.run(&name, false).await {
                Ok(mut items) => collated.append(&mut items),
                Err(err) => {
                    tracing::warn!(plugin = %name, error = %err, "scheduled run failed");
                }
            }
        }
        collated
    }

    fn decrypt_auth(&self, encrypted: &tl_domain::entities::EncryptedData) -> Result<AuthEnvelope> {
        let plaintext = self.crypto.decrypt(encrypted)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    async fn record_success(&self, name: &str) {
        let mut health = self
            .health_repo
            .get(name)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| PluginHealth::new(name));
        health.record_success(
            Utc::now(),
            self.config.failure_threshold,
            self.config.success_rate_floor,
        );
        if let Err(err) = self.health_repo.upsert(&health).await {
            tracing::warn!(plugin = name, error = %err, "health upsert failed");
        }
    }

    async fn record_failure(&self, name: &str, error: &Error) {
        let mut health = self
            .health_repo
            .get(name)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| PluginHealth::new(name));
        health.record_failure(
            error.to_string(),
            Utc::now(),
            self.config.failure_threshold,
            self.config.success_rate_floor,
        );
        let exhausted_threshold = health.consecutive_failures >= self.config.failure_threshold;
        if let Err(err) = self.health_repo.upsert(&health).await {
            tracing::warn!(plugin = name, error = %err, "health upsert failed");
        }

        // Sandbox violations disable the plugin once the threshold is hit;
        // it stays registered so an admin can inspect and re-enable it.
        if matches!(
            error,
            Error::SandboxSecurity { .. } | Error::ResourceExhausted { .. }
        ) && exhausted_threshold
        {
            tracing::warn!(plugin = name, "auto-disabling plugin after sandbox failures");
            let mut registry = self.registry.lock().await;
            if let Some(registered) = registry.get_mut(name) {
                registered.metadata.enabled = false;
            }
            drop(registry);
            if let Err(err) = self.source_repo.set_enabled(name, false).await
                && !matches!(err, Error::NotFound { .. })
            {
                tracing::warn!(plugin = name, error = %err, "source disable failed");
            }
        }
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let registered = registry
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("collector '{name}'")))?;
        registered.metadata.enabled = enabled;
        drop(registry);

        // Static collectors have no DB row; that is fine.
        match self.source_repo.set_enabled(name, enabled).await {
            Ok(()) => Ok(()),
            Err(Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl CollectorRuntimeInterface for CollectorRuntime {
    async fn status_all(&self) -> Result<Vec<CollectorStatus>> {
        let snapshot: Vec<CollectorMetadata> = {
            let registry = self.registry.lock().await;
            registry.values().map(|r| r.metadata.clone()).collect()
        };
        let mut statuses = Vec::with_capacity(snapshot.len());
        for metadata in snapshot {
            let health = self.health_repo.get(&metadata.name).await?;
            statuses.push(CollectorStatus {
                name: metadata.name.clone(),
                source: metadata.source.clone(),
                enabled: metadata.enabled,
                healthy: health.as_ref().is_none_or(|h| h.is_healthy),
                schedule: metadata.schedule.clone(),
                last_run: health.as_ref().and_then(|h| h.last_run),
                last_success: health.as_ref().and_then(|h| h.last_success),
                last_error: health.and_then(|h| h.last_error),
            });
        }
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }

    async fn run(&self, name: &str, force: bool) -> Result<Vec<RawItem>> {
        let (collector, metadata) = {
            let registry = self.registry.lock().await;
            let registered = registry
                .get(name)
                .ok_or_else(|| Error::not_found(format!("collector '{name}'")))?;
            (Arc::clone(&registered.collector), registered.metadata.clone())
        };
        if !metadata.enabled {
            return Err(Error::validation(format!("collector '{name}' is disabled")));
        }

        if !force
            && !self
                .rate_limiter
                .check_allowed(name, metadata.rate_limit_per_hour)
                .await?
        {
            let secs_into_hour = (Utc::now().timestamp().rem_euclid(3600)) as u64;
            return Err(Error::rate_limited_after(
                format!("collector '{name}' exhausted its hourly budget"),
                Duration::from_secs(3600 - secs_into_hour),
            ));
        }

        // Per-plugin concurrency is one: a second run of the same plugin
        // waits for the first.
        let lock = self
            .run_locks
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let timeout = Duration::from_secs(metadata.timeout_secs);
        // retry_count is the retry budget beyond the first attempt.
        let attempts = metadata.retry_count + 1;
        let result = retry_with_backoff(
            attempts,
            retry_defaults::COLLECTOR_RETRY_BASE_DELAY,
            network_retryable,
            |_| {
                let collector = Arc::clone(&collector);
                async move {
                    tokio::time::timeout(timeout, collector.collect())
                        .await
                        .map_err(|_| Error::transient("collector run timed out"))?
                }
            },
        )
        .await;

        match result {
            Ok(items) => {
                let valid: Vec<RawItem> = items
                    .into_iter()
                    .filter(|item| collector.validate(item))
                    .collect();
                tracing::info!(plugin = name, items = valid.len(), "collector run succeeded");
                self.record_success(name).await;
                Ok(valid)
            }
            Err(err) => {
                tracing::warn!(plugin = name, error = %err, "collector run failed");
                self.record_failure(name, &err).await;
                Err(err)
            }
        }
    }

    async fn enable_by_name(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true).await
    }

    async fn disable_by_name(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false).await
    }

    async fn reset_health(&self, name: &str) -> Result<()> {
        let mut health = self
            .health_repo
            .get(name)
            .await?
            .unwrap_or_else(|| PluginHealth::new(name));
        health.reset();
        self.health_repo.upsert(&health).await
    }

    async fn test_connection(&self, name: &str) -> Result<u64> {
        let url = {
            let registry = self.registry.lock().await;
            let registered = registry
                .get(name)
                .ok_or_else(|| Error::not_found(format!("collector '{name}'")))?;
            registered
                .url
                .clone()
                .ok_or_else(|| Error::validation(format!("collector '{name}' has no probe URL")))?
        };

        let started = std::time::Instant::now();
        let response = self
            .http
            .get(&url)
            .timeout(retry_defaults::HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("probe request failed", e))?;
        if !response.status().is_success() {
            return Err(Error::transient(format!(
                "probe returned HTTP {}",
                response.status()
            )));
        }
        Ok(started.elapsed().as_millis() as u64)
    }
}

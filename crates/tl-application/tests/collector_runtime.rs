//! Collector runtime tests: backoff, health bookkeeping, rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tl_application::runtime::rate_limit::InMemoryRateLimiter;
use tl_application::runtime::{CollectorRuntime, RuntimeConfig};
use tl_domain::Result;
use tl_domain::entities::*;
use tl_domain::error::Error;
use tl_domain::ports::*;

// -----------------------------------------------------------------------------
// Mocks
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MapHealthRepository {
    records: tokio::sync::Mutex<HashMap<String, PluginHealth>>,
}

#[async_trait]
impl PluginHealthRepository for MapHealthRepository {
    async fn get(&self, name: &str) -> Result<Option<PluginHealth>> {
        Ok(self.records.lock().await.get(name).cloned())
    }
    async fn get_all(&self) -> Result<Vec<PluginHealth>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
    async fn upsert(&self, health: &PluginHealth) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(health.plugin_name.clone(), health.clone());
        Ok(())
    }
    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.records.lock().await.remove(name).is_some())
    }
}

#[derive(Debug, Default)]
struct EmptySourceRepository;

#[async_trait]
impl CollectorSourceRepository for EmptySourceRepository {
    async fn list_all(&self) -> Result<Vec<CollectorSource>> {
        Ok(Vec::new())
    }
    async fn list_enabled(&self) -> Result<Vec<CollectorSource>> {
        Ok(Vec::new())
    }
    async fn get_by_name(&self, _name: &str) -> Result<Option<CollectorSource>> {
        Ok(None)
    }
    async fn create(&self, _source: &CollectorSource) -> Result<i64> {
        Ok(1)
    }
    async fn update(&self, _source: &CollectorSource) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _id: i64) -> Result<bool> {
        Ok(false)
    }
    async fn set_enabled(&self, name: &str, _enabled: bool) -> Result<()> {
        Err(Error::not_found(format!("collector source '{name}'")))
    }
}

struct NoopCrypto;

impl CryptoProvider for NoopCrypto {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData> {
        Ok(EncryptedData::new(plaintext.to_vec(), vec![0; 12]))
    }
    fn decrypt(&self, encrypted_data: &EncryptedData) -> Result<Vec<u8>> {
        Ok(encrypted_data.ciphertext.clone())
    }
    fn provider_name(&self) -> &str {
        "noop"
    }
}

struct NoopSandbox;

#[async_trait]
impl SandboxEngine for NoopSandbox {
    fn validate(&self, _code: &str) -> Result<()> {
        Ok(())
    }
    async fn execute(&self, _code: &str, _context: SandboxContext) -> Result<Vec<RawItem>> {
        Ok(Vec::new())
    }
}

/// Fails with a network error until `fail_times` calls have happened.
struct FlakyCollector {
    metadata: CollectorMetadata,
    calls: AtomicU32,
    fail_times: u32,
}

impl FlakyCollector {
    fn new(name: &str, fail_times: u32) -> Self {
        Self {
            metadata: CollectorMetadata::new(name, name),
            calls: AtomicU32::new(0),
            fail_times,
        }
    }
}

#[async_trait]
impl Collector for FlakyCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            return Err(Error::transient("connection reset by peer"));
        }
        let mut item = RawItem::new(
            self.metadata.source.clone(),
            Uuid::new_v4().to_string(),
            "https://example.com/story",
            "a perfectly valid story",
        );
        item.published_at = Utc::now();
        Ok(vec![item])
    }
}

/// Always violates sandbox policy.
struct HostileCollector {
    metadata: CollectorMetadata,
}

#[async_trait]
impl Collector for HostileCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }
    async fn collect(&self) -> Result<Vec<RawItem>> {
        Err(Error::sandbox_security("script referenced exec"))
    }
}

fn runtime(health_repo: Arc<MapHealthRepository>) -> CollectorRuntime {
    CollectorRuntime::new(
        health_repo,
        Arc::new(EmptySourceRepository),
        Arc::new(InMemoryRateLimiter::new()),
        Arc::new(NoopCrypto),
        Arc::new(NoopSandbox),
        RuntimeConfig::default(),
    )
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn network_failures_back_off_and_recover() {
    // S4: three network failures, success on the fourth attempt, health
    // fully restored afterwards.
    let health_repo = Arc::new(MapHealthRepository::default());
    let rt = runtime(Arc::clone(&health_repo));
    let collector = Arc::new(FlakyCollector::new("flaky", 3));
    rt.register_static(vec![Arc::clone(&collector) as Arc<dyn Collector>])
        .await;

    let items = rt.run("flaky", false).await.expect("run succeeds");
    assert_eq!(items.len(), 1);
    assert_eq!(collector.calls.load(Ordering::SeqCst), 4);

    let health = health_repo
        .get("flaky")
        .await
        .expect("get")
        .expect("record");
    assert_eq!(health.consecutive_failures, 0);
    assert!(health.is_healthy);
    assert!(health.last_success.is_some());
}

#[tokio::test(start_paused = true)]
async fn sandbox_violations_are_never_retried_and_disable_after_threshold() {
    let health_repo = Arc::new(MapHealthRepository::default());
    let rt = runtime(Arc::clone(&health_repo));
    rt.register_static(vec![Arc::new(HostileCollector {
        metadata: CollectorMetadata::new("hostile", "hostile"),
    }) as Arc<dyn Collector>])
        .await;

    for _ in 0..3 {
        let err = rt.run("hostile", true).await;
        assert!(matches!(err, Err(Error::SandboxSecurity { .. })));
    }

    let health = health_repo
        .get("hostile")
        .await
        .expect("get")
        .expect("record");
    assert_eq!(health.consecutive_failures, 3);
    assert!(!health.is_healthy);

    // The third strike disabled the plugin.
    let err = rt.run("hostile", true).await;
    assert!(matches!(err, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn rate_limit_rejects_beyond_budget_unless_forced() {
    let health_repo = Arc::new(MapHealthRepository::default());
    let rt = runtime(Arc::clone(&health_repo));
    let mut metadata = CollectorMetadata::new("steady", "steady");
    metadata.rate_limit_per_hour = 2;
    let collector = Arc::new(FlakyCollector {
        metadata,
        calls: AtomicU32::new(0),
        fail_times: 0,
    });
    rt.register_static(vec![collector as Arc<dyn Collector>]).await;

    assert!(rt.run("steady", false).await.is_ok());
    assert!(rt.run("steady", false).await.is_ok());

    let third = rt.run("steady", false).await;
    match third {
        Err(Error::RateLimited { retry_after, .. }) => {
            assert!(retry_after.is_some());
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    // force bypasses the limiter.
    assert!(rt.run("steady", true).await.is_ok());
}

#[tokio::test]
async fn reset_health_restores_an_unhealthy_plugin() {
    let health_repo = Arc::new(MapHealthRepository::default());
    let rt = runtime(Arc::clone(&health_repo));
    rt.register_static(vec![Arc::new(HostileCollector {
        metadata: CollectorMetadata::new("hostile", "hostile"),
    }) as Arc<dyn Collector>])
        .await;

    for _ in 0..3 {
        let _ = rt.run("hostile", true).await;
    }
    assert!(!health_repo
        .get("hostile")
        .await
        .expect("get")
        .expect("record")
        .is_healthy);

    rt.reset_health("hostile").await.expect("reset");
    let health = health_repo
        .get("hostile")
        .await
        .expect("get")
        .expect("record");
    assert!(health.is_healthy);
    assert_eq!(health.consecutive_failures, 0);
}

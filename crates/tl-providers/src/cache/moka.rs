//! Moka in-memory cache provider.
//!
//! High-performance concurrent in-process cache. Counters live in a separate
//! concurrent map because they need atomic read-modify-write, which a plain
//! value cache cannot give.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;

use tl_domain::error::{Error, Result};
use tl_domain::ports::{CacheEntryConfig, CacheProvider};

use super::glob_to_regex;

const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Clone)]
struct CachedValue {
    json: String,
    expires_at: Option<Instant>,
}

/// Moka-based in-memory cache provider.
pub struct MokaCacheProvider {
    cache: Cache<String, CachedValue>,
    counters: DashMap<String, (i64, Instant)>,
    default_ttl: Option<Duration>,
}

impl MokaCacheProvider {
    /// Provider with the given capacity and default TTL.
    #[must_use]
    pub fn new(max_entries: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries as u64).build(),
            counters: DashMap::new(),
            default_ttl,
        }
    }
}

impl Default for MokaCacheProvider {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, None)
    }
}

impl std::fmt::Debug for MokaCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheProvider")
            .field("entries", &self.cache.entry_count())
            .field("counters", &self.counters.len())
            .finish()
    }
}

#[async_trait]
impl CacheProvider for MokaCacheProvider {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.get(key).await {
            if cached
                .expires_at
                .is_some_and(|expires_at| Instant::now() >= expires_at)
            {
                self.cache.invalidate(key).await;
                return Ok(None);
            }
            return Ok(Some(cached.json));
        }
        Ok(None)
    }

    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()> {
        let ttl = config.ttl.or(self.default_ttl);
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.cache
            .insert(
                key.to_owned(),
                CachedValue {
                    json: value.to_owned(),
                    expires_at,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        Ok(existed)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let regex = glob_to_regex(pattern)
            .ok_or_else(|| Error::cache(format!("invalid glob pattern '{pattern}'")))?;
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| regex.is_match(key))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        let removed = matching.len() as u64;
        for key in matching {
            self.cache.invalidate(&key).await;
        }
        self.counters.retain(|key, _| !regex.is_match(key));
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_json(key).await?.is_some())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| (0, now + ttl));
        let (count, expires_at) = entry.value_mut();
        if now >= *expires_at {
            *count = 0;
            *expires_at = now + ttl;
        }
        *count += 1;
        Ok(*count)
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.counters.clear();
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "moka"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

use tl_domain::registry::cache::{CACHE_PROVIDERS, CacheProviderConfig, CacheProviderEntry};

fn moka_cache_factory(
    config: &CacheProviderConfig,
) -> std::result::Result<Arc<dyn CacheProvider>, String> {
    let max_entries = config.max_size.unwrap_or(DEFAULT_MAX_ENTRIES);
    let default_ttl = config.default_ttl_secs.map(Duration::from_secs);
    Ok(Arc::new(MokaCacheProvider::new(max_entries, default_ttl)))
}

#[linkme::distributed_slice(CACHE_PROVIDERS)]
static MOKA_PROVIDER: CacheProviderEntry = CacheProviderEntry {
    name: "moka",
    description: "Moka high-performance in-memory cache",
    build: moka_cache_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() {
        let cache = MokaCacheProvider::default();
        cache
            .set_json("trends:detail:1", "{\"x\":1}", CacheEntryConfig::default())
            .await
            .ok();
        assert_eq!(
            cache.get_json("trends:detail:1").await.unwrap_or(None),
            Some("{\"x\":1}".to_owned())
        );
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = MokaCacheProvider::default();
        cache
            .set_json(
                "k",
                "v",
                CacheEntryConfig::with_ttl(Duration::from_millis(5)),
            )
            .await
            .ok();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get_json("k").await.unwrap_or(None), None);
    }

    #[tokio::test]
    async fn delete_pattern_removes_key_family() {
        let cache = MokaCacheProvider::default();
        for key in ["trends:list:a", "trends:detail:b", "topics:items:c"] {
            cache
                .set_json(key, "{}", CacheEntryConfig::default())
                .await
                .ok();
        }
        cache.cache.run_pending_tasks().await;

        let removed = cache.delete_pattern("trends:*").await.unwrap_or(0);
        assert_eq!(removed, 2);
        assert_eq!(
            cache.get_json("topics:items:c").await.unwrap_or(None),
            Some("{}".to_owned())
        );
    }

    #[tokio::test]
    async fn counters_increment_monotonically_within_ttl() {
        let cache = MokaCacheProvider::default();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.incr("ratelimit:hn:2026030114", ttl).await.ok(), Some(1));
        assert_eq!(cache.incr("ratelimit:hn:2026030114", ttl).await.ok(), Some(2));
        assert_eq!(cache.incr("ratelimit:hn:2026030114", ttl).await.ok(), Some(3));
    }
}

//! Sliding-window rate limiters keyed by plugin name and UTC hour bucket.
//!
//! Two backends behind one port: an in-memory limiter for single-node
//! deployments and a cache-backed limiter whose atomic counter increments are
//! shared across nodes.

use async_trait::async_trait;
use dashmap::DashMap;

use tl_domain::constants::cache_keys;
use tl_domain::error::Result;
use tl_domain::ports::{CacheProvider, RateLimiter};

/// Single-node limiter over a concurrent map of hour buckets.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: DashMap<String, (String, u32)>,
}

impl InMemoryRateLimiter {
    /// Empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_allowed(&self, plugin: &str, limit: u32) -> Result<bool> {
        let bucket = cache_keys::ratelimit(plugin, chrono::Utc::now());
        let mut entry = self
            .buckets
            .entry(plugin.to_owned())
            .or_insert_with(|| (bucket.clone(), 0));
        let (current_bucket, count) = entry.value_mut();
        if *current_bucket != bucket {
            // New hour: the previous window expires wholesale.
            *current_bucket = bucket;
            *count = 0;
        }
        if *count >= limit {
            return Ok(false);
        }
        *count += 1;
        Ok(true)
    }
}

/// Distributed limiter backed by shared cache counters with TTL expiry.
#[derive(Debug)]
pub struct CacheRateLimiter {
    cache: std::sync::Arc<dyn CacheProvider>,
}

impl CacheRateLimiter {
    /// Limiter over the given cache.
    pub fn new(cache: std::sync::Arc<dyn CacheProvider>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RateLimiter for CacheRateLimiter {
    async fn check_allowed(&self, plugin: &str, limit: u32) -> Result<bool> {
        let key = cache_keys::ratelimit(plugin, chrono::Utc::now());
        let count = self.cache.incr(&key, cache_keys::RATELIMIT_TTL).await?;
        Ok(count <= i64::from(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_limiter_bounds_allowed_calls() {
        let limiter = InMemoryRateLimiter::new();
        let mut allowed = 0;
        for _ in 0..10 {
            if limiter.check_allowed("hn", 4).await.unwrap_or(false) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 4);
    }

    #[tokio::test]
    async fn limits_are_tracked_per_plugin() {
        let limiter = InMemoryRateLimiter::new();
        assert!(limiter.check_allowed("a", 1).await.unwrap_or(false));
        assert!(!limiter.check_allowed("a", 1).await.unwrap_or(true));
        assert!(limiter.check_allowed("b", 1).await.unwrap_or(false));
    }
}

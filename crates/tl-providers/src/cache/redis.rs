//! Redis cache provider.
//!
//! Distributed backend: shared counters make rate-limit increments atomic
//! across nodes. The connection manager reconnects on its own; we connect
//! lazily so provider construction stays synchronous for the registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use tl_domain::error::{Error, Result};
use tl_domain::ports::{CacheEntryConfig, CacheProvider};

const DEFAULT_URL: &str = "redis://127.0.0.1:6379";

/// Redis-backed cache provider.
pub struct RedisCacheProvider {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    default_ttl: Option<Duration>,
}

impl std::fmt::Debug for RedisCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheProvider")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

fn command_error(e: &redis::RedisError) -> Error {
    if e.is_connection_refusal() || e.is_io_error() || e.is_timeout() {
        Error::service_unavailable("redis")
    } else {
        Error::cache(e.to_string())
    }
}

impl RedisCacheProvider {
    /// Provider for the given connection URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the URL does not parse.
    pub fn new(url: &str, default_ttl: Option<Duration>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::config(format!("invalid redis url '{url}': {e}")))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            default_ttl,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .get_or_try_init(|| async {
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(|_| Error::service_unavailable("redis"))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        con.get(key).await.map_err(|e| command_error(&e))
    }

    async fn set_json(&self, key: &str, value: &str, config: CacheEntryConfig) -> Result<()> {
        let mut con = self.connection().await?;
        match config.ttl.or(self.default_ttl) {
            Some(ttl) => con
                .set_ex(key, value, ttl.as_secs())
                .await
                .map_err(|e| command_error(&e)),
            None => con.set(key, value).await.map_err(|e| command_error(&e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut con = self.connection().await?;
        let removed: i64 = con.del(key).await.map_err(|e| command_error(&e))?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut con = self.connection().await?;
        let keys: Vec<String> = {
            let mut iter = con
                .scan_match::<&str, String>(pattern)
                .await
                .map_err(|e| command_error(&e))?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: i64 = con.del(&keys).await.map_err(|e| command_error(&e))?;
        Ok(removed.max(0) as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut con = self.connection().await?;
        con.exists(key).await.map_err(|e| command_error(&e))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut con = self.connection().await?;
        let count: i64 = con.incr(key, 1).await.map_err(|e| command_error(&e))?;
        if count == 1 {
            // First touch creates the bucket; bound its lifetime.
            let _: () = con
                .expire(key, ttl.as_secs() as i64)
                .await
                .map_err(|e| command_error(&e))?;
        }
        Ok(count)
    }

    async fn clear(&self) -> Result<()> {
        let mut con = self.connection().await?;
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut con)
            .await
            .map_err(|e| command_error(&e))
    }

    fn provider_name(&self) -> &str {
        "redis"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use tl_domain::registry::cache::{CACHE_PROVIDERS, CacheProviderConfig, CacheProviderEntry};

fn redis_cache_factory(
    config: &CacheProviderConfig,
) -> std::result::Result<Arc<dyn CacheProvider>, String> {
    let url = config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_owned());
    let default_ttl = config.default_ttl_secs.map(Duration::from_secs);
    let provider = RedisCacheProvider::new(&url, default_ttl).map_err(|e| e.to_string())?;
    Ok(Arc::new(provider))
}

#[linkme::distributed_slice(CACHE_PROVIDERS)]
static REDIS_PROVIDER: CacheProviderEntry = CacheProviderEntry {
    name: "redis",
    description: "Redis distributed cache",
    build: redis_cache_factory,
};

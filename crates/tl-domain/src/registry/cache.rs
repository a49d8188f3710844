//! Cache Provider Registry

use std::collections::HashMap;

/// Configuration for cache provider creation
#[derive(Debug, Clone, Default)]
pub struct CacheProviderConfig {
    /// Provider name (e.g., "moka", "redis")
    pub provider: String,
    /// Connection URL for remote caches
    pub url: Option<String>,
    /// Maximum entries for in-process caches
    pub max_size: Option<usize>,
    /// Default TTL in seconds when an entry does not specify one
    pub default_ttl_secs: Option<u64>,
    /// Additional provider-specific configuration
    pub extra: HashMap<String, String>,
}

crate::impl_config_builder!(CacheProviderConfig {
    /// Set the connection URL
    url: with_url(into String),
    /// Set the maximum entry count
    max_size: with_max_size(usize),
    /// Set the default TTL in seconds
    default_ttl_secs: with_default_ttl_secs(u64),
});

crate::impl_registry!(
    provider_trait: crate::ports::CacheProvider,
    config_type: CacheProviderConfig,
    entry_type: CacheProviderEntry,
    slice_name: CACHE_PROVIDERS,
    resolve_fn: resolve_cache_provider,
    list_fn: list_cache_providers
);

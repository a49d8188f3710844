//! Configuration data types. Every knob has a default; a missing config file
//! yields a runnable single-node setup (SQLite + Moka + memory vector store).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tl_application::pipeline::PipelineConfig;

/// Metadata store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite database file path.
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/trendlens.db"),
        }
    }
}

/// Cache backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Provider name: "moka" or "redis".
    pub provider: String,
    /// Connection URL for remote backends.
    pub url: Option<String>,
    /// Maximum entries for in-process backends.
    pub max_size: Option<usize>,
    /// Default TTL in seconds.
    pub default_ttl_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            provider: "moka".to_owned(),
            url: None,
            max_size: Some(100_000),
            default_ttl_secs: None,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    /// Provider name: "ollama", "openai" or "null".
    pub provider: String,
    /// Model identifier.
    pub model: Option<String>,
    /// Provider base URL.
    pub base_url: Option<String>,
    /// API key, where the provider needs one.
    pub api_key: Option<String>,
    /// Vector dimensionality.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: "null".to_owned(),
            model: None,
            base_url: None,
            api_key: None,
            dimensions: None,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSection {
    /// Provider name: "memory" or "qdrant".
    pub provider: String,
    /// Store URL for remote backends.
    pub url: Option<String>,
    /// API key, where the store needs one.
    pub api_key: Option<String>,
    /// Collection name.
    pub collection: Option<String>,
}

impl Default for VectorStoreSection {
    fn default() -> Self {
        Self {
            provider: "memory".to_owned(),
            url: None,
            api_key: None,
            collection: Some("trendlens".to_owned()),
        }
    }
}

/// Collector runtime and health policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Consecutive failures after which a plugin is unhealthy.
    pub failure_threshold: u32,
    /// Minimum success rate for a plugin to stay healthy.
    pub success_rate_floor: f64,
    /// Seconds between orchestrator cycles when serving.
    pub cycle_interval_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_rate_floor: 0.5,
            cycle_interval_secs: 300,
        }
    }
}

/// Rate limiter backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterSection {
    /// "memory" for single-node, "cache" for the distributed counter backend.
    pub backend: String,
}

impl Default for RateLimiterSection {
    fn default() -> Self {
        Self {
            backend: "memory".to_owned(),
        }
    }
}

/// Sandbox policy. The blacklist is configuration, not code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    /// Blacklisted identifiers, matched with word boundaries.
    pub blacklist: Vec<String>,
    /// Module names the import hook lets through.
    pub allowed_modules: Vec<String>,
    /// Wall-clock budget per invocation, seconds.
    pub timeout_secs: u64,
    /// Operation budget per invocation.
    pub max_operations: u64,
    /// Memory ceiling in bytes.
    pub max_memory_bytes: usize,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            blacklist: tl_providers::sandbox::DEFAULT_BLACKLIST
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            allowed_modules: Vec::new(),
            timeout_secs: 30,
            max_operations: 5_000_000,
            max_memory_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Retention tier cut-overs. Taken as configuration, not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    /// Days items stay hot (fully queryable).
    pub hot_days: u32,
    /// Days before items leave the warm tier.
    pub warm_days: u32,
    /// Days before items are deleted outright.
    pub cold_days: u32,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            hot_days: 7,
            warm_days: 30,
            cold_days: 365,
        }
    }
}

/// API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Crypto settings for credential envelopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoSection {
    /// Base64-encoded 32-byte AES key. Generated and logged on first run
    /// when absent; production deployments must pin one.
    pub key: Option<String>,
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Metadata store settings.
    pub database: DatabaseSection,
    /// Cache backend settings.
    pub cache: CacheSection,
    /// Embedding provider settings.
    pub embedding: EmbeddingSection,
    /// Vector store settings.
    pub vector_store: VectorStoreSection,
    /// Pipeline knobs, snapshotted into every run record.
    pub pipeline: PipelineConfig,
    /// Collector runtime policy.
    pub runtime: RuntimeSection,
    /// Rate limiter backend.
    pub rate_limiter: RateLimiterSection,
    /// Sandbox policy.
    pub sandbox: SandboxSection,
    /// Retention tiers.
    pub retention: RetentionSection,
    /// API server settings.
    pub server: ServerSection,
    /// Crypto settings.
    pub crypto: CryptoSection,
}

//! Application context: one explicitly-initialized container wiring the
//! provider registries, repositories and services together. No hidden
//! globals; the optional process-wide instance is a single `OnceLock` slot
//! with one winning writer.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::Engine as _;
use rand::RngCore;

use tl_application::orchestrator::Orchestrator;
use tl_application::pipeline::Pipeline;
use tl_application::runtime::rate_limit::{CacheRateLimiter, InMemoryRateLimiter};
use tl_application::runtime::{CollectorRuntime, RuntimeConfig};
use tl_application::search::SearchService;
use tl_domain::error::{Error, Result};
use tl_domain::ports::{
    CacheProvider, Collector, CollectorSourceRepository, CryptoProvider, EmbeddingProvider,
    ItemRepository, PipelineRunRepository, PluginHealthRepository, RateLimiter, SandboxEngine,
    TopicRepository, TrendRepository, VectorStoreProvider,
};
use tl_domain::registry::cache::{CacheProviderConfig, resolve_cache_provider};
use tl_domain::registry::embedding::{EmbeddingProviderConfig, resolve_embedding_provider};
use tl_domain::registry::vector_store::{VectorStoreProviderConfig, resolve_vector_store_provider};
use tl_providers::collectors::HackerNewsCollector;
use tl_providers::crypto::AesGcmCryptoProvider;
use tl_providers::database::SqliteDatabase;
use tl_providers::sandbox::{RhaiSandbox, SandboxConfig};

use crate::config::AppConfig;

static GLOBAL: OnceLock<Arc<AppContext>> = OnceLock::new();

/// The assembled application.
pub struct AppContext {
    /// Effective configuration.
    pub config: AppConfig,
    /// Shared cache.
    pub cache: Arc<dyn CacheProvider>,
    /// Embedding provider.
    pub embedding: Arc<dyn EmbeddingProvider>,
    /// Vector store.
    pub vector_store: Arc<dyn VectorStoreProvider>,
    /// Crypto provider for credential envelopes.
    pub crypto: Arc<dyn CryptoProvider>,
    /// Sandbox used for custom source validation.
    pub sandbox: Arc<dyn SandboxEngine>,
    /// Trend repository.
    pub trend_repo: Arc<dyn TrendRepository>,
    /// Topic repository.
    pub topic_repo: Arc<dyn TopicRepository>,
    /// Item repository.
    pub item_repo: Arc<dyn ItemRepository>,
    /// Plugin-health repository.
    pub health_repo: Arc<dyn PluginHealthRepository>,
    /// Collector-source repository.
    pub source_repo: Arc<dyn CollectorSourceRepository>,
    /// Pipeline-run repository.
    pub run_repo: Arc<dyn PipelineRunRepository>,
    /// Collector runtime.
    pub runtime: Arc<CollectorRuntime>,
    /// Orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Semantic search service.
    pub search: Arc<SearchService>,
}

impl AppContext {
    /// Build everything from configuration. Registers the static built-in
    /// collectors and loads DB-defined sources.
    ///
    /// # Errors
    ///
    /// Returns an error when a provider cannot be resolved or the metadata
    /// store cannot be opened.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>> {
        let cache = Self::resolve_cache(&config)?;
        let embedding = Self::resolve_embedding(&config)?;
        let vector_store = Self::resolve_vector_store(&config, embedding.dimensions())?;
        let crypto = Self::resolve_crypto(&config)?;
        let sandbox: Arc<dyn SandboxEngine> = Arc::new(RhaiSandbox::new(SandboxConfig {
            blacklist: config.sandbox.blacklist.clone(),
            allowed_modules: config.sandbox.allowed_modules.clone(),
            timeout: Duration::from_secs(config.sandbox.timeout_secs),
            max_operations: config.sandbox.max_operations,
            max_memory_bytes: config.sandbox.max_memory_bytes,
        })?);

        if let Some(parent) = config.database.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = SqliteDatabase::connect(&config.database.path).await?;
        let trend_repo = db.trend_repository();
        let topic_repo = db.topic_repository();
        let item_repo = db.item_repository();
        let health_repo = db.plugin_health_repository();
        let source_repo = db.collector_source_repository();
        let run_repo = db.pipeline_run_repository();

        let rate_limiter: Arc<dyn RateLimiter> = match config.rate_limiter.backend.as_str() {
            "cache" => Arc::new(CacheRateLimiter::new(Arc::clone(&cache))),
            _ => Arc::new(InMemoryRateLimiter::new()),
        };

        let runtime = Arc::new(CollectorRuntime::new(
            Arc::clone(&health_repo),
            Arc::clone(&source_repo),
            rate_limiter,
            Arc::clone(&crypto),
            Arc::clone(&sandbox),
            RuntimeConfig {
                failure_threshold: config.runtime.failure_threshold,
                success_rate_floor: config.runtime.success_rate_floor,
            },
        ));
        runtime
            .register_static(vec![Arc::new(HackerNewsCollector::new()) as Arc<dyn Collector>])
            .await;
        if let Err(err) = runtime.load_db_defined().await {
            tracing::warn!(error = %err, "loading DB-defined collectors failed");
        }

        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&embedding),
            config.pipeline.clone(),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&runtime),
            Arc::clone(&pipeline),
            Arc::clone(&item_repo),
            Arc::clone(&topic_repo),
            Arc::clone(&trend_repo),
            Arc::clone(&run_repo),
            Arc::clone(&embedding),
            Arc::clone(&vector_store),
            Arc::clone(&cache),
        ));

        let search = Arc::new(SearchService::new(
            Arc::clone(&embedding),
            Arc::clone(&vector_store),
            Arc::clone(&trend_repo),
            Arc::clone(&topic_repo),
            Arc::clone(&cache),
        ));

        Ok(Arc::new(Self {
            config,
            cache,
            embedding,
            vector_store,
            crypto,
            sandbox,
            trend_repo,
            topic_repo,
            item_repo,
            health_repo,
            source_repo,
            run_repo,
            runtime,
            orchestrator,
            search,
        }))
    }

    /// Install a context as the process-wide instance. The first writer
    /// wins; later calls fail instead of silently replacing it.
    ///
    /// # Errors
    ///
    /// Returns a validation error when an instance is already installed.
    pub fn install(context: Arc<Self>) -> Result<()> {
        GLOBAL
            .set(context)
            .map_err(|_| Error::validation("an application context is already installed"))
    }

    /// The process-wide instance, if one was installed.
    #[must_use]
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL.get().cloned()
    }

    fn resolve_cache(config: &AppConfig) -> Result<Arc<dyn CacheProvider>> {
        let mut provider_config = CacheProviderConfig::new(config.cache.provider.clone());
        provider_config.url = config.cache.url.clone();
        provider_config.max_size = config.cache.max_size;
        provider_config.default_ttl_secs = config.cache.default_ttl_secs;
        resolve_cache_provider(&provider_config)
    }

    fn resolve_embedding(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let mut provider_config = EmbeddingProviderConfig::new(config.embedding.provider.clone());
        provider_config.model = config.embedding.model.clone();
        provider_config.base_url = config.embedding.base_url.clone();
        provider_config.api_key = config.embedding.api_key.clone();
        provider_config.dimensions = config.embedding.dimensions;
        resolve_embedding_provider(&provider_config)
    }

    fn resolve_vector_store(
        config: &AppConfig,
        dimensions: usize,
    ) -> Result<Arc<dyn VectorStoreProvider>> {
        let mut provider_config =
            VectorStoreProviderConfig::new(config.vector_store.provider.clone());
        provider_config.url = config.vector_store.url.clone();
        provider_config.api_key = config.vector_store.api_key.clone();
        provider_config.collection = config.vector_store.collection.clone();
        provider_config.dimensions = Some(dimensions);
        resolve_vector_store_provider(&provider_config)
    }

    fn resolve_crypto(config: &AppConfig) -> Result<Arc<dyn CryptoProvider>> {
        match &config.crypto.key {
            Some(key) => Ok(Arc::new(AesGcmCryptoProvider::from_base64(key)?)),
            None => {
                // First-run convenience; envelopes encrypted with this key die
                // with the process.
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                tracing::warn!(
                    "no crypto.key configured; generated an ephemeral key (set crypto.key = \"{}\" to pin it)",
                    base64::engine::general_purpose::STANDARD.encode(key)
                );
                Ok(Arc::new(AesGcmCryptoProvider::new(&key)?))
            }
        }
    }
}

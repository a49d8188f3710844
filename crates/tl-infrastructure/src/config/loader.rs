//! Configuration loader.
//!
//! Resolution order: `config/{env}.toml` (environment from `TRENDLENS_ENV`,
//! default `development`), overlaid with `TRENDLENS_`-prefixed environment
//! variables (`TRENDLENS_SERVER__PORT=9000` overrides `server.port`). A
//! missing file is fine; defaults produce a runnable single-node setup.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use tl_domain::error::{Error, Result};

use super::AppConfig;
use super::validation::validate_config;

const ENV_VAR: &str = "TRENDLENS_ENV";
const ENV_PREFIX: &str = "TRENDLENS_";

/// Configuration loader service.
#[derive(Clone, Default)]
pub struct ConfigLoader {
    /// Optional explicit config file path (overrides environment resolution)
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader following the default resolution order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit configuration file path.
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an explicit path is missing, the
    /// file does not parse, or validation detects invalid values.
    pub fn load(&self) -> Result<AppConfig> {
        let path = match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigMissing(format!(
                        "configuration file not found: {}",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => {
                let env = std::env::var(ENV_VAR).unwrap_or_else(|_| "development".to_owned());
                PathBuf::from(format!("config/{env}.toml"))
            }
        };

        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| Error::config(format!("configuration failed to load: {e}")))?;

        validate_config(&config)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let config = ConfigLoader::new().load();
        let config = config.map_or_else(|e| panic!("load: {e}"), |c| c);
        assert_eq!(config.cache.provider, "moka");
        assert_eq!(config.vector_store.provider, "memory");
        assert!((config.pipeline.dedup_threshold - 0.92).abs() < 1e-6);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().map_or_else(|e| panic!("{e}"), |f| f);
        writeln!(
            file,
            "[server]\nport = 9999\n\n[pipeline]\nmin_cluster_size = 3\n"
        )
        .ok();
        let config = ConfigLoader::new()
            .with_config_path(file.path())
            .load()
            .map_or_else(|e| panic!("load: {e}"), |c| c);
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.pipeline.min_cluster_size, 3);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = ConfigLoader::new()
            .with_config_path("/definitely/not/here.toml")
            .load();
        assert!(matches!(err, Err(Error::ConfigMissing(_))));
    }
}

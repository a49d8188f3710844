//! Collector Registry
//!
//! Built-in collectors register themselves here; the runtime unions this set
//! with DB-defined sources at startup. Entries are keyed by the source type
//! they can instantiate.

use std::sync::Arc;

use crate::entities::{AuthEnvelope, SourceType};
use crate::ports::Collector;

/// Runtime parameters for instantiating a collector from a source definition.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Plugin name; also the source tag on emitted items.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Cron schedule expression.
    pub schedule: String,
    /// Requests-per-hour budget.
    pub rate_limit_per_hour: u32,
    /// Per-run timeout in seconds.
    pub timeout_secs: u64,
    /// Network retry budget per run.
    pub retry_count: u32,
    /// Keep only items matching at least one of these keywords (empty = all).
    pub include_keywords: Vec<String>,
    /// Drop items matching any of these keywords.
    pub exclude_keywords: Vec<String>,
    /// Expected content language, if known.
    pub language: Option<String>,
    /// Decrypted credentials for this run's collector instance.
    pub auth: Option<AuthEnvelope>,
    /// Script body for custom collectors.
    pub code_body: Option<String>,
}

impl CollectorSettings {
    /// Settings with conservative defaults for the given name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            schedule: "0 */15 * * * *".to_owned(),
            rate_limit_per_hour: 60,
            timeout_secs: 30,
            retry_count: 3,
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            language: None,
            auth: None,
            code_body: None,
        }
    }
}

/// Registry entry for a built-in collector family.
pub struct CollectorEntry {
    /// Unique family name (e.g., "rss").
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Source type this family instantiates.
    pub source_type: SourceType,
    /// Constructor from settings.
    pub build: fn(&CollectorSettings) -> std::result::Result<Arc<dyn Collector>, String>,
}

#[linkme::distributed_slice]
/// Distributed slice collecting built-in collector families.
pub static COLLECTORS: [CollectorEntry] = [..];

/// Resolve a collector family for a source type.
///
/// # Errors
///
/// Returns a configuration error when no registered family handles the type
/// or the constructor fails.
pub fn resolve_collector(
    source_type: SourceType,
    settings: &CollectorSettings,
) -> crate::error::Result<Arc<dyn Collector>> {
    for entry in COLLECTORS {
        if entry.source_type == source_type {
            return (entry.build)(settings).map_err(crate::error::Error::config);
        }
    }

    let available: Vec<&str> = COLLECTORS.iter().map(|e| e.name).collect();
    Err(crate::error::Error::config(format!(
        "No collector registered for source type '{source_type}'. Available: {available:?}"
    )))
}

/// List all registered collector families.
pub fn list_collectors() -> Vec<(&'static str, &'static str)> {
    COLLECTORS.iter().map(|e| (e.name, e.description)).collect()
}

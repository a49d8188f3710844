//! Custom collector: user-supplied script executed through the sandbox.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tl_domain::entities::{CollectorMetadata, RawItem, SourceType};
use tl_domain::error::Result;
use tl_domain::ports::{Collector, SandboxContext, SandboxEngine};
use tl_domain::registry::collector::{COLLECTORS, CollectorEntry, CollectorSettings};

use super::{metadata_from_settings, passes_keyword_filters};
use crate::sandbox::RhaiSandbox;

/// Collector wrapping a sandboxed user script.
pub struct ScriptCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    code: String,
    sandbox: Arc<RhaiSandbox>,
}

impl ScriptCollector {
    /// Collector for the given script; the code must already have passed
    /// validation before the source was activated.
    pub fn new(settings: CollectorSettings, code: String, sandbox: Arc<RhaiSandbox>) -> Self {
        let metadata = metadata_from_settings(&settings, "custom");
        Self {
            settings,
            metadata,
            code,
            sandbox,
        }
    }
}

#[async_trait]
impl Collector for ScriptCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let context = SandboxContext {
            source_name: self.settings.name.clone(),
            url: self.settings.url.clone(),
            auth: self.settings.auth.clone(),
            timeout: Duration::from_secs(self.settings.timeout_secs),
        };
        let items = self.sandbox.execute(&self.code, context).await?;
        Ok(items
            .into_iter()
            .filter(|item| passes_keyword_filters(item, &self.settings))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn custom_factory(
    settings: &CollectorSettings,
) -> std::result::Result<Arc<dyn Collector>, String> {
    let code = settings
        .code_body
        .clone()
        .ok_or_else(|| "custom collector requires a code body".to_owned())?;
    let sandbox = Arc::new(
        RhaiSandbox::new(crate::sandbox::SandboxConfig::default()).map_err(|e| e.to_string())?,
    );
    // Activation gate: a script that does not validate never registers.
    sandbox.validate(&code).map_err(|e| e.to_string())?;
    Ok(Arc::new(ScriptCollector::new(
        settings.clone(),
        code,
        sandbox,
    )))
}

#[linkme::distributed_slice(COLLECTORS)]
static CUSTOM_COLLECTOR: CollectorEntry = CollectorEntry {
    name: "custom",
    description: "Sandboxed user-supplied script collector",
    source_type: SourceType::Custom,
    build: custom_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn script_collector_runs_and_filters() {
        let mut settings = CollectorSettings::new("my-script", "https://example.com");
        settings.exclude_keywords = vec!["skip".to_owned()];
        let code = r#"
            fn collect() {
                [
                    #{ source_id: "1", url: "https://example.com/a", title: "keep me" },
                    #{ source_id: "2", url: "https://example.com/b", title: "skip me" },
                ]
            }
        "#;
        let sandbox = Arc::new(RhaiSandbox::default());
        let collector = ScriptCollector::new(settings, code.to_owned(), sandbox);
        let items = collector.collect().await.unwrap_or_default();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "keep me");
    }

    #[test]
    fn factory_rejects_scripts_failing_validation() {
        let mut settings = CollectorSettings::new("bad", "https://example.com");
        settings.code_body = Some("fn collect() { exec(payload); [] }".to_owned());
        assert!(custom_factory(&settings).is_err());
    }
}

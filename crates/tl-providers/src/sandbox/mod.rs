//! Rhai sandbox for user-supplied collector scripts.
//!
//! The contract: a script defines `fn collect()` and returns an array of
//! item maps. The engine exposes a whitelisted function surface (HTTP fetch,
//! HTML-to-text, JSON, time, logging), installs a module resolver that
//! consults the import whitelist, and enforces wall-clock and operation
//! budgets. Validation scans for blacklisted identifiers with word-boundary
//! matching — substring matching would reject harmless identifiers like
//! `follow_redirects` over the `dir` entry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use rhai::{Dynamic, Engine, EvalAltResult, Module, Position, Scope, Shared};
use serde::Deserialize;

use tl_domain::constants::retry::{HTTP_TIMEOUT, SANDBOX_TIMEOUT};
use tl_domain::entities::{EngagementMetrics, RawItem};
use tl_domain::error::{Error, Result};
use tl_domain::ports::{SandboxContext, SandboxEngine};

/// Identifiers rejected by default. Overridable through configuration; the
/// list is policy, not code.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "exec", "eval", "spawn", "system", "shell", "command", "dir", "open", "read_file",
    "write_file", "remove_file", "env", "getenv", "import", "include", "require",
];

/// Sandbox policy knobs.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Blacklisted identifiers, matched with word boundaries.
    pub blacklist: Vec<String>,
    /// Module names the import hook lets through.
    pub allowed_modules: Vec<String>,
    /// Wall-clock budget per invocation.
    pub timeout: Duration,
    /// Operation budget per invocation.
    pub max_operations: u64,
    /// Memory ceiling, mapped onto the engine's string/array/map size limits.
    pub max_memory_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| (*s).to_owned()).collect(),
            allowed_modules: Vec::new(),
            timeout: SANDBOX_TIMEOUT,
            max_operations: 5_000_000,
            max_memory_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Item shape scripts emit; everything beyond the identity fields defaults.
#[derive(Debug, Deserialize)]
struct ScriptItem {
    source_id: String,
    url: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    published_ts: Option<i64>,
    #[serde(default)]
    upvotes: Option<u64>,
    #[serde(default)]
    comments: Option<u64>,
    #[serde(default)]
    shares: Option<u64>,
    #[serde(default)]
    views: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
}

impl ScriptItem {
    fn into_raw(self, source: &str) -> RawItem {
        let published_at = self
            .published_ts
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);
        RawItem {
            source: source.to_owned(),
            source_id: self.source_id,
            url: self.url,
            title: self.title,
            body: self.body,
            author: self.author,
            published_at,
            engagement: EngagementMetrics {
                upvotes: self.upvotes.unwrap_or(0),
                downvotes: 0,
                comments: self.comments.unwrap_or(0),
                shares: self.shares.unwrap_or(0),
                views: self.views.unwrap_or(0),
            },
            language_hint: None,
            tags: self.tags,
        }
    }
}

/// Import hook: anything outside the whitelist is refused.
struct WhitelistModuleResolver {
    allowed: HashSet<String>,
}

impl rhai::ModuleResolver for WhitelistModuleResolver {
    fn resolve(
        &self,
        _engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> std::result::Result<Shared<Module>, Box<EvalAltResult>> {
        // Whitelisted names resolve to empty modules; the real capability
        // surface is the registered function set, not importable modules.
        if self.allowed.contains(path) {
            return Ok(Shared::new(Module::new()));
        }
        Err(EvalAltResult::ErrorModuleNotFound(path.to_owned(), pos).into())
    }
}

/// Rhai-backed [`SandboxEngine`].
pub struct RhaiSandbox {
    config: SandboxConfig,
    blacklist: Vec<(String, Regex)>,
}

impl RhaiSandbox {
    /// Build a sandbox; the blacklist compiles into word-boundary patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a blacklist entry cannot compile.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let mut blacklist = Vec::with_capacity(config.blacklist.len());
        for ident in &config.blacklist {
            let pattern = format!(r"\b{}\b", regex::escape(ident));
            let regex = Regex::new(&pattern)
                .map_err(|e| Error::config(format!("bad blacklist entry '{ident}': {e}")))?;
            blacklist.push((ident.clone(), regex));
        }
        Ok(Self { config, blacklist })
    }

    fn build_engine(&self, context: &SandboxContext, deadline: Instant) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.config.max_operations);

        // Memory ceiling, expressed through the engine's size limits.
        let unit = (self.config.max_memory_bytes / 16).max(1024);
        engine.set_max_string_size(unit);
        engine.set_max_array_size(unit / 8);
        engine.set_max_map_size(unit / 8);
        engine.set_max_call_levels(32);
        engine.set_max_expr_depths(64, 64);

        engine.set_module_resolver(WhitelistModuleResolver {
            allowed: self.config.allowed_modules.iter().cloned().collect(),
        });

        engine.on_progress(move |_| {
            if Instant::now() >= deadline {
                Some("wall-clock budget exceeded".into())
            } else {
                None
            }
        });

        let handle = tokio::runtime::Handle::current();
        let auth = context.auth.clone();
        let client = reqwest::Client::new();
        engine.register_fn(
            "fetch",
            move |url: &str| -> std::result::Result<String, Box<EvalAltResult>> {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("fetch only supports http(s) URLs".into());
                }
                let mut request = client.get(url).timeout(HTTP_TIMEOUT);
                if let Some(auth) = &auth {
                    if let Some(token) = &auth.oauth_token {
                        request = request.bearer_auth(token);
                    } else if let Some(key) = &auth.api_key {
                        request = request.header("x-api-key", key);
                    }
                }
                handle
                    .block_on(async { request.send().await?.text().await })
                    .map_err(|e| format!("fetch failed: {e}").into())
            },
        );

        engine.register_fn("html_to_text", |html: &str| -> String {
            let without_tags = html
                .split('<')
                .enumerate()
                .map(|(i, part)| {
                    if i == 0 {
                        part.to_owned()
                    } else {
                        part.split_once('>').map_or(String::new(), |(_, rest)| rest.to_owned())
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            html_escape::decode_html_entities(&without_tags)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        });

        engine.register_fn("now_ts", || -> i64 { Utc::now().timestamp() });

        let source_for_log = context.source_name.clone();
        engine.register_fn("log", move |message: &str| {
            tracing::debug!(plugin = %source_for_log, message, "sandbox log");
        });

        engine
    }

    fn map_engine_error(error: &EvalAltResult) -> Error {
        match error {
            EvalAltResult::ErrorTerminated(..) => {
                Error::resource_exhausted("sandbox wall-clock budget exceeded")
            }
            EvalAltResult::ErrorTooManyOperations(..) => {
                Error::resource_exhausted("sandbox operation budget exceeded")
            }
            EvalAltResult::ErrorDataTooLarge(..) => {
                Error::resource_exhausted("sandbox memory ceiling exceeded")
            }
            EvalAltResult::ErrorModuleNotFound(module, ..) => {
                Error::sandbox_security(format!("import of non-whitelisted module '{module}'"))
            }
            EvalAltResult::ErrorFunctionNotFound(name, ..) if name.starts_with("collect") => {
                Error::validation("script must define a collect() entry point")
            }
            other => Error::validation(format!("script failed: {other}")),
        }
    }
}

#[async_trait]
impl SandboxEngine for RhaiSandbox {
    fn validate(&self, code: &str) -> Result<()> {
        for (ident, regex) in &self.blacklist {
            if regex.is_match(code) {
                return Err(Error::sandbox_security(format!(
                    "script references blacklisted identifier '{ident}'"
                )));
            }
        }

        // Syntax gate; a throwaway engine is enough for compilation.
        let engine = Engine::new_raw();
        engine
            .compile(code)
            .map_err(|e| Error::validation(format!("script does not parse: {e}")))?;
        Ok(())
    }

    async fn execute(&self, code: &str, context: SandboxContext) -> Result<Vec<RawItem>> {
        self.validate(code)?;

        let timeout = self.config.timeout.min(context.timeout);
        let deadline = Instant::now() + timeout;
        let engine = self.build_engine(&context, deadline);
        let code = code.to_owned();
        let source_name = context.source_name.clone();
        let url = context.url.clone();

        let evaluated = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || -> Result<Vec<RawItem>> {
                let ast = engine
                    .compile(&code)
                    .map_err(|e| Error::validation(format!("script does not parse: {e}")))?;

                let mut scope = Scope::new();
                scope.push_constant("URL", url);

                let result: Dynamic = engine
                    .call_fn(&mut scope, &ast, "collect", ())
                    .map_err(|e| Self::map_engine_error(&e))?;

                let array = result.into_array().map_err(|actual| {
                    Error::validation(format!("collect() must return an array, got {actual}"))
                })?;

                let mut items = Vec::with_capacity(array.len());
                for value in array {
                    let item: ScriptItem = rhai::serde::from_dynamic(&value)
                        .map_err(|e| Error::validation(format!("bad item from script: {e}")))?;
                    items.push(item.into_raw(&source_name));
                }
                Ok(items)
            }),
        )
        .await
        .map_err(|_| Error::resource_exhausted("sandbox wall-clock budget exceeded"))?
        .map_err(|e| Error::internal(format!("sandbox thread failed: {e}")))??;

        Ok(evaluated)
    }
}

impl Default for RhaiSandbox {
    fn default() -> Self {
        // The default config always compiles; fall back loudly if policy
        // configuration broke it.
        Self::new(SandboxConfig::default()).unwrap_or_else(|_| Self {
            config: SandboxConfig::default(),
            blacklist: Vec::new(),
        })
    }
}

/// Convenience constructor used by the custom collector family.
pub fn sandbox_from_policy(blacklist: Vec<String>, timeout: Duration) -> Result<Arc<RhaiSandbox>> {
    let config = SandboxConfig {
        blacklist,
        timeout,
        ..Default::default()
    };
    Ok(Arc::new(RhaiSandbox::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> RhaiSandbox {
        RhaiSandbox::default()
    }

    fn context() -> SandboxContext {
        SandboxContext {
            source_name: "custom-test".to_owned(),
            url: "https://example.com/feed".to_owned(),
            auth: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn word_boundary_blacklist_passes_follow_redirects() {
        // `follow_redirects` contains `dir` as a substring; the word-boundary
        // scan must not trip on it.
        let code = r#"
            fn collect() {
                let follow_redirects = true;
                []
            }
        "#;
        assert!(sandbox().validate(code).is_ok());
    }

    #[test]
    fn word_boundary_blacklist_rejects_dir() {
        let code = r#"
            fn collect() {
                let listing = dir("/etc");
                []
            }
        "#;
        let err = sandbox().validate(code);
        assert!(matches!(err, Err(Error::SandboxSecurity { .. })));
    }

    #[test]
    fn exec_reference_is_rejected_before_any_run() {
        // S5: a body containing exec() never activates.
        let code = "fn collect() { exec(payload); [] }";
        let err = sandbox().validate(code);
        assert!(matches!(err, Err(Error::SandboxSecurity { .. })));
    }

    #[test]
    fn syntax_errors_are_validation_failures() {
        let err = sandbox().validate("fn collect( {");
        assert!(matches!(err, Err(Error::Validation { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn script_items_come_back_as_raw_items() {
        let code = r#"
            fn collect() {
                [
                    #{ source_id: "1", url: "https://example.com/a", title: "Hello world", upvotes: 3 },
                    #{ source_id: "2", url: "https://example.com/b", title: "Second", tags: ["tech"] },
                ]
            }
        "#;
        let items = sandbox()
            .execute(code, context())
            .await
            .unwrap_or_default();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "custom-test");
        assert_eq!(items[0].engagement.upvotes, 3);
        assert_eq!(items[1].tags, vec!["tech".to_owned()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_of_unknown_module_is_a_security_error() {
        let code = r#"
            import "filesystem" as fs;
            fn collect() { [] }
        "#;
        let err = sandbox().execute(code, context()).await;
        assert!(matches!(err, Err(Error::SandboxSecurity { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runaway_scripts_exhaust_their_budget() {
        let code = r#"
            fn collect() {
                let x = 0;
                loop { x += 1; }
            }
        "#;
        let mut config = SandboxConfig::default();
        config.timeout = Duration::from_millis(200);
        config.max_operations = 100_000;
        let sandbox = RhaiSandbox::new(config).map_or_else(|_| panic!("sandbox"), |s| s);
        let err = sandbox.execute(code, context()).await;
        assert!(matches!(err, Err(Error::ResourceExhausted { .. })));
    }
}

//! Built-in collectors.
//!
//! Each family registers into the collector registry keyed by the source
//! type it instantiates; the Hacker News collector is also constructible
//! directly for static registration at startup.

#[cfg(feature = "sandbox-rhai")]
mod custom;
mod hackernews;
mod reddit;
mod rss;
mod twitter;
mod youtube;

#[cfg(feature = "sandbox-rhai")]
pub use custom::ScriptCollector;
pub use hackernews::HackerNewsCollector;
pub use reddit::RedditCollector;
pub use rss::RssCollector;
pub use twitter::TwitterCollector;
pub use youtube::YoutubeCollector;

use tl_domain::entities::{CollectorMetadata, RawItem};
use tl_domain::registry::collector::CollectorSettings;

/// Keyword gate shared by every collector: an item must match at least one
/// include keyword (when any are configured) and none of the excludes.
/// Matching is case-insensitive over title and body.
pub(crate) fn passes_keyword_filters(item: &RawItem, settings: &CollectorSettings) -> bool {
    let haystack = match &item.body {
        Some(body) => format!("{} {}", item.title, body).to_lowercase(),
        None => item.title.to_lowercase(),
    };
    if !settings.include_keywords.is_empty()
        && !settings
            .include_keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase()))
    {
        return false;
    }
    !settings
        .exclude_keywords
        .iter()
        .any(|k| haystack.contains(&k.to_lowercase()))
}

/// Collector metadata derived from source settings.
pub(crate) fn metadata_from_settings(
    settings: &CollectorSettings,
    version: &str,
) -> CollectorMetadata {
    CollectorMetadata {
        name: settings.name.clone(),
        version: version.to_owned(),
        source: settings.name.clone(),
        schedule: settings.schedule.clone(),
        rate_limit_per_hour: settings.rate_limit_per_hour,
        timeout_secs: settings.timeout_secs,
        retry_count: settings.retry_count,
        enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude_keywords_gate_items() {
        let mut settings = CollectorSettings::new("t", "https://example.com");
        settings.include_keywords = vec!["rust".to_owned()];
        settings.exclude_keywords = vec!["gamedev".to_owned()];

        let mut item = RawItem::new("t", "1", "https://example.com/a", "Rust 2.0 released");
        assert!(passes_keyword_filters(&item, &settings));

        item.title = "Rust gamedev monthly".to_owned();
        assert!(!passes_keyword_filters(&item, &settings));

        item.title = "Go 2.0 released".to_owned();
        assert!(!passes_keyword_filters(&item, &settings));
    }
}

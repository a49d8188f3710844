//! RSS/Atom feed collector.

use std::sync::Arc;

use async_trait::async_trait;

use tl_domain::constants::retry::HTTP_TIMEOUT;
use tl_domain::entities::{CollectorMetadata, RawItem, SourceType};
use tl_domain::error::{Error, Result};
use tl_domain::ports::Collector;
use tl_domain::registry::collector::{COLLECTORS, CollectorEntry, CollectorSettings};

use super::{metadata_from_settings, passes_keyword_filters};

/// Collector over one RSS or Atom feed.
pub struct RssCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    client: reqwest::Client,
}

impl RssCollector {
    /// Collector for the feed in `settings.url`.
    #[must_use]
    pub fn new(settings: CollectorSettings) -> Self {
        let metadata = metadata_from_settings(&settings, "1.0.0");
        Self {
            settings,
            metadata,
            client: reqwest::Client::new(),
        }
    }

    fn entry_to_item(&self, entry: &feed_rs::model::Entry) -> Option<RawItem> {
        let title = entry.title.as_ref().map(|t| t.content.clone())?;
        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let published_at = entry
            .published
            .or(entry.updated)
            .unwrap_or_else(chrono::Utc::now);

        let mut item = RawItem::new(self.settings.name.clone(), entry.id.clone(), url, title);
        item.published_at = published_at;
        item.body = entry.summary.as_ref().map(|s| s.content.clone());
        item.author = entry.authors.first().map(|a| a.name.clone());
        item.language_hint = self.settings.language.clone();
        item.tags = entry.categories.iter().map(|c| c.term.clone()).collect();
        Some(item)
    }
}

#[async_trait]
impl Collector for RssCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let response = self
            .client
            .get(&self.settings.url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("feed fetch failed", e))?;
        if !response.status().is_success() {
            return Err(Error::transient(format!(
                "feed returned HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transient_with_source("feed body read failed", e))?;

        let feed = feed_rs::parser::parse(bytes.as_ref())
            .map_err(|e| Error::validation(format!("feed parse failed: {e}")))?;

        Ok(feed
            .entries
            .iter()
            .filter_map(|entry| self.entry_to_item(entry))
            .filter(|item| passes_keyword_filters(item, &self.settings))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn rss_factory(
    settings: &CollectorSettings,
) -> std::result::Result<Arc<dyn Collector>, String> {
    if settings.url.is_empty() {
        return Err("rss collector requires a feed URL".to_owned());
    }
    Ok(Arc::new(RssCollector::new(settings.clone())))
}

#[linkme::distributed_slice(COLLECTORS)]
static RSS_COLLECTOR: CollectorEntry = CollectorEntry {
    name: "rss",
    description: "RSS/Atom feed collector",
    source_type: SourceType::Rss,
    build: rss_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_feed() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
                <title>Example</title>
                <item>
                    <guid>item-1</guid>
                    <title>Apple unveils M5</title>
                    <link>https://example.com/m5</link>
                    <description>The new chip.</description>
                </item>
            </channel></rss>"#;
        let feed = feed_rs::parser::parse(xml.as_bytes()).map_or_else(|_| panic!("parse"), |f| f);
        let collector = RssCollector::new(CollectorSettings::new("demo-rss", "https://example.com"));
        let items: Vec<RawItem> = feed
            .entries
            .iter()
            .filter_map(|e| collector.entry_to_item(e))
            .collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Apple unveils M5");
        assert_eq!(items[0].url, "https://example.com/m5");
        assert_eq!(items[0].source, "demo-rss");
    }
}

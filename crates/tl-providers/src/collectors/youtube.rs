//! YouTube search collector (Data API v3).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use tl_domain::constants::retry::HTTP_TIMEOUT;
use tl_domain::entities::{CollectorMetadata, RawItem, SourceType};
use tl_domain::error::{Error, Result};
use tl_domain::ports::Collector;
use tl_domain::registry::collector::{COLLECTORS, CollectorEntry, CollectorSettings};

use super::{metadata_from_settings, passes_keyword_filters};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct VideoId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

/// Collector over the Data API v3 search endpoint. `settings.url` carries the
/// query URL without the key; the key comes from the decrypted envelope.
pub struct YoutubeCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    client: reqwest::Client,
}

impl YoutubeCollector {
    /// Collector for the search in `settings.url`.
    #[must_use]
    pub fn new(settings: CollectorSettings) -> Self {
        let metadata = metadata_from_settings(&settings, "1.0.0");
        Self {
            settings,
            metadata,
            client: reqwest::Client::new(),
        }
    }

    fn video_to_item(&self, item: SearchItem) -> Option<RawItem> {
        let video_id = item.id.video_id?;
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let mut raw = RawItem::new(self.settings.name.clone(), video_id, url, item.snippet.title);
        raw.body = item.snippet.description.filter(|d| !d.is_empty());
        raw.author = item.snippet.channel_title;
        raw.published_at = item
            .snippet
            .published_at
            .as_deref()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        raw.language_hint = self.settings.language.clone();
        Some(raw)
    }
}

#[async_trait]
impl Collector for YoutubeCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let api_key = self
            .settings
            .auth
            .as_ref()
            .and_then(|a| a.api_key.clone())
            .ok_or_else(|| Error::auth_required("youtube collector needs an API key"))?;

        let response = self
            .client
            .get(&self.settings.url)
            .query(&[("key", api_key.as_str())])
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("youtube fetch failed", e))?;

        let status = response.status();
        if status.as_u16() == 403 {
            return Err(Error::forbidden("youtube quota or key rejected"));
        }
        if !status.is_success() {
            return Err(Error::transient(format!("youtube returned HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::validation(format!("youtube parse failed: {e}")))?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| self.video_to_item(item))
            .filter(|item| passes_keyword_filters(item, &self.settings))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn youtube_factory(
    settings: &CollectorSettings,
) -> std::result::Result<Arc<dyn Collector>, String> {
    if settings.url.is_empty() {
        return Err("youtube collector requires a search URL".to_owned());
    }
    Ok(Arc::new(YoutubeCollector::new(settings.clone())))
}

#[linkme::distributed_slice(COLLECTORS)]
static YOUTUBE_COLLECTOR: CollectorEntry = CollectorEntry {
    name: "youtube",
    description: "YouTube Data API search collector",
    source_type: SourceType::Youtube,
    build: youtube_factory,
};

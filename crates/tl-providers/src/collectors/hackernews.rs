//! Hacker News collector over the public Firebase API.

use async_trait::async_trait;
use serde::Deserialize;

use tl_domain::constants::retry::HTTP_TIMEOUT;
use tl_domain::entities::{CollectorMetadata, EngagementMetrics, RawItem};
use tl_domain::error::{Error, Result};
use tl_domain::ports::Collector;
use tl_domain::registry::collector::CollectorSettings;

use super::{metadata_from_settings, passes_keyword_filters};

const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
const DEFAULT_STORY_LIMIT: usize = 30;

#[derive(Debug, Deserialize)]
struct Story {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: Option<u64>,
    #[serde(default)]
    descendants: Option<u64>,
    #[serde(default)]
    by: Option<String>,
    #[serde(default)]
    time: Option<i64>,
}

/// Collector for the Hacker News front page.
pub struct HackerNewsCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    client: reqwest::Client,
    base_url: String,
    story_limit: usize,
}

impl HackerNewsCollector {
    /// Front-page collector with default settings.
    #[must_use]
    pub fn new() -> Self {
        let mut settings = CollectorSettings::new("hackernews", DEFAULT_BASE_URL);
        settings.language = Some("en".to_owned());
        Self::with_settings(settings, DEFAULT_STORY_LIMIT)
    }

    /// Collector with explicit settings, for DB-defined installs and tests.
    #[must_use]
    pub fn with_settings(settings: CollectorSettings, story_limit: usize) -> Self {
        let metadata = metadata_from_settings(&settings, "1.0.0");
        let base_url = settings.url.clone();
        Self {
            settings,
            metadata,
            client: reqwest::Client::new(),
            base_url,
            story_limit,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("hackernews fetch failed", e))?;
        if !response.status().is_success() {
            return Err(Error::transient(format!(
                "hackernews returned HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::validation(format!("hackernews parse failed: {e}")))
    }

    fn story_to_item(&self, story: Story) -> Option<RawItem> {
        let title = story.title?;
        let hn_url = format!("https://news.ycombinator.com/item?id={}", story.id);
        let url = story.url.unwrap_or_else(|| hn_url.clone());

        let mut item = RawItem::new(
            self.settings.name.clone(),
            story.id.to_string(),
            url,
            title,
        );
        item.author = story.by;
        item.published_at = story
            .time
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(chrono::Utc::now);
        item.engagement = EngagementMetrics {
            upvotes: story.score.unwrap_or(0),
            downvotes: 0,
            comments: story.descendants.unwrap_or(0),
            shares: 0,
            views: 0,
        };
        item.language_hint = self.settings.language.clone();
        Some(item)
    }
}

impl Default for HackerNewsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for HackerNewsCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let ids: Vec<u64> = self.fetch_json("/topstories.json").await?;
        let mut items = Vec::new();
        for id in ids.into_iter().take(self.story_limit) {
            match self.fetch_json::<Option<Story>>(&format!("/item/{id}.json")).await {
                Ok(Some(story)) => {
                    if let Some(item) = self.story_to_item(story)
                        && passes_keyword_filters(&item, &self.settings)
                    {
                        items.push(item);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    // One dead story must not sink the whole run.
                    tracing::debug!(id, error = %err, "skipping story");
                }
            }
        }
        Ok(items)
    }
}

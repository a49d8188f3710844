//! Reddit listing collector over the public JSON endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use tl_domain::constants::retry::HTTP_TIMEOUT;
use tl_domain::entities::{CollectorMetadata, EngagementMetrics, RawItem, SourceType};
use tl_domain::error::{Error, Result};
use tl_domain::ports::Collector;
use tl_domain::registry::collector::{COLLECTORS, CollectorEntry, CollectorSettings};

use super::{metadata_from_settings, passes_keyword_filters};

const USER_AGENT: &str = "trendlens/0.3 (trend aggregation)";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    url: Option<String>,
    permalink: String,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    num_comments: Option<u64>,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    subreddit: Option<String>,
}

/// Collector over one Reddit listing URL (e.g. a subreddit's `hot.json`).
pub struct RedditCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    client: reqwest::Client,
}

impl RedditCollector {
    /// Collector for the listing in `settings.url`.
    #[must_use]
    pub fn new(settings: CollectorSettings) -> Self {
        let metadata = metadata_from_settings(&settings, "1.0.0");
        Self {
            settings,
            metadata,
            client: reqwest::Client::new(),
        }
    }

    fn post_to_item(&self, post: Post) -> RawItem {
        let url = post
            .url
            .filter(|u| u.starts_with("http"))
            .unwrap_or_else(|| format!("https://www.reddit.com{}", post.permalink));

        let mut item = RawItem::new(self.settings.name.clone(), post.id, url, post.title);
        item.body = post.selftext.filter(|s| !s.is_empty());
        item.author = post.author;
        item.published_at = post
            .created_utc
            .and_then(|ts| chrono::DateTime::from_timestamp(ts as i64, 0))
            .unwrap_or_else(chrono::Utc::now);
        item.engagement = EngagementMetrics {
            upvotes: post.score.unwrap_or(0).max(0) as u64,
            downvotes: 0,
            comments: post.num_comments.unwrap_or(0),
            shares: 0,
            views: 0,
        };
        item.language_hint = self.settings.language.clone();
        item.tags = post.subreddit.into_iter().collect();
        item
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let response = self
            .client
            .get(&self.settings.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("reddit fetch failed", e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(match retry_after {
                Some(after) => Error::rate_limited_after("reddit rate limit", after),
                None => Error::rate_limited("reddit rate limit"),
            });
        }
        if !status.is_success() {
            return Err(Error::transient(format!("reddit returned HTTP {status}")));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| Error::validation(format!("reddit parse failed: {e}")))?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| self.post_to_item(child.data))
            .filter(|item| passes_keyword_filters(item, &self.settings))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn reddit_factory(
    settings: &CollectorSettings,
) -> std::result::Result<Arc<dyn Collector>, String> {
    if settings.url.is_empty() {
        return Err("reddit collector requires a listing URL".to_owned());
    }
    Ok(Arc::new(RedditCollector::new(settings.clone())))
}

#[linkme::distributed_slice(COLLECTORS)]
static REDDIT_COLLECTOR: CollectorEntry = CollectorEntry {
    name: "reddit",
    description: "Reddit listing collector",
    source_type: SourceType::Reddit,
    build: reddit_factory,
};

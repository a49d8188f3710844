//! Twitter/X recent-search collector (API v2).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use tl_domain::constants::retry::HTTP_TIMEOUT;
use tl_domain::entities::{CollectorMetadata, EngagementMetrics, RawItem, SourceType};
use tl_domain::error::{Error, Result};
use tl_domain::ports::Collector;
use tl_domain::registry::collector::{COLLECTORS, CollectorEntry, CollectorSettings};

use super::{metadata_from_settings, passes_keyword_filters};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    impression_count: u64,
}

/// Collector over the v2 recent-search endpoint. `settings.url` carries the
/// full query URL; auth comes from the decrypted envelope.
pub struct TwitterCollector {
    settings: CollectorSettings,
    metadata: CollectorMetadata,
    client: reqwest::Client,
}

impl TwitterCollector {
    /// Collector for the query in `settings.url`.
    #[must_use]
    pub fn new(settings: CollectorSettings) -> Self {
        let metadata = metadata_from_settings(&settings, "1.0.0");
        Self {
            settings,
            metadata,
            client: reqwest::Client::new(),
        }
    }

    fn tweet_to_item(&self, tweet: Tweet) -> RawItem {
        let url = format!("https://x.com/i/status/{}", tweet.id);
        let mut item = RawItem::new(self.settings.name.clone(), tweet.id, url, tweet.text);
        item.author = tweet.author_id;
        item.published_at = tweet
            .created_at
            .as_deref()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        if let Some(metrics) = tweet.public_metrics {
            item.engagement = EngagementMetrics {
                upvotes: metrics.like_count,
                downvotes: 0,
                comments: metrics.reply_count,
                shares: metrics.retweet_count,
                views: metrics.impression_count,
            };
        }
        item.language_hint = self.settings.language.clone();
        item
    }
}

#[async_trait]
impl Collector for TwitterCollector {
    fn metadata(&self) -> &CollectorMetadata {
        &self.metadata
    }

    async fn collect(&self) -> Result<Vec<RawItem>> {
        let token = self
            .settings
            .auth
            .as_ref()
            .and_then(|a| a.oauth_token.clone())
            .ok_or_else(|| Error::auth_required("twitter collector needs a bearer token"))?;

        let response = self
            .client
            .get(&self.settings.url)
            .bearer_auth(token)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::transient_with_source("twitter fetch failed", e))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::forbidden(format!("twitter returned HTTP {status}")));
        }
        if status.as_u16() == 429 {
            return Err(Error::rate_limited("twitter rate limit"));
        }
        if !status.is_success() {
            return Err(Error::transient(format!("twitter returned HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::validation(format!("twitter parse failed: {e}")))?;

        Ok(body
            .data
            .into_iter()
            .map(|tweet| self.tweet_to_item(tweet))
            .filter(|item| passes_keyword_filters(item, &self.settings))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

fn twitter_factory(
    settings: &CollectorSettings,
) -> std::result::Result<Arc<dyn Collector>, String> {
    if settings.url.is_empty() {
        return Err("twitter collector requires a search URL".to_owned());
    }
    Ok(Arc::new(TwitterCollector::new(settings.clone())))
}

#[linkme::distributed_slice(COLLECTORS)]
static TWITTER_COLLECTOR: CollectorEntry = CollectorEntry {
    name: "twitter",
    description: "Twitter/X recent-search collector",
    source_type: SourceType::Twitter,
    build: twitter_factory,
};

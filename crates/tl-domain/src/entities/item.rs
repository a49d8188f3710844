//! Raw and processed item definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engagement counters reported by a source for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Upvotes / likes / points.
    pub upvotes: u64,
    /// Downvotes, where the source exposes them.
    pub downvotes: u64,
    /// Comment count.
    pub comments: u64,
    /// Share / repost count.
    pub shares: u64,
    /// View count, where the source exposes it.
    pub views: u64,
}

impl EngagementMetrics {
    /// Aggregate engagement used for ranking and dedup tie-breaks.
    ///
    /// Views are damped so view-heavy sources do not drown vote-driven ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.upvotes + self.comments + self.shares + self.views / 100
    }

    /// Component-wise sum, used when aggregating a topic.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            upvotes: self.upvotes + other.upvotes,
            downvotes: self.downvotes + other.downvotes,
            comments: self.comments + other.comments,
            shares: self.shares + other.shares,
            views: self.views + other.views,
        }
    }
}

/// Editorial category assigned during normalization.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    /// Technology and software.
    Technology,
    /// Business and markets.
    Business,
    /// Science and research.
    Science,
    /// Entertainment and culture.
    Entertainment,
    /// Sports.
    Sports,
    /// Politics and policy.
    Politics,
    /// Health and medicine.
    Health,
    /// Everything else.
    #[default]
    General,
}

/// An un-normalized observation emitted by a collector.
///
/// Identity is the `(source, source_id)` pair; the repository enforces its
/// uniqueness. Raw items are created transiently and either become a
/// [`ProcessedItem`] or are dropped by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Source tag (collector name, e.g. "hackernews").
    pub source: String,
    /// Source-local identifier.
    pub source_id: String,
    /// Canonical URL of the item.
    pub url: String,
    /// Title as published.
    pub title: String,
    /// Optional body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Optional author handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
    /// Engagement counters at collection time.
    #[serde(default)]
    pub engagement: EngagementMetrics,
    /// Source-provided language hint (BCP-47 primary tag), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// Free-form tags from the source.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawItem {
    /// Create a raw item with the mandatory fields; everything else defaults.
    pub fn new(
        source: impl Into<String>,
        source_id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_id: source_id.into(),
            url: url.into(),
            title: title.into(),
            body: None,
            author: None,
            published_at: Utc::now(),
            engagement: EngagementMetrics::default(),
            language_hint: None,
            tags: Vec::new(),
        }
    }

    /// The `(source, source_id)` identity pair.
    #[must_use]
    pub fn identity(&self) -> (&str, &str) {
        (&self.source, &self.source_id)
    }
}

/// A normalized, language-tagged item.
///
/// Invariants: `language` is a BCP-47 primary tag (`"und"` when detection was
/// not possible); `normalized_title` is NFC, whitespace-collapsed,
/// HTML-stripped and lower-cased for comparison, while `title` preserves the
/// display form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedItem {
    /// Stable identity.
    pub id: Uuid,
    /// Source tag, carried over from the raw item.
    pub source: String,
    /// Source-local identifier.
    pub source_id: String,
    /// Canonical URL.
    pub url: String,
    /// Display title as published.
    pub title: String,
    /// Comparison form of the title.
    pub normalized_title: String,
    /// Cleaned body text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Optional author handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
    /// Engagement counters at collection time.
    pub engagement: EngagementMetrics,
    /// Editorial category.
    pub category: Category,
    /// Source-provided language hint (BCP-47 primary tag), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// Detected language, BCP-47 primary tag.
    pub language: String,
    /// Detection confidence in [0, 1].
    pub language_confidence: f64,
    /// Extracted keyword tokens.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Optional sentiment score in [-1, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    /// Free-form tags from the source.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the pipeline produced this item.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedItem {
    /// Whether the detected language participates in cross-language clustering.
    #[must_use]
    pub fn has_known_language(&self) -> bool {
        self.language != "und"
    }

    /// Text used for embedding: normalized title plus leading body.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        match &self.body {
            Some(body) => {
                let lead: String = body.chars().take(512).collect();
                format!("{} {}", self.normalized_title, lead)
            }
            None => self.normalized_title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_total_damps_views() {
        let m = EngagementMetrics {
            upvotes: 10,
            downvotes: 3,
            comments: 5,
            shares: 2,
            views: 1000,
        };
        assert_eq!(m.total(), 10 + 5 + 2 + 10);
    }

    #[test]
    fn category_round_trips_through_strings() {
        use std::str::FromStr;
        for c in [Category::Technology, Category::General, Category::Health] {
            assert_eq!(Category::from_str(&c.to_string()), Ok(c));
        }
    }
}

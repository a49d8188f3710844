//! Topic entity: a cluster of related processed items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{Category, EngagementMetrics};

/// A cluster of [`super::ProcessedItem`]s judged to be about the same story.
///
/// Invariants: `item_count` equals the junction-row count for this topic;
/// `first_seen <= last_updated`; a topic holds at least `min_cluster_size`
/// items. Once persisted a topic is never reassigned to a different cluster;
/// later runs create new topics and continuity is carried by embedding
/// similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Stable identity.
    pub id: Uuid,
    /// Representative title (highest-engagement member).
    pub title: String,
    /// Short summary assembled from top members.
    pub summary: String,
    /// Editorial category.
    pub category: Category,
    /// Cluster-local TF-IDF keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Number of associated items.
    pub item_count: u64,
    /// Aggregate engagement across members.
    pub engagement: EngagementMetrics,
    /// Highest velocity ever observed for this topic's lineage. Carried
    /// forward on upsert (`max(existing, current)`) so the ranker can tell a
    /// declining story from a steady one.
    #[serde(default)]
    pub max_velocity: f64,
    /// When the earliest member was published.
    pub first_seen: DateTime<Utc>,
    /// When the newest member was published or the topic last changed.
    pub last_updated: DateTime<Utc>,
    /// Majority language of the members.
    pub language: String,
    /// Member item ids, used to create junction rows at persistence time.
    #[serde(default)]
    pub item_ids: Vec<Uuid>,
}

impl Topic {
    /// Engagement accrued per hour over the topic's observed life.
    ///
    /// A topic younger than one hour is treated as one hour old so a burst of
    /// early engagement does not divide by a near-zero age.
    #[must_use]
    pub fn velocity(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.first_seen).num_seconds() as f64 / 3600.0;
        let age_hours = age_hours.max(1.0);
        self.engagement.total() as f64 / age_hours
    }

    /// Age in hours at `now`.
    #[must_use]
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.first_seen).num_seconds() as f64 / 3600.0).max(0.0)
    }

    /// Max-observed velocity: the persisted lineage maximum, or the current
    /// velocity when that is higher (the current observation counts too).
    #[must_use]
    pub fn observed_max_velocity(&self, now: DateTime<Utc>) -> f64 {
        self.max_velocity.max(self.velocity(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn topic(total_upvotes: u64, age_hours: i64) -> Topic {
        let now = Utc::now();
        Topic {
            id: Uuid::new_v4(),
            title: "t".to_owned(),
            summary: String::new(),
            category: Category::General,
            keywords: vec![],
            item_count: 2,
            engagement: EngagementMetrics {
                upvotes: total_upvotes,
                downvotes: 0,
                comments: 0,
                shares: 0,
                views: 0,
            },
            max_velocity: 0.0,
            first_seen: now - Duration::hours(age_hours),
            last_updated: now,
            language: "en".to_owned(),
            item_ids: vec![],
        }
    }

    #[test]
    fn velocity_is_engagement_per_hour() {
        let t = topic(240, 24);
        let v = t.velocity(Utc::now());
        assert!((v - 10.0).abs() < 0.1, "got {v}");
    }

    #[test]
    fn velocity_clamps_young_topics_to_one_hour() {
        let t = topic(500, 0);
        let v = t.velocity(Utc::now());
        assert!(v <= 500.0 + f64::EPSILON);
    }
}

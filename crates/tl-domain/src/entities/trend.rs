//! Trend entity: a ranked, scored projection of a topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::Category;

/// Lifecycle label assigned by the ranker from velocity and age.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum TrendState {
    /// Younger than a day and accelerating.
    Emerging,
    /// Velocity above the absolute viral threshold.
    Viral,
    /// At least a day old with steady velocity.
    Sustained,
    /// Velocity fell below half of its observed peak.
    Declining,
}

/// A ranked, scored projection of a [`super::Topic`] at a point in time.
///
/// Invariants: `rank` is unique within one ranking run and category, forming
/// a contiguous prefix of positive integers; `score` is monotone in its
/// inputs and bounded to [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    /// Stable identity.
    pub id: Uuid,
    /// The topic this trend projects.
    pub topic_id: Uuid,
    /// 1-based rank within the ranking run and category.
    pub rank: u32,
    /// Composite score in [0, 100].
    pub score: f64,
    /// Lifecycle state.
    pub state: TrendState,
    /// Engagement units accrued per hour.
    pub velocity: f64,
    /// Distinct source tags contributing items.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Majority language of the underlying topic.
    pub language: String,
    /// Denormalized topic title for efficient reads.
    pub title: String,
    /// Denormalized topic summary for efficient reads.
    pub summary: String,
    /// Editorial category, denormalized for rank scoping.
    pub category: Category,
    /// When the ranking run produced this trend.
    pub created_at: DateTime<Utc>,
}

impl Trend {
    /// Key of this trend's vector in the vector store.
    #[must_use]
    pub fn vector_key(&self) -> String {
        format!("trend:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_round_trips_through_strings() {
        for s in [
            TrendState::Emerging,
            TrendState::Viral,
            TrendState::Sustained,
            TrendState::Declining,
        ] {
            assert_eq!(TrendState::from_str(&s.to_string()), Ok(s));
        }
    }
}

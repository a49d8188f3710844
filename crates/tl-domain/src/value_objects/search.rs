//! Search and vector-index value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Category, TrendState};

use super::Embedding;

/// What kind of entity a vector belongs to.
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
pub enum EntityKind {
    /// A ranked trend.
    Trend,
    /// A processed item.
    Item,
}

/// Payload stored alongside every vector; only these fields are filterable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    /// Owning entity kind.
    pub entity: EntityKind,
    /// Editorial category.
    pub category: Category,
    /// Trend lifecycle state; absent for items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TrendState>,
    /// BCP-47 primary language tag.
    pub language: String,
    /// Contributing source tags.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Composite score at indexing time.
    pub score: f64,
    /// Publication or ranking timestamp.
    pub published_at: DateTime<Utc>,
}

/// A vector with its key and payload, as stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Key of the form `"trend:{uuid}"` or `"item:{uuid}"`.
    pub id: String,
    /// The embedding.
    pub embedding: Embedding,
    /// Filterable payload.
    pub payload: VectorPayload,
}

/// Equality and set-membership filters over [`VectorPayload`] fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFilter {
    /// Restrict to one entity kind.
    pub entity: Option<EntityKind>,
    /// Restrict to one category.
    pub category: Option<Category>,
    /// Restrict to any of these states.
    pub states: Option<Vec<TrendState>>,
    /// Restrict to one language.
    pub language: Option<String>,
    /// Keep records sharing at least one of these sources.
    pub sources_any: Option<Vec<String>>,
    /// Keep records with score >= this.
    pub min_score: Option<f64>,
    /// Keep records published at or after this instant.
    pub published_after: Option<DateTime<Utc>>,
    /// Keep records published at or before this instant.
    pub published_before: Option<DateTime<Utc>>,
}

impl VectorFilter {
    /// Whether `payload` satisfies every populated clause.
    #[must_use]
    pub fn matches(&self, payload: &VectorPayload) -> bool {
        if let Some(entity) = self.entity
            && payload.entity != entity
        {
            return false;
        }
        if let Some(category) = self.category
            && payload.category != category
        {
            return false;
        }
        if let Some(states) = &self.states
            && !payload.state.is_some_and(|s| states.contains(&s))
        {
            return false;
        }
        if let Some(language) = &self.language
            && &payload.language != language
        {
            return false;
        }
        if let Some(sources) = &self.sources_any
            && !payload.sources.iter().any(|s| sources.contains(s))
        {
            return false;
        }
        if let Some(min_score) = self.min_score
            && payload.score < min_score
        {
            return false;
        }
        if let Some(after) = self.published_after
            && payload.published_at < after
        {
            return false;
        }
        if let Some(before) = self.published_before
            && payload.published_at > before
        {
            return false;
        }
        true
    }
}

/// One vector search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    /// Record key.
    pub id: String,
    /// Similarity score (cosine by default).
    pub score: f32,
    /// Stored payload.
    pub payload: VectorPayload,
}

impl VectorHit {
    /// Parse the UUID out of a `"trend:{uuid}"` / `"item:{uuid}"` key.
    #[must_use]
    pub fn entity_id(&self) -> Option<Uuid> {
        self.id
            .split_once(':')
            .and_then(|(_, raw)| Uuid::parse_str(raw).ok())
    }
}

/// Which index a semantic search runs over.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SearchType {
    /// Search ranked trends.
    #[default]
    Trends,
    /// Search processed items grouped as topics.
    Topics,
    /// Search everything.
    All,
}

/// Semantic search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text; embedded unless `embedding` is supplied directly.
    pub query: Option<String>,
    /// Direct query embedding, bypassing the embedding provider.
    pub embedding: Option<Vec<f32>>,
    /// Maximum results to return.
    pub limit: usize,
    /// Minimum cosine similarity for a hit.
    pub min_similarity: f32,
    /// Metadata filters applied in the vector store.
    #[serde(default)]
    pub filters: VectorFilter,
    /// Which index to search.
    #[serde(default)]
    pub search_type: SearchType,
}

/// Listing filter shared by the metadata repositories.
///
/// Listing operations are deterministic under the stable order
/// (score desc, then UUID asc).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    /// Restrict to one category.
    pub category: Option<Category>,
    /// Restrict to any of these states.
    pub states: Option<Vec<TrendState>>,
    /// Keep rows sharing at least one of these sources.
    pub sources: Option<Vec<String>>,
    /// Restrict to one language.
    pub language: Option<String>,
    /// Keep rows with score >= this.
    pub min_score: Option<f64>,
    /// Keep rows created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Keep rows created at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Page size.
    pub limit: Option<u32>,
    /// Page offset.
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> VectorPayload {
        VectorPayload {
            entity: EntityKind::Trend,
            category: Category::Technology,
            state: Some(TrendState::Viral),
            language: "en".to_owned(),
            sources: vec!["hackernews".to_owned(), "reddit".to_owned()],
            score: 82.0,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(VectorFilter::default().matches(&payload()));
    }

    #[test]
    fn filter_clauses_are_conjunctive() {
        let f = VectorFilter {
            entity: Some(EntityKind::Trend),
            category: Some(Category::Technology),
            min_score: Some(80.0),
            ..Default::default()
        };
        assert!(f.matches(&payload()));

        let f = VectorFilter {
            entity: Some(EntityKind::Trend),
            min_score: Some(90.0),
            ..Default::default()
        };
        assert!(!f.matches(&payload()));
    }

    #[test]
    fn sources_any_is_set_membership() {
        let f = VectorFilter {
            sources_any: Some(vec!["reddit".to_owned()]),
            ..Default::default()
        };
        assert!(f.matches(&payload()));

        let f = VectorFilter {
            sources_any: Some(vec!["youtube".to_owned()]),
            ..Default::default()
        };
        assert!(!f.matches(&payload()));
    }

    #[test]
    fn hit_parses_entity_id() {
        let id = Uuid::new_v4();
        let hit = VectorHit {
            id: format!("trend:{id}"),
            score: 0.9,
            payload: payload(),
        };
        assert_eq!(hit.entity_id(), Some(id));
    }
}

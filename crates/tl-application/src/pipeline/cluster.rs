//! Clusterer stage.
//!
//! Density-based clustering over item embeddings with cosine distance:
//! automatic cluster count, noise-tolerant, variable density. The clusterer
//! is a pure function from `(vectors, params)` to labels; no stateful model
//! is warmed. Noise items are not turned into topics but remain persisted as
//! items.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use tl_domain::constants::pipeline::{TOPIC_KEYWORDS_TOP_K, TOPIC_SUMMARY_ITEMS, YIELD_EVERY_ITEMS};
use tl_domain::entities::{Category, EngagementMetrics, ProcessedItem, Topic};
use tl_domain::value_objects::cosine_similarity;

use super::PipelineConfig;

/// A topic plus the per-source item counts the ranker needs for its
/// diversity term.
#[derive(Debug, Clone)]
pub struct TopicDraft {
    /// The assembled topic.
    pub topic: Topic,
    /// Item count per source tag within the cluster.
    pub source_counts: HashMap<String, u64>,
}

/// DBSCAN over cosine distance. `eps` is a distance bound (`1 - cosine`),
/// `min_pts` counts the point itself. Returns one label per input vector;
/// `None` marks noise.
#[must_use]
pub fn dbscan_labels(vectors: &[&[f32]], eps: f32, min_pts: usize) -> Vec<Option<usize>> {
    let n = vectors.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_label = 0usize;

    let neighbors = |p: usize| -> Vec<usize> {
        (0..n)
            .filter(|&q| 1.0 - cosine_similarity(vectors[p], vectors[q]) <= eps)
            .collect()
    };

    for p in 0..n {
        if visited[p] {
            continue;
        }
        visited[p] = true;
        let seed = neighbors(p);
        if seed.len() < min_pts {
            continue; // noise unless later absorbed by a cluster
        }

        let label = next_label;
        next_label += 1;
        labels[p] = Some(label);

        let mut frontier: Vec<usize> = seed;
        let mut queued: HashSet<usize> = frontier.iter().copied().collect();
        while let Some(q) = frontier.pop() {
            if labels[q].is_none() {
                labels[q] = Some(label);
            }
            if visited[q] {
                continue;
            }
            visited[q] = true;
            let expansion = neighbors(q);
            if expansion.len() >= min_pts {
                for r in expansion {
                    if queued.insert(r) {
                        frontier.push(r);
                    }
                }
            }
        }
    }

    labels
}

/// Majority vote with ties broken by first-seen order.
fn majority<'a, T, I>(values: I) -> Option<&'a T>
where
    T: Eq + std::hash::Hash + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut counts: HashMap<&T, (usize, usize)> = HashMap::new();
    for (seen_at, value) in values.enumerate() {
        let entry = counts.entry(value).or_insert((0, seen_at));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .min_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)))
        .map(|(value, _)| value)
}

/// Cluster-local TF-IDF over item keyword tokens.
fn topic_keywords(
    members: &[&ProcessedItem],
    document_frequency: &HashMap<&str, usize>,
    total_documents: usize,
) -> Vec<String> {
    let mut term_frequency: HashMap<&str, usize> = HashMap::new();
    for item in members {
        for keyword in &item.keywords {
            *term_frequency.entry(keyword.as_str()).or_default() += 1;
        }
    }

    let mut weighted: Vec<(&str, f64)> = term_frequency
        .into_iter()
        .map(|(token, tf)| {
            let df = document_frequency.get(token).copied().unwrap_or(1).max(1);
            let idf = (1.0 + total_documents as f64 / df as f64).ln();
            (token, tf as f64 * idf)
        })
        .collect();
    weighted.sort_by(|(ta, wa), (tb, wb)| {
        wb.partial_cmp(wa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ta.cmp(tb))
    });
    weighted
        .into_iter()
        .take(TOPIC_KEYWORDS_TOP_K)
        .map(|(token, _)| token.to_owned())
        .collect()
}

fn assemble_topic(
    members: &[&ProcessedItem],
    document_frequency: &HashMap<&str, usize>,
    total_documents: usize,
) -> TopicDraft {
    // Representative title: highest engagement, ties to the earliest item.
    let representative = members
        .iter()
        .min_by(|a, b| {
            b.engagement
                .total()
                .cmp(&a.engagement.total())
                .then(a.published_at.cmp(&b.published_at))
        })
        .copied();

    let mut by_engagement: Vec<&ProcessedItem> = members.to_vec();
    by_engagement.sort_by(|a, b| b.engagement.total().cmp(&a.engagement.total()));
    let mut summary = by_engagement
        .iter()
        .take(TOPIC_SUMMARY_ITEMS)
        .map(|i| i.normalized_title.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    if summary.chars().count() > 280 {
        summary = summary.chars().take(277).collect::<String>() + "...";
    }

    let engagement = members.iter().fold(EngagementMetrics::default(), |acc, i| {
        acc.merged(&i.engagement)
    });
    let first_seen = members
        .iter()
        .map(|i| i.published_at)
        .min()
        .unwrap_or_else(chrono::Utc::now);
    let last_updated = members
        .iter()
        .map(|i| i.published_at)
        .max()
        .unwrap_or_else(chrono::Utc::now);

    // First observation of this lineage's velocity; persistence folds it
    // into any prior maximum on upsert.
    let age_hours = ((chrono::Utc::now() - first_seen).num_seconds() as f64 / 3600.0).max(1.0);
    let max_velocity = engagement.total() as f64 / age_hours;

    let language = majority(members.iter().map(|i| &i.language))
        .cloned()
        .unwrap_or_else(|| "und".to_owned());
    let category = majority(members.iter().map(|i| &i.category))
        .copied()
        .unwrap_or(Category::General);

    let mut source_counts: HashMap<String, u64> = HashMap::new();
    for item in members {
        *source_counts.entry(item.source.clone()).or_default() += 1;
    }

    let topic = Topic {
        id: Uuid::new_v4(),
        title: representative.map(|i| i.title.clone()).unwrap_or_default(),
        summary,
        category,
        keywords: topic_keywords(members, document_frequency, total_documents),
        item_count: members.len() as u64,
        engagement,
        max_velocity,
        first_seen,
        last_updated,
        language,
        item_ids: members.iter().map(|i| i.id).collect(),
    };

    TopicDraft {
        topic,
        source_counts,
    }
}

/// Cluster a deduplicated batch into topic drafts.
///
/// Items with an undetermined language are excluded from cross-language
/// clustering; they stay in the item stream but never join a topic.
pub async fn cluster(
    items: &[ProcessedItem],
    vectors: &HashMap<Uuid, Vec<f32>>,
    config: &PipelineConfig,
) -> Vec<TopicDraft> {
    let clusterable: Vec<&ProcessedItem> = items
        .iter()
        .filter(|i| i.has_known_language() && vectors.contains_key(&i.id))
        .collect();
    if clusterable.len() < config.min_cluster_size {
        return Vec::new();
    }

    let views: Vec<&[f32]> = clusterable
        .iter()
        .filter_map(|i| vectors.get(&i.id).map(Vec::as_slice))
        .collect();

    let labels = {
        // Pure CPU; yield once per chunk for very large batches.
        if views.len() > YIELD_EVERY_ITEMS {
            tokio::task::yield_now().await;
        }
        dbscan_labels(&views, config.clustering_distance, config.min_cluster_size)
    };

    let mut clusters: HashMap<usize, Vec<&ProcessedItem>> = HashMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if let Some(label) = label {
            clusters.entry(*label).or_default().push(clusterable[idx]);
        }
    }

    // Every cluster is one keyword document for the IDF term.
    let total_documents = clusters.len().max(1);
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for members in clusters.values() {
        let unique: HashSet<&str> = members
            .iter()
            .flat_map(|i| i.keywords.iter().map(String::as_str))
            .collect();
        for token in unique {
            *document_frequency.entry(token).or_default() += 1;
        }
    }

    let mut drafts: Vec<TopicDraft> = clusters
        .values()
        .filter(|members| members.len() >= config.min_cluster_size)
        .map(|members| assemble_topic(members, &document_frequency, total_documents))
        .collect();
    // Deterministic output order regardless of map iteration.
    drafts.sort_by(|a, b| {
        b.topic
            .engagement
            .total()
            .cmp(&a.topic.engagement.total())
            .then(a.topic.id.cmp(&b.topic.id))
    });

    let noise = clusterable.len() - drafts.iter().map(|d| d.topic.item_count as usize).sum::<usize>();
    tracing::debug!(
        clusters = drafts.len(),
        noise,
        excluded = items.len() - clusterable.len(),
        "clustering finished"
    );
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tl_domain::entities::EngagementMetrics;

    fn item(title: &str, source: &str, language: &str, upvotes: u64) -> ProcessedItem {
        ProcessedItem {
            id: Uuid::new_v4(),
            source: source.to_owned(),
            source_id: title.to_owned(),
            url: "https://example.com".to_owned(),
            title: title.to_owned(),
            normalized_title: title.to_lowercase(),
            body: None,
            author: None,
            published_at: Utc::now(),
            engagement: EngagementMetrics {
                upvotes,
                ..Default::default()
            },
            category: Default::default(),
            language_hint: None,
            language: language.to_owned(),
            language_confidence: 0.9,
            keywords: title.split_whitespace().map(str::to_owned).collect(),
            sentiment: None,
            tags: vec![],
            processed_at: Utc::now(),
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn dbscan_separates_two_groups_and_noise() {
        let a1 = [1.0f32, 0.0, 0.0];
        let a2 = [0.99, 0.05, 0.0];
        let b1 = [0.0, 1.0, 0.0];
        let b2 = [0.05, 0.99, 0.0];
        let lone = [0.577, 0.577, 0.577];
        let labels = dbscan_labels(&[&a1, &a2, &b1, &b2, &lone], 0.1, 2);

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        assert_eq!(labels[4], None);
    }

    #[tokio::test]
    async fn cluster_coverage_and_min_size() {
        let items = vec![
            item("rust release", "hackernews", "en", 50),
            item("rust release notes", "reddit", "en", 20),
            item("unrelated quantum result", "reddit", "en", 5),
        ];
        let mut vectors = HashMap::new();
        vectors.insert(items[0].id, vec![1.0, 0.0]);
        vectors.insert(items[1].id, vec![0.99, 0.1]);
        vectors.insert(items[2].id, vec![0.0, 1.0]);

        let drafts = cluster(&items, &vectors, &config()).await;
        assert_eq!(drafts.len(), 1);
        let topic = &drafts[0].topic;
        assert_eq!(topic.item_count, 2);
        assert_eq!(topic.item_ids.len(), 2);
        // Every non-noise item appears in exactly one topic.
        assert!(topic.item_ids.contains(&items[0].id));
        assert!(topic.item_ids.contains(&items[1].id));
        assert!(!topic.item_ids.contains(&items[2].id));
        // Representative title comes from the highest-engagement member.
        assert_eq!(topic.title, "rust release");
    }

    #[tokio::test]
    async fn cross_language_items_share_a_topic_with_majority_language() {
        // S2: identical embeddings, languages en and es; both survive dedup
        // (cross-language dedup is out of scope here) and cluster together.
        let items = vec![
            item("apple launches m5", "hackernews", "en", 10),
            item("apple lanza m5", "reddit", "es", 8),
        ];
        let mut vectors = HashMap::new();
        vectors.insert(items[0].id, vec![1.0, 0.0]);
        vectors.insert(items[1].id, vec![1.0, 0.0]);

        let drafts = cluster(&items, &vectors, &config()).await;
        assert_eq!(drafts.len(), 1);
        // Tie on language count: first-seen language wins.
        assert_eq!(drafts[0].topic.language, "en");
        assert_eq!(drafts[0].topic.item_count, 2);
    }

    #[tokio::test]
    async fn undetermined_language_items_never_cluster() {
        let items = vec![
            item("mystery a", "x", "und", 1),
            item("mystery b", "x", "und", 1),
        ];
        let mut vectors = HashMap::new();
        vectors.insert(items[0].id, vec![1.0, 0.0]);
        vectors.insert(items[1].id, vec![1.0, 0.0]);

        let drafts = cluster(&items, &vectors, &config()).await;
        assert!(drafts.is_empty());
    }
}

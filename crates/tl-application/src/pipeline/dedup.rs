//! Deduplicator stage.
//!
//! Marks a pair as duplicate iff the cosine similarity of their embeddings
//! reaches the configured threshold. Above the cutover batch size, candidate
//! pairs come from random-hyperplane LSH buckets instead of the full N²
//! sweep. Duplicates are logged and dropped, never persisted.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use tl_domain::constants::pipeline::YIELD_EVERY_ITEMS;
use tl_domain::entities::ProcessedItem;
use tl_domain::value_objects::cosine_similarity;

/// Hyperplane count for LSH signatures.
const LSH_BITS: usize = 16;

/// Seed fixing the hyperplane set; dedup must be deterministic across runs.
const LSH_SEED: u64 = 0x7472_656e_646c;

/// Result of a dedup pass.
#[derive(Debug)]
pub struct DedupOutcome {
    /// Surviving items in their original order.
    pub kept: Vec<ProcessedItem>,
    /// How many duplicates were dropped.
    pub dropped: usize,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Keep preference: earliest `published_at`, then highest engagement, then
/// lowest UUID.
fn keeper_order(a: &ProcessedItem, b: &ProcessedItem) -> Ordering {
    a.published_at
        .cmp(&b.published_at)
        .then_with(|| b.engagement.total().cmp(&a.engagement.total()))
        .then_with(|| a.id.cmp(&b.id))
}

fn lsh_signature(vector: &[f32], hyperplanes: &[Vec<f32>]) -> u32 {
    let mut signature = 0u32;
    for (bit, plane) in hyperplanes.iter().enumerate() {
        let dot: f32 = vector.iter().zip(plane.iter()).map(|(x, y)| x * y).sum();
        if dot >= 0.0 {
            signature |= 1 << bit;
        }
    }
    signature
}

fn candidate_pairs_lsh(
    items: &[ProcessedItem],
    vectors: &HashMap<Uuid, Vec<f32>>,
) -> Vec<(usize, usize)> {
    let dims = items
        .iter()
        .find_map(|i| vectors.get(&i.id).map(Vec::len))
        .unwrap_or(0);
    if dims == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(LSH_SEED);
    let hyperplanes: Vec<Vec<f32>> = (0..LSH_BITS)
        .map(|_| (0..dims).map(|_| rng.r#gen::<f32>() - 0.5).collect())
        .collect();

    let mut buckets: HashMap<u32, Vec<usize>> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        if let Some(vector) = vectors.get(&item.id) {
            let signature = lsh_signature(vector, &hyperplanes);
            // Multi-probe: exact bucket plus every single-bit neighbor, so a
            // near-duplicate straddling one hyperplane is still compared.
            buckets.entry(signature).or_default().push(idx);
            for bit in 0..LSH_BITS {
                buckets.entry(signature ^ (1 << bit)).or_default().push(idx);
            }
        }
    }

    let mut pairs = Vec::new();
    for bucket in buckets.values() {
        for (i, &a) in bucket.iter().enumerate() {
            for &b in &bucket[i + 1..] {
                if a < b {
                    pairs.push((a, b));
                } else if b < a {
                    pairs.push((b, a));
                }
            }
        }
    }
    pairs.sort_unstable();
    pairs.dedup();
    pairs
}

fn candidate_pairs_full(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
    for a in 0..n {
        for b in (a + 1)..n {
            pairs.push((a, b));
        }
    }
    pairs
}

/// Deduplicate a batch. `|dedup(S, t1)| <= |dedup(S, t2)|` holds for
/// thresholds `t1 <= t2`: lowering the threshold can only merge more pairs.
pub async fn dedup(
    items: Vec<ProcessedItem>,
    vectors: &HashMap<Uuid, Vec<f32>>,
    threshold: f32,
    near_neighbor_cutover: usize,
) -> DedupOutcome {
    let n = items.len();
    if n < 2 {
        return DedupOutcome {
            kept: items,
            dropped: 0,
        };
    }

    let pairs = if n > near_neighbor_cutover {
        candidate_pairs_lsh(&items, vectors)
    } else {
        candidate_pairs_full(n)
    };

    let mut groups = UnionFind::new(n);
    for (checked, &(a, b)) in pairs.iter().enumerate() {
        if let (Some(va), Some(vb)) = (vectors.get(&items[a].id), vectors.get(&items[b].id))
            && cosine_similarity(va, vb) >= threshold
        {
            groups.union(a, b);
        }
        if (checked + 1) % YIELD_EVERY_ITEMS == 0 {
            tokio::task::yield_now().await;
        }
    }

    // Pick one keeper per group.
    let mut keeper_of_group: HashMap<usize, usize> = HashMap::new();
    for idx in 0..n {
        let root = groups.find(idx);
        keeper_of_group
            .entry(root)
            .and_modify(|current| {
                if keeper_order(&items[idx], &items[*current]) == Ordering::Less {
                    *current = idx;
                }
            })
            .or_insert(idx);
    }

    let keep: std::collections::HashSet<usize> = keeper_of_group.values().copied().collect();
    let dropped = n - keep.len();
    if dropped > 0 {
        tracing::info!(total = n, dropped, threshold, "dedup dropped duplicates");
    }

    let kept = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| keep.contains(&idx).then_some(item))
        .collect();

    DedupOutcome { kept, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tl_domain::entities::EngagementMetrics;

    fn item(title: &str, published_offset_mins: i64, upvotes: u64) -> ProcessedItem {
        ProcessedItem {
            id: Uuid::new_v4(),
            source: "test".to_owned(),
            source_id: title.to_owned(),
            url: "https://example.com".to_owned(),
            title: title.to_owned(),
            normalized_title: title.to_lowercase(),
            body: None,
            author: None,
            published_at: Utc::now() + Duration::minutes(published_offset_mins),
            engagement: EngagementMetrics {
                upvotes,
                ..Default::default()
            },
            category: Default::default(),
            language_hint: None,
            language: "en".to_owned(),
            language_confidence: 0.9,
            keywords: vec![],
            sentiment: None,
            tags: vec![],
            processed_at: Utc::now(),
        }
    }

    fn vectors_for(items: &[ProcessedItem], vecs: &[Vec<f32>]) -> HashMap<Uuid, Vec<f32>> {
        items
            .iter()
            .zip(vecs.iter())
            .map(|(i, v)| (i.id, v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn near_identical_items_collapse_keeping_earliest() {
        // S1: "Apple unveils M5" vs "apple   unveils m5" vs "Google IPO".
        let items = vec![
            item("apple unveils m5", 10, 5),
            item("apple unveils m5", 0, 3),
            item("google ipo", 0, 7),
        ];
        let earliest = items[1].id;
        let vectors = vectors_for(
            &items,
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.999, 0.01, 0.0],
                vec![0.0, 1.0, 0.0],
            ],
        );
        let outcome = dedup(items, &vectors, 0.92, 500).await;
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.dropped, 1);
        assert!(outcome.kept.iter().any(|i| i.id == earliest));
    }

    #[tokio::test]
    async fn threshold_monotonicity() {
        let items: Vec<ProcessedItem> = (0..6).map(|i| item(&format!("t{i}"), 0, 1)).collect();
        let vecs: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0],
            vec![0.98, 0.2],
            vec![0.9, 0.43],
            vec![0.0, 1.0],
            vec![0.2, 0.98],
            vec![0.7, 0.7],
        ];
        let vectors = vectors_for(&items, &vecs);
        let strict = dedup(items.clone(), &vectors, 0.99, 500).await.kept.len();
        let loose = dedup(items, &vectors, 0.8, 500).await.kept.len();
        assert!(loose <= strict);
    }

    #[tokio::test]
    async fn engagement_breaks_published_ties() {
        let a = item("same", 0, 3);
        let b = item("same", 0, 9);
        let expected = b.id;
        // Force a deterministic published_at tie.
        let ts = a.published_at;
        let mut b = b;
        b.published_at = ts;
        let items = vec![a, b];
        let vectors = vectors_for(&items, &[vec![1.0, 0.0], vec![1.0, 0.0]]);
        let outcome = dedup(items, &vectors, 0.92, 500).await;
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].id, expected);
    }

    #[tokio::test]
    async fn large_batches_use_lsh_and_still_find_duplicates() {
        let mut items = Vec::new();
        let mut vecs = Vec::new();
        for i in 0..40 {
            items.push(item(&format!("unique {i}"), 0, 1));
            let angle = i as f32 * 0.15;
            vecs.push(vec![angle.cos(), angle.sin(), 0.0]);
        }
        // One exact duplicate pair.
        items.push(item("dup a", 0, 1));
        vecs.push(vec![0.5, 0.5, 0.5]);
        items.push(item("dup b", 5, 1));
        vecs.push(vec![0.5, 0.5, 0.5]);

        let vectors = vectors_for(&items, &vecs);
        let total = items.len();
        // Cutover below the batch size forces the LSH path.
        let outcome = dedup(items, &vectors, 0.999, 10).await;
        assert_eq!(outcome.kept.len(), total - 1);
    }
}

//! Pipeline defaults.

/// Cosine similarity threshold above which two items are duplicates.
pub const DEDUP_THRESHOLD: f32 = 0.92;

/// Batch size above which dedup switches from pairwise comparison to
/// near-neighbor candidate generation.
pub const DEDUP_NEAR_NEIGHBOR_CUTOVER: usize = 500;

/// Minimum items for a cluster to become a topic.
pub const MIN_CLUSTER_SIZE: usize = 2;

/// Cosine-distance epsilon for density clustering.
pub const CLUSTERING_DISTANCE: f32 = 0.3;

/// Minimum characters of content required for language detection.
pub const MIN_DETECT_CHARS: usize = 3;

/// Language tag for undetermined content.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// CPU-bound stages yield to the scheduler every this many items.
pub const YIELD_EVERY_ITEMS: usize = 1000;

/// Keywords kept per topic.
pub const TOPIC_KEYWORDS_TOP_K: usize = 10;

/// Items whose normalized titles feed the topic summary.
pub const TOPIC_SUMMARY_ITEMS: usize = 3;

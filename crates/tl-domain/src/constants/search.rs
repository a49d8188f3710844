//! Semantic search defaults.

/// Overfetch multiplier applied before post-filter hydration drops results.
pub const SEARCH_OVERFETCH_MULTIPLIER: usize = 2;

/// Result limit when a request does not specify one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Minimum similarity when a request does not specify one.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.7;

//! Ranking defaults. All of these are overridable via configuration.

/// Weight of normalized engagement in the composite score.
pub const WEIGHT_ENGAGEMENT: f64 = 0.5;

/// Weight of recency in the composite score.
pub const WEIGHT_RECENCY: f64 = 0.2;

/// Weight of normalized velocity in the composite score.
pub const WEIGHT_VELOCITY: f64 = 0.2;

/// Weight of source diversity in the composite score.
pub const WEIGHT_DIVERSITY: f64 = 0.1;

/// Recency decay time constant in hours.
pub const RECENCY_TAU_HOURS: f64 = 24.0;

/// Trends kept per category.
pub const MAX_TRENDS_PER_CATEGORY: usize = 10;

/// Whether the source-diversity filter is applied by default.
pub const SOURCE_DIVERSITY_ENABLED: bool = true;

/// Maximum share of the top-N any single source may supply.
pub const MAX_PERCENTAGE_PER_SOURCE: f64 = 0.20;

/// Velocity at or above which a young topic is Emerging.
pub const VELOCITY_EMERGE: f64 = 10.0;

/// Absolute velocity threshold for Viral.
pub const VELOCITY_VIRAL: f64 = 100.0;

/// Lower bound of the Sustained velocity band.
pub const VELOCITY_SUSTAIN_LOW: f64 = 5.0;

/// Upper bound of the Sustained velocity band.
pub const VELOCITY_SUSTAIN_HIGH: f64 = 100.0;

/// A trend is Declining once its current velocity falls below this fraction
/// of the max-observed velocity for its topic lineage.
pub const DECLINE_VELOCITY_RATIO: f64 = 0.5;

/// Cosine similarity above which a new trend is treated as the continuation
/// of a prior trend's topic lineage.
pub const LINEAGE_MIN_SIMILARITY: f32 = 0.9;

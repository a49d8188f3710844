//! Cache key conventions and TTLs.
//!
//! Every cached read path goes through these helpers so invalidation globs
//! (`trends:*`, `topics:*`) stay in one place.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// TTL for cached query embeddings (7 days).
pub const EMBEDDING_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// TTL for rate-limit hour buckets.
pub const RATELIMIT_TTL: Duration = Duration::from_secs(3600);

/// TTL for cached trend listings (5 minutes).
pub const TRENDS_LIST_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL for cached trend details (10 minutes).
pub const TRENDS_DETAIL_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL for cached similar-trend listings (10 minutes).
pub const TRENDS_SIMILAR_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL for cached topic item pages (10 minutes).
pub const TOPICS_ITEMS_TTL: Duration = Duration::from_secs(10 * 60);

/// `emb:{sha256(text)}` — cached embedding for a query fingerprint.
#[must_use]
pub fn embedding(fingerprint: &str) -> String {
    format!("emb:{fingerprint}")
}

/// `ratelimit:{plugin}:{YYYYMMDDHH}` — sliding-window counter bucket.
#[must_use]
pub fn ratelimit(plugin: &str, now: DateTime<Utc>) -> String {
    format!("ratelimit:{plugin}:{}", now.format("%Y%m%d%H"))
}

/// `trends:list:{fingerprint}` — cached trend listing.
#[must_use]
pub fn trends_list(fingerprint: &str) -> String {
    format!("trends:list:{fingerprint}")
}

/// `trends:detail:{uuid}` — cached trend detail.
#[must_use]
pub fn trends_detail(id: Uuid) -> String {
    format!("trends:detail:{id}")
}

/// `trends:similar:{uuid}:{limit}:{minsim}` — cached similar-trend listing.
#[must_use]
pub fn trends_similar(id: Uuid, limit: usize, min_similarity: f32) -> String {
    format!("trends:similar:{id}:{limit}:{min_similarity}")
}

/// `topics:items:{uuid}:{limit}:{offset}` — cached topic item page.
#[must_use]
pub fn topics_items(id: Uuid, limit: u32, offset: u32) -> String {
    format!("topics:items:{id}:{limit}:{offset}")
}

/// TTL for daily usage counters.
pub const USAGE_TTL: Duration = Duration::from_secs(48 * 3600);

/// `stats:{operation}:{YYYYMMDD}` — daily usage counter.
#[must_use]
pub fn usage(operation: &str, now: DateTime<Utc>) -> String {
    format!("stats:{operation}:{}", now.format("%Y%m%d"))
}

/// Glob matching every trend read-path key.
pub const TRENDS_INVALIDATION_GLOB: &str = "trends:*";

/// Glob matching every topic read-path key.
pub const TOPICS_INVALIDATION_GLOB: &str = "topics:*";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratelimit_key_uses_utc_hour_bucket() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T14:05:00Z")
            .map(|t| t.with_timezone(&Utc))
            .ok();
        let at = at.unwrap_or_else(Utc::now);
        assert_eq!(ratelimit("hn", at), "ratelimit:hn:2026030114");
    }
}

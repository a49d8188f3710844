//! Configuration validation, run after every load.

use tl_domain::error::{Error, Result};

use super::AppConfig;

fn check(condition: bool, key: &str, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::ConfigInvalid {
            key: key.to_owned(),
            message: message.to_owned(),
        })
    }
}

/// Reject configurations that would misbehave silently at runtime.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let p = &config.pipeline;
    check(
        p.dedup_threshold > 0.0 && p.dedup_threshold <= 1.0,
        "pipeline.dedup_threshold",
        "must be in (0, 1]",
    )?;
    check(
        p.min_cluster_size >= 2,
        "pipeline.min_cluster_size",
        "a topic needs at least two items",
    )?;
    check(
        p.clustering_distance > 0.0 && p.clustering_distance < 1.0,
        "pipeline.clustering_distance",
        "must be in (0, 1)",
    )?;
    check(
        p.max_percentage_per_source > 0.0 && p.max_percentage_per_source <= 1.0,
        "pipeline.max_percentage_per_source",
        "must be in (0, 1]",
    )?;
    check(
        p.max_trends_per_category > 0,
        "pipeline.max_trends_per_category",
        "must be positive",
    )?;
    let weight_sum =
        p.weight_engagement + p.weight_recency + p.weight_velocity + p.weight_diversity;
    check(
        weight_sum > 0.0,
        "pipeline.weight_*",
        "score weights must not all be zero",
    )?;
    check(
        p.recency_tau_hours > 0.0,
        "pipeline.recency_tau_hours",
        "must be positive",
    )?;

    check(
        config.runtime.failure_threshold > 0,
        "runtime.failure_threshold",
        "must be positive",
    )?;
    check(
        (0.0..=1.0).contains(&config.runtime.success_rate_floor),
        "runtime.success_rate_floor",
        "must be in [0, 1]",
    )?;

    check(
        matches!(config.rate_limiter.backend.as_str(), "memory" | "cache"),
        "rate_limiter.backend",
        "must be 'memory' or 'cache'",
    )?;

    check(
        config.sandbox.timeout_secs > 0,
        "sandbox.timeout_secs",
        "must be positive",
    )?;
    check(
        !config.sandbox.blacklist.is_empty(),
        "sandbox.blacklist",
        "an empty blacklist disables a required control; list the banned identifiers explicitly",
    )?;

    check(
        config.retention.hot_days <= config.retention.warm_days
            && config.retention.warm_days <= config.retention.cold_days,
        "retention",
        "tiers must be ordered hot <= warm <= cold",
    )?;

    check(config.server.port != 0, "server.port", "must be non-zero")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.dedup_threshold = 1.5;
        let err = validate_config(&config);
        assert!(matches!(err, Err(Error::ConfigInvalid { .. })));
    }

    #[test]
    fn empty_blacklist_is_rejected() {
        let mut config = AppConfig::default();
        config.sandbox.blacklist.clear();
        assert!(validate_config(&config).is_err());
    }
}

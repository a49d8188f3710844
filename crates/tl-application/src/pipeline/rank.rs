//! Ranker stage.
//!
//! Computes the composite score per topic, applies the optional source
//! diversity cap, assigns lifecycle states from configured thresholds, and
//! hands out contiguous 1-based ranks per category.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tl_domain::entities::{Category, Trend, TrendState};

use super::PipelineConfig;
use super::cluster::TopicDraft;

/// Smooth monotone squash of an unbounded count into [0, 1).
fn saturate(x: f64, scale: f64) -> f64 {
    x / (x + scale)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Shannon entropy of the source distribution, normalized to [0, 1].
/// A single-source topic scores 0.
fn source_diversity(source_counts: &HashMap<String, u64>) -> f64 {
    let total: u64 = source_counts.values().sum();
    if total == 0 || source_counts.len() < 2 {
        return 0.0;
    }
    let entropy: f64 = source_counts
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    entropy / (source_counts.len() as f64).ln()
}

/// Composite score in [0, 100], monotone in each input.
fn composite_score(draft: &TopicDraft, now: DateTime<Utc>, config: &PipelineConfig) -> f64 {
    let topic = &draft.topic;
    let engagement = saturate(topic.engagement.total() as f64, 1000.0);
    let hours_since_update = ((now - topic.last_updated).num_seconds() as f64 / 3600.0).max(0.0);
    let recency = (-hours_since_update / config.recency_tau_hours).exp();
    let velocity = saturate(topic.velocity(now), 100.0);
    let diversity = source_diversity(&draft.source_counts);

    let x = config.weight_engagement * engagement
        + config.weight_recency * recency
        + config.weight_velocity * velocity
        + config.weight_diversity * diversity;
    100.0 * sigmoid(x)
}

/// Lifecycle state from velocity, age, and the lineage's max-observed
/// velocity, using configured thresholds.
///
/// Exposed so the orchestrator can recompute the state after folding a prior
/// lineage's `max_velocity` into a freshly ranked topic.
#[must_use]
pub fn lifecycle_for(
    velocity: f64,
    max_observed_velocity: f64,
    age_hours: f64,
    config: &PipelineConfig,
) -> TrendState {
    if velocity >= config.velocity_viral {
        TrendState::Viral
    } else if velocity < tl_domain::constants::ranking::DECLINE_VELOCITY_RATIO
        * max_observed_velocity
    {
        // Current velocity fell below half of the lineage's observed peak.
        TrendState::Declining
    } else if age_hours < 24.0 && velocity >= config.velocity_emerge {
        TrendState::Emerging
    } else if age_hours >= 24.0
        && velocity >= config.velocity_sustain_low
        && velocity <= config.velocity_sustain_high
    {
        TrendState::Sustained
    } else if age_hours < 24.0 {
        // Young and below the emerge bar: still forming.
        TrendState::Emerging
    } else {
        // Old, out of the sustain band, never saw a higher peak.
        TrendState::Declining
    }
}

fn lifecycle_state(draft: &TopicDraft, now: DateTime<Utc>, config: &PipelineConfig) -> TrendState {
    let topic = &draft.topic;
    lifecycle_for(
        topic.velocity(now),
        topic.observed_max_velocity(now),
        topic.age_hours(now),
        config,
    )
}

/// Source with the most items in the topic; ties break lexicographically so
/// the diversity cap is deterministic.
fn dominant_source(source_counts: &HashMap<String, u64>) -> Option<&str> {
    source_counts
        .iter()
        .min_by(|(sa, ca), (sb, cb)| cb.cmp(ca).then(sa.cmp(sb)))
        .map(|(source, _)| source.as_str())
}

/// Rank topic drafts into trends.
#[must_use]
pub fn rank(drafts: &[TopicDraft], now: DateTime<Utc>, config: &PipelineConfig) -> Vec<Trend> {
    // Score everything, then select per category.
    let mut scored: Vec<(usize, f64)> = drafts
        .iter()
        .enumerate()
        .map(|(idx, draft)| (idx, composite_score(draft, now, config)))
        .collect();
    scored.sort_by(|(ia, sa), (ib, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(drafts[*ia].topic.id.cmp(&drafts[*ib].topic.id))
    });

    let per_source_cap = if config.source_diversity_enabled {
        ((config.max_trends_per_category as f64 * config.max_percentage_per_source).floor()
            as usize)
            .max(1)
    } else {
        usize::MAX
    };

    let mut selected_per_category: HashMap<Category, Vec<(usize, f64)>> = HashMap::new();
    let mut source_use_per_category: HashMap<(Category, String), usize> = HashMap::new();

    for (idx, score) in scored {
        let draft = &drafts[idx];
        let category = draft.topic.category;
        let selected = selected_per_category.entry(category).or_default();
        if selected.len() >= config.max_trends_per_category {
            continue;
        }
        if let Some(dominant) = dominant_source(&draft.source_counts) {
            let used = source_use_per_category
                .entry((category, dominant.to_owned()))
                .or_insert(0);
            if *used >= per_source_cap {
                tracing::debug!(
                    topic = %draft.topic.id,
                    source = dominant,
                    "diversity cap skipped topic"
                );
                continue;
            }
            *used += 1;
        }
        selected.push((idx, score));
    }

    // Ranks are contiguous from 1 within each category, by descending score.
    let mut trends = Vec::new();
    for selected in selected_per_category.into_values() {
        for (position, (idx, score)) in selected.into_iter().enumerate() {
            let draft = &drafts[idx];
            let topic = &draft.topic;

            let mut sources: Vec<(String, u64)> = draft
                .source_counts
                .iter()
                .map(|(s, c)| (s.clone(), *c))
                .collect();
            sources.sort_by(|(sa, ca), (sb, cb)| cb.cmp(ca).then(sa.cmp(sb)));

            trends.push(Trend {
                id: Uuid::new_v4(),
                topic_id: topic.id,
                rank: position as u32 + 1,
                score,
                state: lifecycle_state(draft, now, config),
                velocity: topic.velocity(now),
                sources: sources.into_iter().map(|(s, _)| s).collect(),
                language: topic.language.clone(),
                title: topic.title.clone(),
                summary: topic.summary.clone(),
                category: topic.category,
                created_at: now,
            });
        }
    }
    trends.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    trends
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tl_domain::entities::{EngagementMetrics, Topic};

    fn draft(
        category: Category,
        source: &str,
        upvotes: u64,
        age_hours: i64,
    ) -> TopicDraft {
        let now = Utc::now();
        let mut source_counts = HashMap::new();
        source_counts.insert(source.to_owned(), 3);
        TopicDraft {
            topic: Topic {
                id: Uuid::new_v4(),
                title: format!("{source} topic"),
                summary: String::new(),
                category,
                keywords: vec![],
                item_count: 3,
                engagement: EngagementMetrics {
                    upvotes,
                    ..Default::default()
                },
                max_velocity: 0.0,
                first_seen: now - Duration::hours(age_hours),
                last_updated: now,
                language: "en".to_owned(),
                item_ids: vec![],
            },
            source_counts,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn score_is_monotone_in_engagement() {
        let cfg = config();
        let now = Utc::now();
        let low = composite_score(&draft(Category::General, "a", 100, 10), now, &cfg);
        let high = composite_score(&draft(Category::General, "a", 10_000, 10), now, &cfg);
        assert!(high > low);
    }

    #[test]
    fn diversity_is_zero_for_single_source_and_max_for_uniform() {
        let mut single = HashMap::new();
        single.insert("reddit".to_owned(), 5u64);
        assert_eq!(source_diversity(&single), 0.0);

        let mut uniform = HashMap::new();
        uniform.insert("a".to_owned(), 2u64);
        uniform.insert("b".to_owned(), 2u64);
        assert!((source_diversity(&uniform) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ranks_are_contiguous_per_category() {
        let cfg = config();
        let drafts: Vec<TopicDraft> = (0..4)
            .map(|i| draft(Category::Technology, &format!("s{i}"), 100 * (i + 1) as u64, 5))
            .chain((0..2).map(|i| draft(Category::Sports, &format!("p{i}"), 50, 5)))
            .collect();
        let trends = rank(&drafts, Utc::now(), &cfg);

        let mut tech_ranks: Vec<u32> = trends
            .iter()
            .filter(|t| t.category == Category::Technology)
            .map(|t| t.rank)
            .collect();
        tech_ranks.sort_unstable();
        assert_eq!(tech_ranks, vec![1, 2, 3, 4]);

        let mut sports_ranks: Vec<u32> = trends
            .iter()
            .filter(|t| t.category == Category::Sports)
            .map(|t| t.rank)
            .collect();
        sports_ranks.sort_unstable();
        assert_eq!(sports_ranks, vec![1, 2]);
    }

    #[test]
    fn diversity_cap_limits_one_source() {
        // S3: 7 same-source drafts with high engagement, 3 diverse with less.
        let mut cfg = config();
        cfg.max_trends_per_category = 5;
        let mut drafts: Vec<TopicDraft> = (0..7)
            .map(|_| draft(Category::General, "reddit", 5000, 5))
            .collect();
        drafts.push(draft(Category::General, "hackernews", 1000, 5));
        drafts.push(draft(Category::General, "youtube", 1000, 5));
        drafts.push(draft(Category::General, "rss", 1000, 5));

        let trends = rank(&drafts, Utc::now(), &cfg);
        let reddit_count = trends
            .iter()
            .filter(|t| t.sources.contains(&"reddit".to_owned()))
            .count();
        assert_eq!(reddit_count, 1, "at most one reddit trend in the top 5");
        assert_eq!(trends.len(), 4, "fifth slot stays unfilled");
    }

    #[test]
    fn viral_state_takes_precedence() {
        let cfg = config();
        let now = Utc::now();
        // 12k engagement over 2 hours -> velocity far above the viral bar.
        let d = draft(Category::General, "a", 12_000, 2);
        assert_eq!(lifecycle_state(&d, now, &cfg), TrendState::Viral);
    }

    #[test]
    fn velocity_below_half_of_observed_peak_declines() {
        let cfg = config();
        let now = Utc::now();
        // 288 engagement over 48h -> current velocity 6, inside the sustain
        // band; a recorded peak of 20 makes 6 < 0.5 * 20.
        let mut d = draft(Category::General, "a", 288, 48);
        d.topic.max_velocity = 20.0;
        assert_eq!(lifecycle_state(&d, now, &cfg), TrendState::Declining);

        // Same topic with a modest peak stays Sustained: 6 >= 0.5 * 8.
        d.topic.max_velocity = 8.0;
        assert_eq!(lifecycle_state(&d, now, &cfg), TrendState::Sustained);
    }

    #[test]
    fn fresh_topics_are_never_declining_against_their_own_peak() {
        let cfg = config();
        let now = Utc::now();
        // No recorded lineage peak: max-observed equals current velocity, so
        // the declining ratio can never trigger.
        let d = draft(Category::General, "a", 288, 48);
        assert_ne!(lifecycle_state(&d, now, &cfg), TrendState::Declining);
    }
}

//! Integration tests for the SQLite repositories over an in-memory database.

use chrono::{Duration, Utc};
use uuid::Uuid;

use tl_domain::entities::{
    Category, CollectorSource, EngagementMetrics, PipelineRun, PluginHealth, ProcessedItem,
    RunStatus, SourceType, Topic, Trend, TrendState,
};
use tl_domain::error::Error;
use tl_domain::value_objects::ListFilter;
use tl_providers::database::SqliteDatabase;

fn item(source: &str, source_id: &str, title: &str) -> ProcessedItem {
    ProcessedItem {
        id: Uuid::new_v4(),
        source: source.to_owned(),
        source_id: source_id.to_owned(),
        url: format!("https://example.com/{source_id}"),
        title: title.to_owned(),
        normalized_title: title.to_lowercase(),
        body: None,
        author: None,
        published_at: Utc::now(),
        engagement: EngagementMetrics {
            upvotes: 10,
            downvotes: 0,
            comments: 2,
            shares: 0,
            views: 100,
        },
        category: Category::Technology,
        language_hint: None,
        language: "en".to_owned(),
        language_confidence: 0.95,
        keywords: vec!["example".to_owned()],
        sentiment: None,
        tags: vec![],
        processed_at: Utc::now(),
    }
}

fn topic(items: &[&ProcessedItem]) -> Topic {
    Topic {
        id: Uuid::new_v4(),
        title: items.first().map(|i| i.title.clone()).unwrap_or_default(),
        summary: "summary".to_owned(),
        category: Category::Technology,
        keywords: vec!["example".to_owned()],
        item_count: items.len() as u64,
        engagement: items
            .iter()
            .fold(EngagementMetrics::default(), |acc, i| acc.merged(&i.engagement)),
        max_velocity: 6.0,
        first_seen: Utc::now() - Duration::hours(2),
        last_updated: Utc::now(),
        language: "en".to_owned(),
        item_ids: items.iter().map(|i| i.id).collect(),
    }
}

fn trend(topic_id: Uuid, rank: u32, score: f64) -> Trend {
    Trend {
        id: Uuid::new_v4(),
        topic_id,
        rank,
        score,
        state: TrendState::Emerging,
        velocity: 12.5,
        sources: vec!["hackernews".to_owned()],
        language: "en".to_owned(),
        title: "a trend".to_owned(),
        summary: "its summary".to_owned(),
        category: Category::Technology,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn item_save_is_idempotent_on_source_identity() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let repo = db.item_repository();

    let first = item("hackernews", "41", "Apple unveils M5");
    let mut second = first.clone();
    second.id = Uuid::new_v4(); // new surrogate id, same (source, source_id)
    second.engagement.upvotes = 99;

    assert_eq!(repo.save_batch(std::slice::from_ref(&first)).await.expect("save"), 1);
    assert_eq!(repo.save_batch(std::slice::from_ref(&second)).await.expect("save"), 0);

    // The original row was updated in place.
    let stored = repo.get(first.id).await.expect("get").expect("row");
    assert_eq!(stored.engagement.upvotes, 99);
}

#[tokio::test]
async fn topic_item_count_matches_junction_rows() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let item_repo = db.item_repository();
    let topic_repo = db.topic_repository();

    let a = item("hackernews", "1", "first");
    let b = item("reddit", "2", "second");
    item_repo.save_batch(&[a.clone(), b.clone()]).await.expect("items");

    let t = topic(&[&a, &b]);
    topic_repo.save(&t).await.expect("topic");

    let fetched = topic_repo.get(t.id).await.expect("get").expect("row");
    assert_eq!(fetched.item_count, 2);
    assert_eq!(fetched.item_ids.len() as u64, fetched.item_count);

    let items = topic_repo
        .get_items_by_topic(t.id, 10, 0)
        .await
        .expect("items by topic");
    assert_eq!(items.len(), 2);

    // Saving again replaces, never duplicates, the junction rows.
    topic_repo.save(&t).await.expect("resave");
    let fetched = topic_repo.get(t.id).await.expect("get").expect("row");
    assert_eq!(fetched.item_ids.len(), 2);

    assert_eq!(topic_repo.topic_of_item(a.id).await.expect("lookup"), Some(t.id));
}

#[tokio::test]
async fn topic_upsert_keeps_the_highest_observed_velocity() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let item_repo = db.item_repository();
    let topic_repo = db.topic_repository();

    let a = item("hackernews", "1", "peak story");
    item_repo.save_batch(std::slice::from_ref(&a)).await.expect("items");

    let mut t = topic(&[&a]);
    t.max_velocity = 25.0;
    topic_repo.save(&t).await.expect("save");

    // A later observation with a lower velocity must not erase the peak.
    t.max_velocity = 4.0;
    topic_repo.save(&t).await.expect("resave");
    let stored = topic_repo.get(t.id).await.expect("get").expect("row");
    assert_eq!(stored.max_velocity, 25.0);

    // A new peak replaces the old one.
    t.max_velocity = 40.0;
    topic_repo.save(&t).await.expect("resave");
    let stored = topic_repo.get(t.id).await.expect("get").expect("row");
    assert_eq!(stored.max_velocity, 40.0);
}

#[tokio::test]
async fn trend_listing_is_deterministic_and_filterable() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let item_repo = db.item_repository();
    let topic_repo = db.topic_repository();
    let trend_repo = db.trend_repository();

    let a = item("hackernews", "1", "seed");
    item_repo.save_batch(std::slice::from_ref(&a)).await.expect("items");
    let t = topic(&[&a]);
    topic_repo.save(&t).await.expect("topic");

    let mut trends = vec![
        trend(t.id, 1, 90.0),
        trend(t.id, 2, 70.0),
        trend(t.id, 3, 90.0),
    ];
    trends[1].category = Category::Sports;
    trend_repo.save_batch(&trends).await.expect("trends");

    let all = trend_repo.list(&ListFilter::default()).await.expect("list");
    assert_eq!(all.len(), 3);
    // Stable order: score desc, then id asc.
    assert!(all[0].score >= all[1].score && all[1].score >= all[2].score);
    let ninety: Vec<Uuid> = all.iter().filter(|t| t.score == 90.0).map(|t| t.id).collect();
    let mut sorted = ninety.clone();
    sorted.sort();
    assert_eq!(ninety, sorted);

    let tech_only = ListFilter {
        category: Some(Category::Technology),
        ..Default::default()
    };
    assert_eq!(trend_repo.count(&tech_only).await.expect("count"), 2);

    let by_score = ListFilter {
        min_score: Some(80.0),
        ..Default::default()
    };
    assert_eq!(trend_repo.list(&by_score).await.expect("list").len(), 2);

    let by_source = ListFilter {
        sources: Some(vec!["hackernews".to_owned()]),
        ..Default::default()
    };
    assert_eq!(trend_repo.list(&by_source).await.expect("list").len(), 3);

    let found = trend_repo
        .search(&["trend".to_owned()], 10)
        .await
        .expect("search");
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn plugin_health_upsert_is_atomic_and_repeatable() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let repo = db.plugin_health_repository();

    let mut health = PluginHealth::new("hackernews");
    health.record_failure("boom", Utc::now(), 3, 0.5);
    repo.upsert(&health).await.expect("upsert");
    repo.upsert(&health).await.expect("upsert again");

    let all = repo.get_all().await.expect("all");
    assert_eq!(all.len(), 1);
    let stored = repo.get("hackernews").await.expect("get").expect("row");
    assert_eq!(stored.consecutive_failures, 1);
    assert_eq!(stored.last_error.as_deref(), Some("boom"));

    assert!(repo.delete("hackernews").await.expect("delete"));
    assert!(!repo.delete("hackernews").await.expect("delete twice"));
}

#[tokio::test]
async fn source_names_are_unique() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let repo = db.collector_source_repository();

    let now = Utc::now();
    let source = CollectorSource {
        id: 0,
        name: "tech-feed".to_owned(),
        source_type: SourceType::Rss,
        url: "https://example.com/rss".to_owned(),
        schedule: "0 */15 * * * *".to_owned(),
        rate_limit_per_hour: 60,
        timeout_secs: 30,
        language: Some("en".to_owned()),
        include_keywords: vec![],
        exclude_keywords: vec![],
        auth: None,
        code_body: None,
        enabled: true,
        created_at: now,
        updated_at: now,
    };

    let id = repo.create(&source).await.expect("create");
    assert!(id > 0);
    let duplicate = repo.create(&source).await;
    assert!(matches!(duplicate, Err(Error::Validation { .. })));

    repo.set_enabled("tech-feed", false).await.expect("disable");
    assert!(repo.list_enabled().await.expect("enabled").is_empty());
    assert_eq!(repo.list_all().await.expect("all").len(), 1);

    let missing = repo.set_enabled("nope", true).await;
    assert!(matches!(missing, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn pipeline_runs_round_trip_and_list_newest_first() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let repo = db.pipeline_run_repository();

    let mut first = PipelineRun::start(serde_json::json!({"dedup_threshold": 0.92}));
    first.started_at = Utc::now() - Duration::minutes(10);
    first.items_in = 42;
    first.finish(RunStatus::Completed);
    repo.save(&first).await.expect("save");

    let second = PipelineRun::start(serde_json::json!({}));
    repo.save(&second).await.expect("save");

    let recent = repo.list_recent(10).await.expect("recent");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);

    let stored = repo.get(first.id).await.expect("get").expect("row");
    assert_eq!(stored.items_in, 42);
    assert_eq!(stored.status, RunStatus::Completed);
}

#[tokio::test]
async fn items_without_embeddings_backfill_flow() {
    let db = SqliteDatabase::connect_in_memory().await.expect("connect");
    let repo = db.item_repository();

    let a = item("hackernews", "1", "first");
    let b = item("hackernews", "2", "second");
    repo.save_batch(&[a.clone(), b.clone()]).await.expect("save");

    let pending = repo.get_items_without_embeddings(10).await.expect("pending");
    assert_eq!(pending.len(), 2);

    repo.mark_embedded(&[a.id]).await.expect("mark");
    let pending = repo.get_items_without_embeddings(10).await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, b.id);
}

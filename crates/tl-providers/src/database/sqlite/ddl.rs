//! Schema DDL, applied idempotently at connect time.

/// Full schema. Enums are stored as TEXT and round-trip through strum;
/// keyword and source lists are JSON TEXT columns. The junction index makes
/// `get_items_by_topic` a single indexed scan.
pub const DDL: &str = r"
CREATE TABLE IF NOT EXISTS processed_items (
    id                  TEXT PRIMARY KEY,
    source              TEXT NOT NULL,
    source_id           TEXT NOT NULL,
    url                 TEXT NOT NULL,
    title               TEXT NOT NULL,
    normalized_title    TEXT NOT NULL,
    body                TEXT,
    author              TEXT,
    published_at        TEXT NOT NULL,
    upvotes             INTEGER NOT NULL DEFAULT 0,
    downvotes           INTEGER NOT NULL DEFAULT 0,
    comments            INTEGER NOT NULL DEFAULT 0,
    shares              INTEGER NOT NULL DEFAULT 0,
    views               INTEGER NOT NULL DEFAULT 0,
    category            TEXT NOT NULL,
    language_hint       TEXT,
    language            TEXT NOT NULL,
    language_confidence REAL NOT NULL DEFAULT 0,
    keywords            TEXT NOT NULL DEFAULT '[]',
    sentiment           REAL,
    tags                TEXT NOT NULL DEFAULT '[]',
    processed_at        TEXT NOT NULL,
    embedded            INTEGER NOT NULL DEFAULT 0,
    UNIQUE (source, source_id)
);
CREATE INDEX IF NOT EXISTS idx_items_embedded ON processed_items (embedded);
CREATE INDEX IF NOT EXISTS idx_items_published ON processed_items (published_at);

CREATE TABLE IF NOT EXISTS topics (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    summary      TEXT NOT NULL,
    category     TEXT NOT NULL,
    keywords     TEXT NOT NULL DEFAULT '[]',
    item_count   INTEGER NOT NULL DEFAULT 0,
    upvotes      INTEGER NOT NULL DEFAULT 0,
    downvotes    INTEGER NOT NULL DEFAULT 0,
    comments     INTEGER NOT NULL DEFAULT 0,
    shares       INTEGER NOT NULL DEFAULT 0,
    views        INTEGER NOT NULL DEFAULT 0,
    max_velocity REAL NOT NULL DEFAULT 0,
    first_seen   TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    language     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS topic_items (
    topic_id TEXT NOT NULL REFERENCES topics (id) ON DELETE CASCADE,
    item_id  TEXT NOT NULL REFERENCES processed_items (id) ON DELETE CASCADE,
    PRIMARY KEY (topic_id, item_id)
);
CREATE INDEX IF NOT EXISTS idx_topic_items_topic ON topic_items (topic_id);

CREATE TABLE IF NOT EXISTS trends (
    id         TEXT PRIMARY KEY,
    topic_id   TEXT NOT NULL REFERENCES topics (id) ON DELETE CASCADE,
    rank       INTEGER NOT NULL,
    score      REAL NOT NULL,
    state      TEXT NOT NULL,
    velocity   REAL NOT NULL,
    sources    TEXT NOT NULL DEFAULT '[]',
    language   TEXT NOT NULL,
    title      TEXT NOT NULL,
    summary    TEXT NOT NULL,
    category   TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trends_category_state_score ON trends (category, state, score DESC);
CREATE INDEX IF NOT EXISTS idx_trends_score ON trends (score DESC);
CREATE INDEX IF NOT EXISTS idx_trends_topic ON trends (topic_id);

CREATE TABLE IF NOT EXISTS plugin_health (
    plugin_name          TEXT PRIMARY KEY,
    last_run             TEXT,
    last_success         TEXT,
    last_error           TEXT,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    total_runs           INTEGER NOT NULL DEFAULT 0,
    success_rate         REAL NOT NULL DEFAULT 1.0,
    is_healthy           INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS collector_sources (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL UNIQUE,
    source_type         TEXT NOT NULL,
    url                 TEXT NOT NULL,
    schedule            TEXT NOT NULL,
    rate_limit_per_hour INTEGER NOT NULL DEFAULT 60,
    timeout_secs        INTEGER NOT NULL DEFAULT 30,
    language            TEXT,
    include_keywords    TEXT NOT NULL DEFAULT '[]',
    exclude_keywords    TEXT NOT NULL DEFAULT '[]',
    auth                TEXT,
    code_body           TEXT,
    enabled             INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pipeline_runs (
    id              TEXT PRIMARY KEY,
    started_at      TEXT NOT NULL,
    completed_at    TEXT,
    status          TEXT NOT NULL,
    items_in        INTEGER NOT NULL DEFAULT 0,
    items_out       INTEGER NOT NULL DEFAULT 0,
    topics          INTEGER NOT NULL DEFAULT 0,
    trends          INTEGER NOT NULL DEFAULT 0,
    errors          TEXT NOT NULL DEFAULT '[]',
    config_snapshot TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_runs_started ON pipeline_runs (started_at DESC);
";

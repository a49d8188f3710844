//! Retry defaults for provider API requests.

use std::time::Duration;

/// Default retry count for embedding API requests.
pub const EMBEDDING_RETRY_COUNT: u32 = 3;

/// Default retry backoff for embedding API requests.
pub const EMBEDDING_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Default retry count for collector network calls.
pub const COLLECTOR_RETRY_COUNT: u32 = 3;

/// Base delay for collector retry backoff (doubles per attempt).
pub const COLLECTOR_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default per-HTTP-request timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-sandbox-invocation wall-clock budget.
pub const SANDBOX_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-embedding-batch timeout.
pub const EMBEDDING_BATCH_TIMEOUT: Duration = Duration::from_secs(120);

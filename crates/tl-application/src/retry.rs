//! Backoff retry helper.
//!
//! One helper parameterized by `(max_attempts, base_delay, retry_on)` and
//! applied at call sites, instead of retry logic woven into method bodies.

use std::future::Future;
use std::time::Duration;

use tl_domain::error::{Error, Result};

/// Run `op` up to `max_attempts` times, sleeping `base_delay * 2^attempt`
/// between attempts. Only errors for which `retry_on` returns true are
/// retried; a server-advertised retry-after overrides the computed delay.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or immediately for
/// errors `retry_on` rejects.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    retry_on: fn(&Error) -> bool,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts || !retry_on(&err) {
                    return Err(err);
                }
                let delay = err
                    .retry_after()
                    .unwrap_or_else(|| base_delay * 2u32.saturating_pow(attempt - 1));
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

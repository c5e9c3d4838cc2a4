//! Database Retry Logic
//!
//! Re-runs a whole read-modify-write transaction when it loses a race:
//! either the song's revision moved under it (compare-and-set conflict) or
//! SQLite reported lock contention. Any other error is returned at once.
//!
//! **Backoff Strategy:**
//! - Initial delay: 10ms
//! - Max delay: 1000ms
//! - Multiplier: 2.0 (exponential)

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default total time budget for retries
pub const DEFAULT_MAX_WAIT_MS: u64 = 5000;

/// Errors that may succeed when the operation is simply run again
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for lyra_common::Error {
    fn is_transient(&self) -> bool {
        lyra_common::Error::is_transient(self)
    }
}

/// Retry an operation with exponential backoff until `max_wait_ms` elapses.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "reconcile callback")
/// * `max_wait_ms` - Maximum total time to keep retrying
/// * `operation` - Async closure performing one complete attempt
///
/// # Returns
/// Result of the first non-transient outcome, or the last transient error
/// once the budget is spent.
pub async fn retry_on_conflict<F, Fut, T, E>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying database operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        error = %err,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Transient database error, backing off"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

//! Fixed-interval retry for idempotent calls.

use std::future::Future;
use std::time::Duration;

/// How often and how long to retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            wait: Duration::from_secs(5),
        }
    }
}

/// Run `op` up to `max_attempts` times with a fixed wait between attempts,
/// returning the first success or the final error.
///
/// Every error is treated as retryable and response status codes are never
/// inspected, so this is only safe for idempotent calls — the dispatcher's
/// re-enqueue is the retry path for hand-off POSTs.
pub async fn with_retry<T, E, F, Fut>(options: RetryOptions, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt in 1..=options.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt < options.max_attempts {
                    tokio::time::sleep(options.wait).await;
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt was made"))
}

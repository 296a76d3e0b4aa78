// Only idempotent reads go through here. A mutating submission is never
// retried: resubmitting it could apply it twice.

use crate::error::ClientError;
use crate::orchestrator::Clock;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt, doubled after each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Run `request` until it succeeds, fails permanently or attempts run out
pub async fn retry_idempotent<T, F, Fut>(
    clock: &dyn Clock,
    policy: RetryPolicy,
    what: &str,
    mut request: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut delay = policy.backoff;
    let mut attempt = 1;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                log::warn!(
                    "{} failed on attempt {}/{} ({}), retrying in {:?}",
                    what,
                    attempt,
                    policy.attempts,
                    err,
                    delay
                );
                clock.sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PausedClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_idempotent(
            &PausedClock::new(),
            RetryPolicy::new(3, Duration::from_millis(25)),
            "balance",
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::Busy)
                } else {
                    Ok(7u64)
                }
            },
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = retry_idempotent(
            &PausedClock::new(),
            RetryPolicy::new(2, Duration::from_millis(25)),
            "info",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Unavailable("down".into()))
            },
        )
        .await;
        assert!(matches!(result, Err(ClientError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = retry_idempotent(
            &PausedClock::new(),
            RetryPolicy::new(5, Duration::from_millis(25)),
            "info",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Transport("connection reset".into()))
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

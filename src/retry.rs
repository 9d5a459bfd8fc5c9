//! Generic retry policy with cancellable inter-attempt delays.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{SalesforceError, SalesforceResult};

/// Retry policy configuration.
///
/// Salesforce request retries use a fixed budget and a fixed inter-attempt
/// delay. Errors whose [`SalesforceError::is_retryable`] is false short-
/// circuit the loop and are raised to the caller unchanged.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts (initial call included).
    pub attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and delay.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Runs `f` until it succeeds, a non-retryable error occurs, or the
    /// attempt budget is exhausted.
    ///
    /// The delay between attempts aborts immediately if `shutdown` is
    /// cancelled, returning [`SalesforceError::Cancelled`] so session
    /// teardown is never blocked on a pending sleep.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        shutdown: &CancellationToken,
        mut f: F,
    ) -> SalesforceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SalesforceResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => {
                    if attempt >= self.attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %error,
                            "Retry budget exhausted"
                        );
                        return Err(SalesforceError::MaxRetriesExceeded {
                            attempts: attempt,
                            message: format!("{operation_name}: {error}"),
                        });
                    }

                    debug!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.attempts,
                        delay_secs = self.interval.as_secs(),
                        error = %error,
                        "Retrying after transient error"
                    );
                    cancellable_sleep(self.interval, shutdown).await?;
                }
            }
        }
    }
}

/// Sleeps for `duration`, aborting immediately when `shutdown` fires.
pub async fn cancellable_sleep(
    duration: Duration,
    shutdown: &CancellationToken,
) -> SalesforceResult<()> {
    tokio::select! {
        () = shutdown.cancelled() => Err(SalesforceError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let shutdown = CancellationToken::new();
        let result = fast_policy()
            .execute("op", &shutdown, || async { Ok::<_, SalesforceError>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let shutdown = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = fast_policy()
            .execute("op", &shutdown, move || {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(SalesforceError::Server { status: 503 })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_raised_after_one_attempt() {
        let shutdown = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: SalesforceResult<()> = fast_policy()
            .execute("op", &shutdown, move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SalesforceError::RateLimited {
                        details: "REQUEST_LIMIT_EXCEEDED".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(SalesforceError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let shutdown = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: SalesforceResult<()> = fast_policy()
            .execute("op", &shutdown, move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SalesforceError::Server { status: 500 })
                }
            })
            .await;

        match result {
            Err(SalesforceError::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_pending_delay() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let started = std::time::Instant::now();
        let result: SalesforceResult<()> = policy
            .execute("op", &shutdown, || async {
                Err(SalesforceError::Server { status: 500 })
            })
            .await;

        assert!(matches!(result, Err(SalesforceError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellable_sleep_completes_when_not_cancelled() {
        let shutdown = CancellationToken::new();
        assert!(cancellable_sleep(Duration::from_millis(1), &shutdown)
            .await
            .is_ok());
    }
}

//! Shared utilities for use cases.
//!
//! Cancellation checks and the bounded retry wrapper used for every external
//! call (classification, generation, embedding, search).

use crate::ports::language_provider::ProviderError;
use crate::ports::vector_store::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bounded retry with exponential backoff and a per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (`attempt` starts at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Error types [`call_with_retry`] can classify.
pub trait RetryableError: std::fmt::Display {
    fn is_retryable(&self) -> bool;
    fn timed_out() -> Self;
    fn cancelled() -> Self;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }

    fn timed_out() -> Self {
        ProviderError::Timeout
    }

    fn cancelled() -> Self {
        ProviderError::Cancelled
    }
}

impl RetryableError for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }

    fn timed_out() -> Self {
        StoreError::Timeout
    }

    fn cancelled() -> Self {
        StoreError::Cancelled
    }
}

/// Check if cancellation has been requested.
pub(crate) fn check_cancelled<E: RetryableError>(token: &CancellationToken) -> Result<(), E> {
    if token.is_cancelled() {
        return Err(E::cancelled());
    }
    Ok(())
}

/// Run `op` under a timeout, retrying retryable errors with backoff.
///
/// A timeout counts as the error type's timeout variant. Cancellation wins
/// over any in-flight attempt or pending backoff.
pub async fn call_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        check_cancelled::<E>(cancel)?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(E::cancelled()),
            r = tokio::time::timeout(policy.call_timeout, op()) => match r {
                Ok(r) => r,
                Err(_) => Err(E::timed_out()),
            },
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}ms",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(E::cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(1),
            call_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<i32, ProviderError> = call_with_retry(&fast(3), &CancellationToken::new(), "op", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Unreachable("down".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = call_with_retry(&fast(2), &CancellationToken::new(), "op", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Timeout)
            }
        })
        .await;
        assert_eq!(result, Err(ProviderError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = call_with_retry(&fast(5), &CancellationToken::new(), "op", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Malformed("not json".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
            call_timeout: Duration::from_millis(10),
        };
        let result: Result<(), ProviderError> = call_with_retry(&policy, &CancellationToken::new(), "slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_store_errors_share_policy() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), StoreError> = call_with_retry(&fast(3), &CancellationToken::new(), "search", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::NotFound("k".into()))
            }
        })
        .await;
        assert_eq!(result, Err(StoreError::NotFound("k".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<i32, ProviderError> =
            call_with_retry(&fast(3), &token, "op", || async { Ok(1) }).await;
        assert_eq!(result, Err(ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_call() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let policy = RetryPolicy {
            call_timeout: Duration::from_secs(10),
            ..fast(1)
        };
        let result: Result<(), ProviderError> = call_with_retry(&policy, &token, "op", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ProviderError::Cancelled));
    }
}

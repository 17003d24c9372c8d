//! Resilience primitives for provider clients.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::error::{ProviderError, ProviderResult};

/// Per-provider global rate limiter.
///
/// Keeps the timestamp of the last dispatched request and makes each
/// caller sleep until the configured minimum gap has elapsed. The
/// timestamp lives behind a single mutex that is held across the sleep,
/// so concurrent callers queue up and dispatch strictly one gap apart.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    last_dispatch: Arc<Mutex<Option<Instant>>>,
    interval: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` enforcing `interval` between dispatches.
    pub fn new(interval: Duration) -> Self {
        Self {
            last_dispatch: Arc::new(Mutex::new(None)),
            interval,
        }
    }

    /// Waits until the minimum inter-request gap has elapsed, then records
    /// the dispatch time and returns.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            sleep_until(prev + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// Retry policy shared by all provider clients: 3 attempts total with
/// 1s then 2s delays between them, retrying transient errors only.
fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_factor(2.0)
        .with_max_times(2)
}

/// Run a rate-limited provider call with retries.
///
/// The rate-limit wait is re-applied before every attempt, including
/// retries, so backoff sleeps never let a retry jump the provider's
/// request cadence.
pub async fn call_with_retry<T, F, Fut>(
    limiter: &RateLimiter,
    operation: F,
) -> ProviderResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let attempt = || async {
        limiter.acquire().await;
        operation().await
    };
    attempt
        .retry(retry_policy())
        .when(ProviderError::is_transient)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_enforces_minimum_gap() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let mut dispatches = Vec::new();
        for _ in 0..4 {
            limiter.acquire().await;
            dispatches.push(Instant::now());
        }
        for pair in dispatches.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_sleep() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let limiter = RateLimiter::new(Duration::from_millis(250));
        let calls = AtomicU32::new(0);

        let result = call_with_retry(&limiter, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::Http {
                    provider: "test".to_string(),
                    message: "503".to_string(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_three_attempts() {
        let limiter = RateLimiter::new(Duration::from_millis(250));
        let calls = AtomicU32::new(0);

        let result: ProviderResult<u32> = call_with_retry(&limiter, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Http {
                provider: "test".to_string(),
                message: "503".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_failure_is_not_retried() {
        let limiter = RateLimiter::new(Duration::from_millis(250));
        let calls = AtomicU32::new(0);

        let result: ProviderResult<u32> = call_with_retry(&limiter, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Parse {
                provider: "test".to_string(),
                message: "bad shape".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Retry engine: exponential backoff with jitter over retryable errors.
//!
//! Only errors whose [`Error::retryable`] is true are retried. A server
//! `retry_after` hint is honored verbatim when it fits under
//! [`RetryPolicy::max_delay`]; a hint above the cap fails immediately
//! rather than oversleeping.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use agentry::retry::{RetryPolicy, retry};
//!
//! # async fn example() -> agentry::Result<()> {
//! let policy = RetryPolicy::default()
//!     .with_max_retries(3)
//!     .with_base_delay(Duration::from_millis(250));
//!
//! let value = retry(&policy, || async {
//!     Ok::<_, agentry::Error>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Callback invoked before each retry sleep: `(error, attempt, delay)`.
/// `attempt` is 1-based.
pub type RetryCallback = Arc<dyn Fn(&Error, u32, Duration) + Send + Sync>;

/// Configuration for automatic retries.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (2 means up to 3 attempts total).
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Ceiling for any computed or server-suggested delay.
    pub max_delay: Duration,

    /// Backoff growth factor per attempt.
    pub backoff_multiplier: f64,

    /// Multiply each delay by a uniform factor in `[0.5, 1.5)`.
    pub jitter: bool,

    /// Observer hook for retry attempts.
    pub on_retry: Option<RetryCallback>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "callback"))
            .finish()
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_on_retry(mut self, callback: RetryCallback) -> Self {
        self.on_retry = Some(callback);
        self
    }
}

/// Delay for a given retry attempt (0-indexed):
/// `min(base * multiplier^attempt, max_delay)`, optionally jittered.
pub fn delay_for_attempt(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponential =
        policy.base_delay.as_secs_f64() * policy.backoff_multiplier.powi(attempt as i32);
    let mut delay = exponential.min(policy.max_delay.as_secs_f64());
    if policy.jitter {
        delay *= rand::thread_rng().gen_range(0.5..1.5);
    }
    Duration::from_secs_f64(delay.max(0.0))
}

/// Execute `operation` with retry logic per the policy.
///
/// Non-retryable errors propagate immediately. A `retry_after` hint
/// beyond `max_delay` also propagates immediately.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.retryable() || attempt >= policy.max_retries {
                    return Err(error);
                }

                let retry_after = error.retry_after();
                if let Some(seconds) = retry_after {
                    if seconds > policy.max_delay.as_secs_f64() {
                        return Err(error);
                    }
                }

                let wait = match retry_after {
                    Some(seconds) => Duration::from_secs_f64(seconds.max(0.0)),
                    None => delay_for_attempt(attempt, policy),
                };

                log::warn!(
                    "retrying after error (attempt {}/{}, waiting {:?}): {}",
                    attempt + 1,
                    policy.max_retries,
                    wait,
                    error
                );
                if let Some(callback) = &policy.on_retry {
                    callback(&error, attempt + 1, wait);
                }

                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderFailure;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server_error() -> Error {
        Error::Server(ProviderFailure::new("boom", "test"))
    }

    fn auth_error() -> Error {
        Error::Authentication(ProviderFailure::new("bad key", "test"))
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(10))
            .with_jitter(false)
    }

    #[test]
    fn test_delay_growth_without_jitter() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(delay_for_attempt(0, &policy), Duration::from_secs(1));
        assert_eq!(delay_for_attempt(1, &policy), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(2, &policy), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(15))
            .with_jitter(false);
        assert_eq!(delay_for_attempt(5, &policy), Duration::from_secs(15));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(true);
        for _ in 0..100 {
            let delay = delay_for_attempt(0, &policy).as_secs_f64();
            assert!((1.0..3.0).contains(&delay), "delay out of range: {delay}");
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let result = retry(&fast_policy(3), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_on_first_attempt() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = retry(&fast_policy(3), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(auth_error()) }
        })
        .await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = retry(&fast_policy(2), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_after_beyond_max_delay_fails_immediately() {
        let attempts = AtomicUsize::new(0);
        let policy = fast_policy(3).with_max_delay(Duration::from_secs(1));
        let result: Result<()> = retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::RateLimit(ProviderFailure {
                    retry_after: Some(30.0),
                    ..ProviderFailure::new("slow down", "test")
                }))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::RateLimit(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_after_is_honored() {
        let attempts = AtomicUsize::new(0);
        let start = std::time::Instant::now();
        let result = retry(&fast_policy(2), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(Error::RateLimit(ProviderFailure {
                        retry_after: Some(0.05),
                        ..ProviderFailure::new("slow down", "test")
                    }))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_on_retry_callback_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = calls.clone();
        let policy = fast_policy(2).with_on_retry(Arc::new(move |_, attempt, _| {
            observed.fetch_add(attempt as usize, Ordering::SeqCst);
        }));

        let attempts = AtomicUsize::new(0);
        let _ = retry(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok(())
                }
            }
        })
        .await;

        // Attempts 1 and 2 were reported.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

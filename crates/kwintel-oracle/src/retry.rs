//! Retry policy shared by every oracle caller.
//!
//! Transport failures (network, non-2xx, empty answer) sleep
//! `backoff_base_secs * 2^attempt` before the next attempt. Unparseable or
//! mis-shaped answers are retried straight away. Configuration errors are
//! returned on the spot. No sleep happens after the final attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::OracleError;

/// Cap on the exponent so extreme attempt counts cannot overflow the shift.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    RetryNow,
    RetryAfterBackoff,
}

/// Classify an error for retry purposes.
#[must_use]
pub fn decide(err: &OracleError) -> RetryDecision {
    match err {
        OracleError::InvalidConfig(_) => RetryDecision::Stop,
        OracleError::Format { .. } | OracleError::Schema { .. } => RetryDecision::RetryNow,
        OracleError::Http(_)
        | OracleError::UnexpectedStatus { .. }
        | OracleError::EmptyResponse => RetryDecision::RetryAfterBackoff,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 1,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base_secs,
        }
    }

    /// Sleep before the attempt following zero-based `attempt`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(MAX_BACKOFF_EXPONENT);
        Duration::from_secs(self.backoff_base_secs.saturating_mul(factor))
    }

    /// Run `operation` until it succeeds, fails with a non-retriable error, or
    /// `max_attempts` is exhausted. The last error is returned on exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the final [`OracleError`] when no attempt succeeded.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let decision = decide(&err);
            let remaining = max_attempts - attempt - 1;

            tracing::warn!(
                operation = label,
                attempt = attempt + 1,
                max_attempts,
                error = %err,
                "oracle attempt failed"
            );

            if decision == RetryDecision::Stop || remaining == 0 {
                return Err(err);
            }

            if decision == RetryDecision::RetryAfterBackoff {
                let delay = self.backoff_delay(attempt);
                tracing::debug!(
                    operation = label,
                    delay_secs = delay.as_secs(),
                    "backing off before next oracle attempt"
                );
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn no_wait(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 0)
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(3, 1);
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(3, u64::MAX);
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, 1).max_attempts, 1);
    }

    #[test]
    fn decisions_by_error_kind() {
        assert_eq!(
            decide(&OracleError::InvalidConfig("bad url".into())),
            RetryDecision::Stop
        );
        assert_eq!(
            decide(&OracleError::format("classify", "not json")),
            RetryDecision::RetryNow
        );
        assert_eq!(
            decide(&OracleError::schema("classify", "missing results")),
            RetryDecision::RetryNow
        );
        assert_eq!(
            decide(&OracleError::UnexpectedStatus {
                status: 503,
                body: String::new()
            }),
            RetryDecision::RetryAfterBackoff
        );
        assert_eq!(
            decide(&OracleError::EmptyResponse),
            RetryDecision::RetryAfterBackoff
        );
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = no_wait(3)
            .run("test", || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, OracleError>(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_format_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = no_wait(3)
            .run("test", || {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(OracleError::format("test", "garbage"))
                    } else {
                        Ok::<u32, OracleError>(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = no_wait(3)
            .run("test", || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(OracleError::UnexpectedStatus {
                        status: 503,
                        body: "overloaded".into(),
                    })
                }
            })
            .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            3,
            "max_attempts=3 means 3 calls"
        );
        assert!(matches!(
            result,
            Err(OracleError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_invalid_config() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = no_wait(3)
            .run("test", || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(OracleError::InvalidConfig("bad".into()))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(OracleError::InvalidConfig(_))));
    }

    async fn run_always_failing(
        policy: RetryPolicy,
        err: fn() -> OracleError,
    ) -> (u32, Duration) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = policy
            .run("test", || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(err())
                }
            })
            .await;
        assert!(result.is_err());
        (calls.load(Ordering::SeqCst), started.elapsed())
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_sleep_exponentially_between_attempts() {
        let (calls, elapsed) =
            run_always_failing(RetryPolicy::new(3, 1), || OracleError::EmptyResponse).await;
        assert_eq!(calls, 3);
        assert_eq!(
            elapsed,
            Duration::from_secs(1 + 2),
            "no sleep after the final attempt"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn format_failures_retry_without_sleeping() {
        let (calls, elapsed) = run_always_failing(RetryPolicy::new(3, 1), || {
            OracleError::format("test", "garbage")
        })
        .await;
        assert_eq!(calls, 3);
        assert_eq!(elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let (calls, elapsed) =
            run_always_failing(RetryPolicy::new(1, 5), || OracleError::EmptyResponse).await;
        assert_eq!(calls, 1);
        assert_eq!(elapsed, Duration::ZERO);
    }
}

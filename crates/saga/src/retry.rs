//! Retry with exponential backoff for calls to remote services.
//!
//! Every remote call the saga makes goes through a [`RetryPolicy`]. An
//! attempt is bounded by `start_to_close`; failures are classified by
//! [`ErrorKind`] and either retried after a backoff delay or surfaced at once.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a remote call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The service is down or refused the call.
    Unavailable,
    /// The call was lost on the way.
    Network,
    /// The attempt ran past its start-to-close limit.
    Timeout,
    /// The requested pizza is not on the menu.
    UnknownPizza,
    /// The customer could not be resolved.
    UnknownCustomer,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::Network => "Network",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::UnknownPizza => "UnknownPizza",
            ErrorKind::UnknownCustomer => "UnknownCustomer",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }
}

/// A successful call and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why a call was given up on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    /// The error kind is never retried.
    #[error("non-retryable error after {attempts} attempt(s): {error}")]
    NonRetryable { error: RemoteError, attempts: u32 },

    /// Every allowed attempt failed.
    #[error("gave up after {attempts} attempt(s): {error}")]
    Exhausted { error: RemoteError, attempts: u32 },
}

impl CallFailure {
    /// The last error seen.
    pub fn error(&self) -> &RemoteError {
        match self {
            CallFailure::NonRetryable { error, .. } | CallFailure::Exhausted { error, .. } => error,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CallFailure::NonRetryable { attempts, .. } | CallFailure::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error().kind
    }
}

/// How a remote call is attempted and retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub start_to_close: Duration,
    pub non_retryable: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            max_attempts: 5,
            start_to_close: Duration::from_secs(60),
            non_retryable: [ErrorKind::UnknownPizza, ErrorKind::UnknownCustomer]
                .into_iter()
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_start_to_close(mut self, limit: Duration) -> Self {
        self.start_to_close = limit;
        self
    }

    /// Attempts allowed in total. Never less than one.
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        !self.non_retryable.contains(&kind)
    }

    /// Delay before the retry that follows failed attempt number `attempt`.
    ///
    /// `min(initial × multiplier^(attempt-1), max_interval)`; a multiplier
    /// below 1 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() {
            self.backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * multiplier.powi(exponent);
        let cap = self.max_interval.as_secs_f64();

        if secs.is_finite() && secs < cap {
            Duration::from_secs_f64(secs)
        } else {
            self.max_interval
        }
    }

    /// Runs `call` until it succeeds, fails with a non-retryable kind, or
    /// runs out of attempts.
    ///
    /// Backoff uses `tokio::time::sleep`, so a waiting call never blocks
    /// other tasks.
    pub async fn execute<T, F, Fut>(
        &self,
        call_name: &str,
        mut call: F,
    ) -> Result<Attempted<T>, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let limit = self.attempt_limit();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.start_to_close, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RemoteError::new(
                    ErrorKind::Timeout,
                    format!("{call_name} did not finish within {:?}", self.start_to_close),
                )),
            };

            let error = match outcome {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            if !self.is_retryable(error.kind) {
                return Err(CallFailure::NonRetryable {
                    error,
                    attempts: attempt,
                });
            }

            if attempt >= limit {
                return Err(CallFailure::Exhausted {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                call = call_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "remote call failed, retrying"
            );
            metrics::counter!("remote_call_retries_total", "call" => call_name.to_owned())
                .increment(1);

            tokio::time::sleep(delay).await;
        }
    }
}

/// One policy per kind of remote call the saga makes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPolicies {
    pub menu: RetryPolicy,
    pub directory: RetryPolicy,
}

impl StepPolicies {
    /// The same policy for every call.
    pub fn uniform(policy: RetryPolicy) -> Self {
        Self {
            menu: policy.clone(),
            directory: policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails with `kind` for the first `failures` calls, then returns the call number.
    fn flaky(
        calls: &Arc<AtomicU32>,
        failures: u32,
        kind: ErrorKind,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, RemoteError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                std::future::ready(Err(RemoteError::new(kind, format!("call {n} failed"))))
            } else {
                std::future::ready(Ok(n))
            }
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.max_interval, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.start_to_close, Duration::from_secs(60));
        assert!(!policy.is_retryable(ErrorKind::UnknownPizza));
        assert!(!policy.is_retryable(ErrorKind::UnknownCustomer));
        assert!(policy.is_retryable(ErrorKind::Unavailable));
        assert!(policy.is_retryable(ErrorKind::Timeout));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_multiplier_below_one_is_clamped() {
        let policy = RetryPolicy::default().with_backoff_multiplier(0.5);
        assert_eq!(policy.delay_for(4), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).attempt_limit(), 1);
    }

    #[test]
    fn test_remote_error_display() {
        let error = RemoteError::new(
            ErrorKind::UnknownPizza,
            "You requested pizza 9, which is not on the menu",
        );
        assert_eq!(
            error.to_string(),
            "UnknownPizza: You requested pizza 9, which is not on the menu"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::default()
            .execute("lookup_pizza", flaky(&calls, 0, ErrorKind::Unavailable))
            .await
            .unwrap();
        assert_eq!(result, Attempted { value: 1, attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = RetryPolicy::default()
            .execute("lookup_pizza", flaky(&calls, 3, ErrorKind::Unavailable))
            .await
            .unwrap();

        assert_eq!(result.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let failure = RetryPolicy::default()
            .execute("lookup_customer", flaky(&calls, u32::MAX, ErrorKind::Network))
            .await
            .unwrap_err();

        assert!(matches!(failure, CallFailure::Exhausted { attempts: 5, .. }));
        assert_eq!(failure.kind(), ErrorKind::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let failure = RetryPolicy::default()
            .execute("lookup_pizza", flaky(&calls, u32::MAX, ErrorKind::UnknownPizza))
            .await
            .unwrap_err();

        assert!(matches!(failure, CallFailure::NonRetryable { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default()
            .with_start_to_close(Duration::from_secs(5))
            .with_max_attempts(2);

        let counter = Arc::clone(&calls);
        let failure = policy
            .execute("lookup_pizza", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<_, RemoteError>(())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Timeout);
        assert_eq!(failure.attempts(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

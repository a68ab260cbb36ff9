//! Retry policy and executor
//!
//! Transient failures (store unreachable, upstream timeout) are retried a
//! bounded number of times with exponential backoff. Validation-class
//! errors are never retried: retrying a request that can never succeed
//! only wastes the retry budget.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::backoff::{BackoffCalculator, BackoffStrategy};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (the first attempt included)
    pub max_attempts: u32,

    /// Delay before the second attempt; later delays grow from here
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Cap on any single backoff delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential { base: 2.0 },
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Doubling backoff with the given attempt bound and base delay
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Calculate the delay that precedes attempt `attempt + 1`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let calculator = BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.base_delay,
            self.max_delay,
            self.jitter,
        );

        calculator.calculate_delay(attempt)
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether this error is worth retrying
    fn is_retryable(&self) -> bool;

    /// Custom retry delay for this error type (e.g. a server-provided
    /// retry-after hint), overriding the policy's backoff
    fn retry_delay(&self) -> Option<Duration> {
        None
    }
}

/// Transient store errors are always retryable
impl Retryable for marque_interfaces::KvError {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Maximum retry attempts exceeded
    #[error("maximum retry attempts ({attempts}) exceeded, last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Non-retryable error encountered
    #[error("non-retryable error: {0}")]
    NonRetryableError(E),

    /// Circuit breaker is open
    #[error("circuit breaker '{name}' is open")]
    CircuitBreakerOpen { name: String },
}

impl<E> RetryError<E> {
    /// Get the underlying error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => Some(last_error),
            RetryError::NonRetryableError(error) => Some(error),
            RetryError::CircuitBreakerOpen { .. } => None,
        }
    }

    /// Check if this represents a circuit breaker open error
    pub fn is_circuit_breaker_open(&self) -> bool {
        matches!(self, RetryError::CircuitBreakerOpen { .. })
    }
}

/// Retry executor
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Create with the default policy
    pub fn with_default_policy() -> Self {
        Self::new(RetryPolicy::default())
    }

    /// The policy this executor runs under
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry
    ///
    /// Attempt 1 runs immediately; attempt n waits for the policy's
    /// backoff first. Exhaustion re-raises the last error annotated with
    /// the attempt count.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            debug!("executing attempt {} of {}", attempt, self.policy.max_attempts);

            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        warn!("operation failed with non-retryable error: {}", error);
                        return Err(RetryError::NonRetryableError(error));
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!("operation failed after {} attempts: {}", attempt, error);
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = error
                        .retry_delay()
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));

                    warn!("attempt {} failed: {}. retrying in {:?}", attempt, error, delay);
                    sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }

    /// Execute with per-attempt circuit breaker protection
    ///
    /// Every attempt consults the breaker before running, so a retry
    /// sequence against an already-open circuit degrades to fast
    /// repeated failures instead of repeated blocking calls. Each
    /// attempt's outcome is recorded against the breaker.
    pub async fn execute_with_circuit_breaker<F, Fut, T, E>(
        &self,
        mut f: F,
        circuit_breaker: &CircuitBreaker,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            match circuit_breaker.execute(&mut f).await {
                Ok(result) => return Ok(result),
                Err(CircuitBreakerError::Open { name }) => {
                    // fast failure, the operation never ran; the circuit
                    // may close once its reset timeout elapses, so later
                    // attempts still get their chance
                    if attempt >= self.policy.max_attempts {
                        return Err(RetryError::CircuitBreakerOpen { name });
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        "attempt {} rejected by open circuit '{}', retrying in {:?}",
                        attempt, name, delay
                    );
                    sleep(delay).await;
                }
                Err(CircuitBreakerError::Operation(error)) => {
                    if !error.is_retryable() {
                        warn!("operation failed with non-retryable error: {}", error);
                        return Err(RetryError::NonRetryableError(error));
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!("operation failed after {} attempts: {}", attempt, error);
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = error
                        .retry_delay()
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));

                    warn!("attempt {} failed: {}. retrying in {:?}", attempt, error, delay);
                    sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
        message: String,
    }

    impl TestError {
        fn transient(message: impl Into<String>) -> Self {
            Self {
                retryable: true,
                message: message.into(),
            }
        }

        fn permanent(message: impl Into<String>) -> Self {
            Self {
                retryable: false,
                message: message.into(),
            }
        }
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(fast_policy(3));

        let result = executor
            .execute(|| {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if count < 2 {
                        Err(TestError::transient("temporary failure"))
                    } else {
                        Ok("success".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_max_attempts_exceeded() {
        let executor = RetryExecutor::new(fast_policy(2));

        let result: Result<(), RetryError<TestError>> = executor
            .execute(|| async { Err(TestError::transient("always fails")) })
            .await;

        match result.unwrap_err() {
            RetryError::MaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(fast_policy(5));

        let result: Result<(), RetryError<TestError>> = executor
            .execute(|| {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                async { Err(TestError::permanent("validation failed")) }
            })
            .await;

        assert!(matches!(result.unwrap_err(), RetryError::NonRetryableError(_)));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_breaker_composition_records_attempts() {
        let breaker = CircuitBreaker::new(
            "upstream",
            CircuitBreakerConfig::new(5, Duration::from_secs(60)),
        );
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(fast_policy(3));

        let result = executor
            .execute_with_circuit_breaker(
                || {
                    let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                    async move {
                        if count < 2 {
                            Err(TestError::transient("flaky"))
                        } else {
                            Ok(7)
                        }
                    }
                },
                &breaker,
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        // two failing attempts were recorded, the final success reset
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.metrics().total_failures, 2);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_invoking() {
        let breaker = CircuitBreaker::new(
            "upstream",
            CircuitBreakerConfig::new(1, Duration::from_secs(60)),
        );
        breaker.record_failure();
        assert!(breaker.is_open());

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<(), RetryError<TestError>> = executor
            .execute_with_circuit_breaker(
                || {
                    counter_clone.fetch_add(1, Ordering::Relaxed);
                    async { Ok(()) }
                },
                &breaker,
            )
            .await;

        assert!(result.unwrap_err().is_circuit_breaker_open());
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}

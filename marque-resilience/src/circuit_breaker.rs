//! Circuit breaker pattern implementation
//!
//! One breaker protects one named downstream dependency (the trademark
//! registries, the billing provider, the recommendation API, ...). After
//! enough consecutive failures the breaker opens and callers fail fast
//! without touching the dependency; after a cool-down the next check
//! admits a probe, and a successful probe closes the circuit again.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker state
///
/// There is no explicit half-open variant: once the reset timeout has
/// elapsed the breaker reports `Closed` and the next call through it is
/// the recovery probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests pass through normally
    Closed,
    /// Requests are rejected without invoking the dependency
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Circuit breaker configuration
///
/// Both fields are required: a dependency with no configured tolerance
/// should fail at wiring time, not silently inherit a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Cool-down before a recovery probe is admitted
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
        }
    }
}

/// Lifetime counters for a breaker instance
#[derive(Debug, Clone, Default)]
pub struct CircuitMetrics {
    /// Number of successful calls
    pub total_successes: u64,
    /// Number of failed calls
    pub total_failures: u64,
    /// Number of calls rejected while the circuit was open
    pub total_rejected: u64,
    /// Last state change time
    pub last_state_change: Option<Instant>,
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was never invoked
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The operation ran and failed; the original error is re-raised
    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// Get the underlying operation error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Open { .. } => None,
            CircuitBreakerError::Operation(error) => Some(error),
        }
    }

    /// Check whether this is the synthetic circuit-open rejection
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }
}

/// Thread-safe circuit breaker for one named dependency
///
/// Cloning is cheap and clones share state, so a breaker can be handed
/// to every caller of the dependency it protects.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
}

#[derive(Debug)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
    /// Set when the lazy check has admitted a recovery probe and the
    /// probe's outcome has not been recorded yet
    probing: bool,
    metrics: CircuitMetrics,
}

impl CircuitBreaker {
    /// Create a new breaker for the named dependency
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState {
                failure_count: 0,
                last_failure: None,
                probing: false,
                metrics: CircuitMetrics::default(),
            })),
        }
    }

    /// Name of the protected dependency
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation through the breaker
    ///
    /// When the circuit is open the operation is never invoked and the
    /// call fails immediately with [`CircuitBreakerError::Open`]. A
    /// success resets the failure count; a failure increments it and
    /// restarts the cool-down from now.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock();
            if self.check_and_maybe_reset(&mut state) == CircuitState::Open {
                state.metrics.total_rejected += 1;
                return Err(CircuitBreakerError::Open {
                    name: self.name.to_string(),
                });
            }
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(CircuitBreakerError::Operation(error))
            }
        }
    }

    /// Check if the circuit is open (requests should be rejected)
    ///
    /// Reading the state can mutate it: this performs the lazy
    /// open-to-probe transition when the reset timeout has elapsed.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Get the current state, applying the lazy transition first
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.check_and_maybe_reset(&mut state)
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Get a snapshot of the lifetime counters
    pub fn metrics(&self) -> CircuitMetrics {
        self.state.lock().metrics.clone()
    }

    /// Record a successful call outcome
    ///
    /// Public so that compositions that invoke the dependency themselves
    /// (e.g. the retry executor) can report per-attempt outcomes.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.metrics.total_successes += 1;
        state.probing = false;
        if state.failure_count >= self.config.failure_threshold {
            // recovery probe succeeded
            state.metrics.last_state_change = Some(Instant::now());
            log::info!("circuit breaker '{}' closed after successful probe", self.name);
        }
        state.failure_count = 0;
    }

    /// Record a failed call outcome
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let was_probing = std::mem::take(&mut state.probing);
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());
        state.metrics.total_failures += 1;
        if was_probing {
            state.metrics.last_state_change = Some(Instant::now());
            log::warn!(
                "circuit breaker '{}' re-opened after failed recovery probe",
                self.name
            );
        } else if state.failure_count == self.config.failure_threshold {
            state.metrics.last_state_change = Some(Instant::now());
            log::warn!(
                "circuit breaker '{}' opened after {} consecutive failures",
                self.name,
                state.failure_count
            );
        }
    }

    /// Record a rejection made outside [`CircuitBreaker::execute`]
    pub fn record_rejection(&self) {
        self.state.lock().metrics.total_rejected += 1;
    }

    /// Manually reset the breaker to closed with a clean slate
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        state.last_failure = None;
        state.probing = false;
        state.metrics.last_state_change = Some(Instant::now());
        log::info!("circuit breaker '{}' manually reset", self.name);
    }

    /// The lazy state check: open iff the failure count has reached the
    /// threshold and the cool-down since the last failure has not yet
    /// elapsed. Once it has, the breaker reports closed and the next
    /// call becomes the recovery probe; the failure count is NOT cleared
    /// here, so a failing probe re-opens the circuit immediately.
    ///
    /// Reading through this can mutate the state (the probe admission is
    /// recorded), which is why it is named as a step rather than hidden
    /// behind a pure-looking accessor.
    fn check_and_maybe_reset(&self, state: &mut BreakerState) -> CircuitState {
        if state.failure_count < self.config.failure_threshold {
            return CircuitState::Closed;
        }
        match state.last_failure {
            Some(last) if last.elapsed() < self.config.reset_timeout => CircuitState::Open,
            _ => {
                if !state.probing {
                    state.probing = true;
                    state.metrics.last_state_change = Some(Instant::now());
                    log::debug!("circuit breaker '{}' admitting recovery probe", self.name);
                }
                CircuitState::Closed
            }
        }
    }
}

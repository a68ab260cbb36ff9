//! Resilience patterns for Marque
//!
//! This crate provides the failure-isolation and request-serialization
//! primitives shared by every Marque service: per-dependency circuit
//! breakers, bounded retry with exponential backoff, a keyed async lock,
//! and the registry that wires them together at process start.

pub mod backoff;
pub mod circuit_breaker;
pub mod lock;
pub mod registry;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitMetrics, CircuitState,
};
pub use lock::{KeyedLock, KeyedLockGuard, LockError, DEFAULT_ACQUIRE_TIMEOUT};
pub use registry::{RegistryError, ResilienceRegistry, ResilienceRegistryBuilder};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};

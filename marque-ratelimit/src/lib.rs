//! Request rate limiting for Marque
//!
//! A process-local, bounded, fixed-window counting store and the
//! per-route limiter registry consumed by the HTTP ingress throttle.
//! Deliberately independent of the shared key-value store: low latency
//! over strict cross-instance accuracy, and fail-open under eviction.

pub mod errors;
pub mod registry;
pub mod store;

// Re-export main types
pub use errors::{RateLimitError, RateLimitResult};
pub use registry::{RateLimitDecision, RateLimiter, RateLimiterRegistry, RouteLimitConfig};
pub use store::{sanitize_key, RateLimitStore, RateLimitStoreConfig, RateLimitUsage};

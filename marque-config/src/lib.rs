//! Domain-driven configuration management for Marque
//!
//! This crate provides modular configuration split by functional domains,
//! with validation, defaults, and environment variable support. All
//! tolerances live here: per-dependency circuit breaker settings,
//! retry defaults, cache TTLs, and per-route rate limits - validated
//! once at process start so misconfiguration fails at wiring time.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    cache::CacheConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    rate_limit::{LimitStoreConfig, RateLimitConfig, RouteLimitConfig},
    resilience::{DependencyBreakerConfig, ResilienceConfig, RetryConfig},
    MarqueConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;

//! Rate limiting error types

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limit operations
pub type RateLimitResult<T> = std::result::Result<T, RateLimitError>;

/// Rate limiting errors
///
/// A breached limit is an expected, frequent, non-exceptional condition:
/// the error carries a structured rejection (no internal detail) that
/// call sites can turn into a clean client-facing response.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// The hard ceiling enforced by `consume` was breached
    #[error("rate limit exceeded for '{key}': {hits} hits over ceiling {ceiling}, retry in {retry_after:?}")]
    Exceeded {
        key: String,
        hits: u32,
        ceiling: u32,
        retry_after: Duration,
    },
}

impl RateLimitError {
    /// How long the caller should wait before trying again
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::Exceeded { retry_after, .. } => *retry_after,
        }
    }
}

//! Cache error types

use marque_interfaces::KvError;
use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Cache-related errors
///
/// Validation failures (`InvalidKey`, `InvalidValue`) are caller bugs and
/// are never retried. `Store` wraps the underlying connectivity failure
/// after the retry budget is exhausted, tagged with the operation and key
/// so best-effort callers can log it and fall through to the source of
/// truth instead of failing the request.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is not usable (empty)
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// The value cannot be represented as JSON
    #[error("value for key '{key}' cannot be serialized: {message}")]
    InvalidValue { key: String, message: String },

    /// A stored payload no longer deserializes to the requested type
    #[error("cache payload for key '{key}' failed to deserialize: {message}")]
    Deserialization { key: String, message: String },

    /// The store failed after the retry budget was exhausted
    #[error("cache {operation} failed for key '{key}': {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: KvError,
    },
}

impl CacheError {
    /// Whether this is a validation-class error (caller bug, never
    /// retried) as opposed to a dependency failure
    pub fn is_validation(&self) -> bool {
        matches!(self, CacheError::InvalidKey(_) | CacheError::InvalidValue { .. })
    }
}

/// Only store-connectivity failures are worth retrying; validation
/// errors and corrupt payloads will fail the same way every time
impl marque_resilience::Retryable for CacheError {
    fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Store { .. })
    }
}

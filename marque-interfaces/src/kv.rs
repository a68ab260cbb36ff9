//! Key-value store interface
//!
//! The production deployment backs this with Redis; tests and local
//! development use the in-memory implementation from `marque-caching`.
//! Writes are last-writer-wins per key - callers needing stronger
//! guarantees must encode them in the key design.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for key-value store operations
pub type KvResult<T> = std::result::Result<T, KvError>;

/// Key-value store errors
///
/// These are transient dependency errors from the perspective of callers:
/// the store being unreachable or misbehaving is never a caller bug.
#[derive(Debug, Clone, Error)]
pub enum KvError {
    /// Store is unreachable
    #[error("key-value store connection error: {0}")]
    Connection(String),

    /// Operation exceeded its deadline
    #[error("key-value store operation timed out: {0}")]
    Timeout(String),

    /// Backend-specific failure
    #[error("key-value store backend error: {0}")]
    Backend(String),
}

/// One command in a pipelined batch
#[derive(Debug, Clone)]
pub enum KvCommand {
    Get { key: String },
    Set { key: String, value: String, ttl: Option<Duration> },
    Del { key: String },
    Incr { key: String },
    Expire { key: String, ttl: Duration },
}

/// Reply to one pipelined command, in submission order
#[derive(Debug, Clone, PartialEq)]
pub enum KvReply {
    /// Reply to `Set`, `Del`, `Expire`
    Unit,
    /// Reply to `Get`
    Value(Option<String>),
    /// Reply to `Incr`
    Integer(i64),
}

/// Key-value store with TTL support, pattern scans, atomic increment,
/// and pipelined batches.
///
/// Implementations must be safe for concurrent use; `incr` must be
/// atomic with respect to concurrent increments of the same key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the raw string value for a key, or `None` when absent/expired
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Set a key, with expiry when `ttl` is given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// Delete a key (absent keys are not an error)
    async fn del(&self, key: &str) -> KvResult<()>;

    /// List keys matching a pattern; only a trailing `*` wildcard is
    /// supported (`prefix*`), matching the scan shape services use for
    /// namespace-scoped invalidation
    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>>;

    /// Atomically increment a counter key, creating it at 1
    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Set or refresh the expiry on an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()>;

    /// Execute a batch of commands in one round trip, returning replies
    /// in submission order
    async fn pipeline(&self, commands: Vec<KvCommand>) -> KvResult<Vec<KvReply>>;
}

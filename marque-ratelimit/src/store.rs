//! Fixed-window rate limit counting store
//!
//! Counts requests per sanitized client key (IP, or IP plus purpose)
//! within a fixed window. The backing table is a bounded LRU: under
//! extreme key cardinality old entries are evicted before their window
//! logically expires, which resets their counters early. That bias is
//! deliberate and must be preserved - eviction can only ever make the
//! limiter MORE permissive, never less. Rate limiting here is advisory
//! throughput shaping, not a hard quota guarantee.
//!
//! The store is process-local by design, trading cross-instance accuracy
//! for low latency; it is independent of the shared key-value store the
//! cache client uses.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use marque_interfaces::{MetricsRecorder, NoopMetrics, OperationStatus, SharedMetrics};

use crate::errors::{RateLimitError, RateLimitResult};

/// Rate limit store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitStoreConfig {
    /// Fixed window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Bound on tracked keys; the answer to "what is the maximum key
    /// cardinality" is this explicit LRU capacity
    pub max_keys: usize,

    /// Hard ceiling enforced by [`RateLimitStore::consume`]
    pub consume_ceiling: u32,
}

impl Default for RateLimitStoreConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_keys: 10_000,
            consume_ceiling: 100,
        }
    }
}

/// Hit count and window end for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitUsage {
    /// Requests counted in the current window, this one included
    pub total_hits: u32,

    /// When the current window ends; constant across the window
    pub reset_at: Instant,
}

struct RateLimitRecord {
    hits: u32,
    reset_at: Instant,
}

impl RateLimitRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

/// Strip every character outside `[A-Za-z0-9_-]`
///
/// Defensive measure against key injection into the backing table.
/// Deterministic, total, and idempotent for any input.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Bounded fixed-window counting store
pub struct RateLimitStore {
    window: Duration,
    consume_ceiling: u32,
    entries: Mutex<LruCache<String, RateLimitRecord>>,
    metrics: SharedMetrics,
}

impl RateLimitStore {
    /// Create a store from configuration
    pub fn new(config: RateLimitStoreConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoopMetrics))
    }

    /// Create a store that reports `consume` outcomes to a recorder
    pub fn with_metrics(config: RateLimitStoreConfig, metrics: SharedMetrics) -> Self {
        let capacity = NonZeroUsize::new(config.max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            window: config.window,
            consume_ceiling: config.consume_ceiling,
            entries: Mutex::new(LruCache::new(capacity)),
            metrics,
        }
    }

    /// Count a hit for the key
    ///
    /// The first hit (or the first hit at or after `reset_at`) starts a
    /// fresh window; later hits increment and preserve the window end -
    /// the window is fixed, it does not slide forward on every hit.
    pub fn increment(&self, key: &str) -> RateLimitUsage {
        let key = sanitize_key(key);
        let now = Instant::now();
        let mut entries = self.entries.lock();

        // get_mut refreshes LRU recency, which is the per-entry age
        // refresh on access
        if let Some(record) = entries.get_mut(&key) {
            if !record.is_expired(now) {
                record.hits = record.hits.saturating_add(1);
                return RateLimitUsage {
                    total_hits: record.hits,
                    reset_at: record.reset_at,
                };
            }
        }

        let record = RateLimitRecord {
            hits: 1,
            reset_at: now + self.window,
        };
        let usage = RateLimitUsage {
            total_hits: record.hits,
            reset_at: record.reset_at,
        };
        // put evicts the LRU tail silently once the table is at capacity
        entries.put(key, record);
        usage
    }

    /// Read the current usage for a key without mutating any state
    ///
    /// A logically expired record reads as absent even when it has not
    /// been evicted yet.
    pub fn get(&self, key: &str) -> Option<RateLimitUsage> {
        let key = sanitize_key(key);
        let now = Instant::now();
        let entries = self.entries.lock();

        entries
            .peek(&key)
            .filter(|record| !record.is_expired(now))
            .map(|record| RateLimitUsage {
                total_hits: record.hits,
                reset_at: record.reset_at,
            })
    }

    /// Un-count a hit, flooring at zero
    pub fn decrement(&self, key: &str) {
        let key = sanitize_key(key);
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(record) = entries.get_mut(&key) {
            if !record.is_expired(now) {
                record.hits = record.hits.saturating_sub(1);
            }
        }
    }

    /// Forget one key
    pub fn reset_key(&self, key: &str) {
        let key = sanitize_key(key);
        self.entries.lock().pop(&key);
    }

    /// Forget every key
    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    /// Count a hit and enforce the hard ceiling
    ///
    /// For programmatic call sites outside the HTTP middleware pipeline;
    /// the ceiling is distinct from any per-route limit. The rejected
    /// hit stays counted.
    pub fn consume(&self, key: &str) -> RateLimitResult<RateLimitUsage> {
        let usage = self.increment(key);
        let result = if usage.total_hits > self.consume_ceiling {
            Err(RateLimitError::Exceeded {
                key: sanitize_key(key),
                hits: usage.total_hits,
                ceiling: self.consume_ceiling,
                retry_after: usage.reset_at.saturating_duration_since(Instant::now()),
            })
        } else {
            Ok(usage)
        };

        self.metrics.record_operation(
            "rate_limit.consume",
            if result.is_ok() { OperationStatus::Success } else { OperationStatus::Error },
        );
        result
    }

    /// Number of tracked keys, expired entries included
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }
}

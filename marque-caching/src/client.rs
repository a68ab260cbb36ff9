//! Resilient cache client
//!
//! The validated, observable, retrying facade every Marque service
//! caches through. Keys are namespaced under a service prefix, values
//! round-trip the key-value store as JSON, transient store failures are
//! retried with backoff, and every operation reports one latency
//! observation and one outcome counter to the metrics collaborator.
//!
//! Callers that treat the cache as best-effort should match on
//! [`CacheError::Store`] and fall through to the source of truth rather
//! than fail the request.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use marque_interfaces::{
    KvCommand, KvError, KvStore, MetricsRecorder, OperationStatus, SharedMetrics,
};
use marque_resilience::{RetryError, RetryExecutor, RetryPolicy};

use crate::errors::{CacheError, CacheResult};

/// Cache client configuration
#[derive(Debug, Clone)]
pub struct CacheClientConfig {
    /// Service namespace; every key is stored as `<service>:<key>`
    pub service: String,

    /// TTL applied when a write does not specify one; `None` caches
    /// without expiry
    pub default_ttl: Option<Duration>,

    /// Retry policy for store round trips
    pub retry_policy: RetryPolicy,
}

impl CacheClientConfig {
    /// Configuration for a named service with the default retry policy
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            default_ttl: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// JSON payload for the synthetic health-check round trip
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct HealthProbe {
    nonce: String,
    checked_at: chrono::DateTime<chrono::Utc>,
}

/// Validated, observable, retrying cache facade over a [`KvStore`]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    service: String,
    default_ttl: Option<Duration>,
    retry: RetryExecutor,
    metrics: SharedMetrics,
}

impl CacheClient {
    /// Create a new client over the given store
    pub fn new(store: Arc<dyn KvStore>, config: CacheClientConfig, metrics: SharedMetrics) -> Self {
        Self {
            store,
            service: config.service,
            default_ttl: config.default_ttl,
            retry: RetryExecutor::new(config.retry_policy),
            metrics,
        }
    }

    /// The service namespace this client writes under
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Get and deserialize a cached value
    ///
    /// Returns `Ok(None)` when the key is absent - a miss is not an
    /// error. Fails with [`CacheError::InvalidKey`] for an empty key and
    /// [`CacheError::Store`] once the retry budget is exhausted.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let started = Instant::now();
        let result = self.get_inner(key).await;
        self.observe("get", started, &result);
        result
    }

    async fn get_inner<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.validate_key(key)?;
        let namespaced = self.namespaced(key);

        let payload = self
            .retry
            .execute(|| self.store.get(&namespaced))
            .await
            .map_err(|error| store_error("get", key, error))?;

        match payload {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|error| CacheError::Deserialization {
                    key: key.to_string(),
                    message: error.to_string(),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize and cache a value
    ///
    /// `ttl` falls back to the client's default TTL when `None`. A value
    /// that cannot be represented as JSON fails with
    /// [`CacheError::InvalidValue`] before any store round trip and is
    /// never retried.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        let started = Instant::now();
        let result = self.set_inner(key, value, ttl).await;
        self.observe("set", started, &result);
        result
    }

    async fn set_inner<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        self.validate_key(key)?;
        let payload = self.serialize(key, value)?;
        let namespaced = self.namespaced(key);
        let ttl = ttl.or(self.default_ttl);

        self.retry
            .execute(|| self.store.set(&namespaced, &payload, ttl))
            .await
            .map_err(|error| store_error("set", key, error))
    }

    /// Delete a cached value (absent keys are not an error)
    pub async fn del(&self, key: &str) -> CacheResult<()> {
        let started = Instant::now();
        let result = self.del_inner(key).await;
        self.observe("del", started, &result);
        result
    }

    async fn del_inner(&self, key: &str) -> CacheResult<()> {
        self.validate_key(key)?;
        let namespaced = self.namespaced(key);

        self.retry
            .execute(|| self.store.del(&namespaced))
            .await
            .map_err(|error| store_error("del", key, error))
    }

    /// Cache a batch of values in one pipelined round trip
    pub async fn set_many<T: Serialize>(
        &self,
        entries: &[(&str, T)],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let started = Instant::now();
        let result = self.set_many_inner(entries, ttl).await;
        self.observe("set_many", started, &result);
        result
    }

    async fn set_many_inner<T: Serialize>(
        &self,
        entries: &[(&str, T)],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let ttl = ttl.or(self.default_ttl);
        let mut commands = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            self.validate_key(key)?;
            commands.push(KvCommand::Set {
                key: self.namespaced(key),
                value: self.serialize(key, value)?,
                ttl,
            });
        }
        if commands.is_empty() {
            return Ok(());
        }

        self.retry
            .execute(|| self.store.pipeline(commands.clone()))
            .await
            .map(|_| ())
            .map_err(|error| store_error("set_many", format!("{} entries", entries.len()), error))
    }

    /// Delete every key under this client's service namespace
    ///
    /// Returns the number of keys removed. Routine invalidation goes
    /// through here; it can never touch another service's keys.
    pub async fn clear(&self) -> CacheResult<usize> {
        let started = Instant::now();
        let result = self.delete_matching("clear", &format!("{}:*", self.service)).await;
        self.observe("clear", started, &result);
        result
    }

    /// Delete every key in the store, across all services
    ///
    /// A full flush is intentionally a separate operation from
    /// [`CacheClient::clear`]: it is rare, dangerous, and should never
    /// be reachable by omitting an argument.
    pub async fn flush_all(&self) -> CacheResult<usize> {
        let started = Instant::now();
        log::warn!("full cache flush requested by service '{}'", self.service);
        let result = self.delete_matching("flush_all", "*").await;
        self.observe("flush_all", started, &result);
        result
    }

    async fn delete_matching(&self, operation: &'static str, pattern: &str) -> CacheResult<usize> {
        let keys = self
            .retry
            .execute(|| self.store.keys(pattern))
            .await
            .map_err(|error| store_error(operation, pattern, error))?;

        if keys.is_empty() {
            return Ok(0);
        }

        let commands: Vec<KvCommand> = keys
            .iter()
            .map(|key| KvCommand::Del { key: key.clone() })
            .collect();

        self.retry
            .execute(|| self.store.pipeline(commands.clone()))
            .await
            .map_err(|error| store_error(operation, pattern, error))?;

        Ok(keys.len())
    }

    /// Synthetic set+get round trip against the live store
    ///
    /// Never fails: any error, including an unusable store, reports as
    /// unhealthy. The probe key carries a short TTL so the store cleans
    /// it up on its own.
    pub async fn health_check(&self) -> bool {
        let started = Instant::now();
        let healthy = self.health_check_inner().await;
        self.metrics.observe_latency("health_check", started.elapsed());
        self.metrics.record_operation(
            "health_check",
            if healthy { OperationStatus::Success } else { OperationStatus::Error },
        );
        healthy
    }

    async fn health_check_inner(&self) -> bool {
        let probe = HealthProbe {
            nonce: uuid::Uuid::new_v4().to_string(),
            checked_at: chrono::Utc::now(),
        };
        let key = self.namespaced(&format!("health:{}", probe.nonce));
        let Ok(payload) = serde_json::to_string(&probe) else {
            return false;
        };

        // direct store calls: a health check reports the store as it is
        // right now, without retry masking
        if self.store.set(&key, &payload, Some(Duration::from_secs(5))).await.is_err() {
            return false;
        }
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str::<HealthProbe>(&raw)
                .map(|read_back| read_back == probe)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn validate_key(&self, key: &str) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must be a non-empty string".to_string()));
        }
        Ok(())
    }

    fn serialize<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<String> {
        serde_json::to_string(value).map_err(|error| CacheError::InvalidValue {
            key: key.to_string(),
            message: error.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.service, key)
    }

    fn observe<T>(&self, operation: &'static str, started: Instant, result: &CacheResult<T>) {
        self.metrics.observe_latency(operation, started.elapsed());
        let status = if result.is_ok() {
            OperationStatus::Success
        } else {
            OperationStatus::Error
        };
        self.metrics.record_operation(operation, status);
        if let Err(error) = result {
            log::debug!("cache {} degraded: {}", operation, error);
        }
    }
}

fn store_error(operation: &'static str, key: impl Into<String>, error: RetryError<KvError>) -> CacheError {
    let source = match error {
        RetryError::MaxAttemptsExceeded { attempts, last_error } => {
            log::warn!("cache {} gave up after {} attempts: {}", operation, attempts, last_error);
            last_error
        }
        RetryError::NonRetryableError(error) => error,
        RetryError::CircuitBreakerOpen { name } => {
            KvError::Backend(format!("circuit breaker '{}' is open", name))
        }
    };
    CacheError::Store {
        operation,
        key: key.into(),
        source,
    }
}

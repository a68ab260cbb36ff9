//! Resilience registry
//!
//! One explicit object, built during process wiring from validated
//! configuration, holding every named circuit breaker plus the
//! process-wide keyed lock and default retry policy. Consumers receive
//! it by reference (usually `Arc`) instead of reaching for module-level
//! singletons, so per-test isolation is just constructing a fresh
//! registry.

use std::collections::HashMap;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::lock::KeyedLock;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Registry lookup errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The dependency was never configured; failing loudly here beats a
    /// breaker that silently defaults to always-open or always-closed
    #[error("no circuit breaker configured for dependency '{0}'")]
    UnknownDependency(String),
}

/// Process-wide resilience wiring
pub struct ResilienceRegistry {
    breakers: HashMap<String, CircuitBreaker>,
    lock: KeyedLock,
    retry_policy: RetryPolicy,
}

impl ResilienceRegistry {
    /// Start building a registry
    pub fn builder() -> ResilienceRegistryBuilder {
        ResilienceRegistryBuilder {
            breaker_configs: HashMap::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// The breaker protecting the named dependency
    pub fn breaker(&self, name: &str) -> Result<&CircuitBreaker, RegistryError> {
        self.breakers
            .get(name)
            .ok_or_else(|| RegistryError::UnknownDependency(name.to_string()))
    }

    /// Names of every configured dependency
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.breakers.keys().map(String::as_str)
    }

    /// The process-wide keyed lock
    pub fn lock(&self) -> &KeyedLock {
        &self.lock
    }

    /// The default retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// A retry executor running under the default policy
    pub fn retry(&self) -> RetryExecutor {
        RetryExecutor::new(self.retry_policy.clone())
    }
}

/// Builder for [`ResilienceRegistry`]
pub struct ResilienceRegistryBuilder {
    breaker_configs: HashMap<String, CircuitBreakerConfig>,
    retry_policy: RetryPolicy,
}

impl ResilienceRegistryBuilder {
    /// Register a breaker for a named dependency
    pub fn breaker(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.breaker_configs.insert(name.into(), config);
        self
    }

    /// Register breakers for a whole configuration map
    pub fn breakers(mut self, configs: impl IntoIterator<Item = (String, CircuitBreakerConfig)>) -> Self {
        self.breaker_configs.extend(configs);
        self
    }

    /// Override the default retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Build the registry, instantiating one breaker per dependency
    pub fn build(self) -> ResilienceRegistry {
        let breakers = self
            .breaker_configs
            .into_iter()
            .map(|(name, config)| {
                let breaker = CircuitBreaker::new(name.clone(), config);
                (name, breaker)
            })
            .collect();

        ResilienceRegistry {
            breakers,
            lock: KeyedLock::new(),
            retry_policy: self.retry_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_configured_breaker_is_found() {
        let registry = ResilienceRegistry::builder()
            .breaker("uspto", CircuitBreakerConfig::new(3, Duration::from_secs(30)))
            .breaker("stripe", CircuitBreakerConfig::new(5, Duration::from_secs(60)))
            .build();

        assert!(registry.breaker("uspto").is_ok());
        assert!(registry.breaker("stripe").is_ok());
        assert_eq!(registry.dependency_names().count(), 2);
    }

    #[test]
    fn test_unknown_dependency_fails_loudly() {
        let registry = ResilienceRegistry::builder().build();

        let error = registry.breaker("euipo").unwrap_err();
        assert!(matches!(error, RegistryError::UnknownDependency(name) if name == "euipo"));
    }

    #[test]
    fn test_registries_are_isolated() {
        let config = CircuitBreakerConfig::new(1, Duration::from_secs(60));
        let a = ResilienceRegistry::builder().breaker("dep", config.clone()).build();
        let b = ResilienceRegistry::builder().breaker("dep", config).build();

        a.breaker("dep").unwrap().record_failure();
        assert!(a.breaker("dep").unwrap().is_open());
        assert!(!b.breaker("dep").unwrap().is_open());
    }
}

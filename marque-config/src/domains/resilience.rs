//! Resilience configuration
//!
//! Per-dependency circuit breaker tolerances and the default retry
//! policy. There are no default breaker entries: every protected
//! dependency must be configured explicitly, and an entry with a zero
//! threshold or timeout is rejected at load time.

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Resilience configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker settings per protected dependency name
    /// (e.g. "uspto", "euipo", "stripe", "openai", "github")
    pub dependencies: HashMap<String, DependencyBreakerConfig>,

    /// Default retry policy for transient failures
    pub retry: RetryConfig,
}

/// Circuit breaker tolerances for one dependency
///
/// Both fields are required in the config file; a dependency with no
/// configured tolerance should fail at load time, not inherit a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Cool-down before a recovery probe is admitted
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub reset_timeout: Duration,
}

/// Retry policy defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, the first included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_base_delay")]
    pub base_delay: Duration,

    /// Cap on any single backoff delay
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Whether retry delays are jittered
    #[serde(default = "crate::domains::utils::default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: true,
        }
    }
}

impl Validatable for ResilienceConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (name, breaker) in &self.dependencies {
            validate_positive(
                breaker.failure_threshold,
                &format!("dependencies.{}.failure_threshold", name),
                self.domain_name(),
            )?;
            validate_positive(
                breaker.reset_timeout.as_millis(),
                &format!("dependencies.{}.reset_timeout", name),
                self.domain_name(),
            )?;
        }
        self.retry.validate()?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience"
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_positive(self.base_delay.as_millis(), "base_delay", self.domain_name())?;
        validate_positive(self.max_delay.as_millis(), "max_delay", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience.retry"
    }
}

// Default value functions
fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let mut config = ResilienceConfig::default();
        config.dependencies.insert(
            "uspto".to_string(),
            DependencyBreakerConfig {
                failure_threshold: 0,
                reset_timeout: Duration::from_secs(30),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reset_timeout_is_rejected() {
        let mut config = ResilienceConfig::default();
        config.dependencies.insert(
            "uspto".to_string(),
            DependencyBreakerConfig {
                failure_threshold: 5,
                reset_timeout: Duration::ZERO,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_breaker_entries_require_both_fields() {
        let yaml = "dependencies:\n  uspto:\n    failure_threshold: 5\n";
        let parsed: Result<ResilienceConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }
}

//! Caching configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled globally
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Key-value store connection URL
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// TTL applied to writes that do not specify one
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_ttl")]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_url: default_store_url(),
            default_ttl: default_ttl(),
        }
    }
}

impl Validatable for CacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.store_url, "store_url", self.domain_name())?;
        validate_positive(self.default_ttl.as_secs(), "default_ttl", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}

// Default value functions
fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_ttl() -> Duration {
    Duration::from_secs(3600) // 1 hour
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_store_url_is_rejected() {
        let config = CacheConfig {
            store_url: "not a url".to_string(),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = CacheConfig {
            default_ttl: Duration::ZERO,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Domain-specific configuration modules

pub mod cache;
pub mod logging;
pub mod rate_limit;
pub mod resilience;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Marque configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MarqueConfig {
    /// Circuit breaker and retry configuration
    #[serde(default)]
    pub resilience: resilience::ResilienceConfig,

    /// Caching configuration
    #[serde(default)]
    pub cache: cache::CacheConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: rate_limit::RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl MarqueConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.resilience.validate()?;
        self.cache.validate()?;
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = MarqueConfig::default();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# failed to generate sample config".to_string())
    }
}

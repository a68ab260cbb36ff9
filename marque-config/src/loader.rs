//! Configuration loading and environment variable handling

use crate::domains::MarqueConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with the default prefix
    pub fn new() -> Self {
        Self {
            prefix: "MARQUE".to_string(),
        }
    }

    /// Create a new config loader with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<MarqueConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    /// Load configuration from a YAML string with environment overrides
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<MarqueConfig> {
        let mut config: MarqueConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<MarqueConfig> {
        let mut config = MarqueConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<MarqueConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut MarqueConfig) -> ConfigResult<()> {
        self.apply_cache_overrides(config)?;
        self.apply_retry_overrides(config)?;
        self.apply_rate_limit_overrides(config)?;
        self.apply_logging_overrides(config)?;
        Ok(())
    }

    fn apply_cache_overrides(&self, config: &mut MarqueConfig) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("CACHE_URL") {
            config.cache.store_url = url;
        }

        if let Ok(ttl) = self.get_env_var("CACHE_TTL_SECONDS") {
            let seconds: u64 = ttl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid CACHE_TTL_SECONDS: {}", e)))?;
            config.cache.default_ttl = Duration::from_secs(seconds);
        }

        if let Ok(enabled) = self.get_env_var("CACHE_ENABLED") {
            config.cache.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid CACHE_ENABLED: {}", e)))?;
        }

        Ok(())
    }

    fn apply_retry_overrides(&self, config: &mut MarqueConfig) -> ConfigResult<()> {
        if let Ok(attempts) = self.get_env_var("RETRY_MAX_ATTEMPTS") {
            config.resilience.retry.max_attempts = attempts
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid RETRY_MAX_ATTEMPTS: {}", e)))?;
        }

        if let Ok(delay) = self.get_env_var("RETRY_BASE_DELAY_MS") {
            let millis: u64 = delay
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid RETRY_BASE_DELAY_MS: {}", e)))?;
            config.resilience.retry.base_delay = Duration::from_millis(millis);
        }

        Ok(())
    }

    fn apply_rate_limit_overrides(&self, config: &mut MarqueConfig) -> ConfigResult<()> {
        if let Ok(window) = self.get_env_var("RATE_LIMIT_WINDOW_SECONDS") {
            let seconds: u64 = window.parse().map_err(|e| {
                ConfigError::EnvError(format!("invalid RATE_LIMIT_WINDOW_SECONDS: {}", e))
            })?;
            config.rate_limit.store.window = Duration::from_secs(seconds);
        }

        if let Ok(max_keys) = self.get_env_var("RATE_LIMIT_MAX_KEYS") {
            config.rate_limit.store.max_keys = max_keys
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid RATE_LIMIT_MAX_KEYS: {}", e)))?;
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut MarqueConfig) -> ConfigResult<()> {
        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            use std::str::FromStr;
            config.logging.level = crate::domains::logging::LogLevel::from_str(&level)
                .map_err(|_| ConfigError::EnvError(format!("invalid LOG_LEVEL: {}", level)))?;
        }

        Ok(())
    }

    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validatable;

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
resilience:
  dependencies:
    uspto:
      failure_threshold: 5
      reset_timeout: 30
    stripe:
      failure_threshold: 3
      reset_timeout: 60
  retry:
    max_attempts: 4
    base_delay: 250
cache:
  store_url: "redis://cache.internal:6379"
  default_ttl: 600
rate_limit:
  store:
    window: 60
    max_keys: 5000
    consume_ceiling: 50
  routes:
    search:
      window: 60
      max_hits: 120
logging:
  level: debug
"#;
        let loader = ConfigLoader::with_prefix("MARQUE_TEST_UNSET");
        let config = loader.from_yaml_str(yaml).unwrap();

        assert_eq!(config.resilience.dependencies["uspto"].failure_threshold, 5);
        assert_eq!(
            config.resilience.dependencies["stripe"].reset_timeout,
            Duration::from_secs(60)
        );
        assert_eq!(config.resilience.retry.max_attempts, 4);
        assert_eq!(config.resilience.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(600));
        assert_eq!(config.rate_limit.routes["search"].max_hits, 120);
        assert_eq!(
            config.logging.level,
            crate::domains::logging::LogLevel::Debug
        );
    }

    #[test]
    fn test_invalid_domain_value_fails_load() {
        let yaml = r#"
resilience:
  dependencies:
    uspto:
      failure_threshold: 0
      reset_timeout: 30
"#;
        let loader = ConfigLoader::with_prefix("MARQUE_TEST_UNSET");
        assert!(loader.from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_env_override_applies() {
        std::env::set_var("MARQUE_ENVTEST_CACHE_TTL_SECONDS", "120");
        let loader = ConfigLoader::with_prefix("MARQUE_ENVTEST");
        let config = loader.from_env().unwrap();
        std::env::remove_var("MARQUE_ENVTEST_CACHE_TTL_SECONDS");

        assert_eq!(config.cache.default_ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_env_override_is_reported() {
        std::env::set_var("MARQUE_BADENV_RETRY_MAX_ATTEMPTS", "many");
        let loader = ConfigLoader::with_prefix("MARQUE_BADENV");
        let result = loader.from_env();
        std::env::remove_var("MARQUE_BADENV_RETRY_MAX_ATTEMPTS");

        assert!(matches!(result.unwrap_err(), ConfigError::EnvError(_)));
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = MarqueConfig::generate_sample();
        let parsed: MarqueConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(parsed.validate_all().is_ok());
        assert!(parsed.cache.validate().is_ok());
    }
}

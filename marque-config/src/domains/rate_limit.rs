//! Rate limiting configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Counting store bounds
    pub store: LimitStoreConfig,

    /// Per-route limits; routes without an entry are not throttled
    pub routes: HashMap<String, RouteLimitConfig>,
}

/// Bounds for the counting store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitStoreConfig {
    /// Fixed window length for manual (`consume`) call sites
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_window")]
    pub window: Duration,

    /// Bound on tracked keys per limiter
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,

    /// Hard ceiling enforced by `consume`
    #[serde(default = "default_consume_ceiling")]
    pub consume_ceiling: u32,
}

impl Default for LimitStoreConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_keys: default_max_keys(),
            consume_ceiling: default_consume_ceiling(),
        }
    }
}

/// Limit settings for one route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimitConfig {
    /// Fixed window length for the route
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub window: Duration,

    /// Maximum hits per client key within the window
    pub max_hits: u32,
}

impl Validatable for RateLimitConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.store.validate()?;
        for (route, limit) in &self.routes {
            validate_positive(
                limit.window.as_secs(),
                &format!("routes.{}.window", route),
                self.domain_name(),
            )?;
            validate_positive(
                limit.max_hits,
                &format!("routes.{}.max_hits", route),
                self.domain_name(),
            )?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "rate_limit"
    }
}

impl Validatable for LimitStoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.window.as_secs(), "window", self.domain_name())?;
        validate_positive(self.max_keys, "max_keys", self.domain_name())?;
        validate_positive(self.consume_ceiling, "consume_ceiling", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "rate_limit.store"
    }
}

// Default value functions
fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_keys() -> usize {
    10_000
}

fn default_consume_ceiling() -> u32 {
    100
}

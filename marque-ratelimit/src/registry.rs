//! Per-route rate limiter registry
//!
//! The HTTP ingress throttle (outside this workspace) asks the registry
//! for a decision per request: route name plus client key in, allow or
//! deny plus remaining quota out. Each route gets its own independently
//! configured fixed-window limiter; routes with no configured limit are
//! not throttled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::store::{RateLimitStore, RateLimitStoreConfig, RateLimitUsage};

/// Limit settings for one route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimitConfig {
    /// Fixed window length for the route
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Maximum hits per client key within the window
    pub max_hits: u32,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// The route's limit, for response headers
    pub limit: u32,

    /// Hits left in the current window
    pub remaining: u32,

    /// When the current window ends
    pub reset_at: Instant,
}

/// One route's fixed-window limiter
pub struct RateLimiter {
    route: String,
    max_hits: u32,
    store: RateLimitStore,
}

impl RateLimiter {
    /// Create a limiter for a route
    pub fn new(route: impl Into<String>, config: RouteLimitConfig, max_keys: usize) -> Self {
        let store = RateLimitStore::new(RateLimitStoreConfig {
            window: config.window,
            max_keys,
            // consume() is not exposed through the registry; per-route
            // enforcement happens against max_hits below
            consume_ceiling: u32::MAX,
        });
        Self {
            route: route.into(),
            max_hits: config.max_hits,
            store,
        }
    }

    /// Count this request and decide whether it may proceed
    pub fn check(&self, client_key: &str) -> RateLimitDecision {
        let RateLimitUsage { total_hits, reset_at } = self.store.increment(client_key);
        let allowed = total_hits <= self.max_hits;
        if !allowed {
            log::debug!(
                "rate limit exceeded on route '{}': {} hits (max {})",
                self.route,
                total_hits,
                self.max_hits
            );
        }
        RateLimitDecision {
            allowed,
            limit: self.max_hits,
            remaining: self.max_hits.saturating_sub(total_hits),
            reset_at,
        }
    }

    /// The underlying counting store
    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }
}

/// All per-route limiters, built once at process wiring
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: HashMap<String, RateLimiter>,
}

impl RateLimiterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from per-route configuration
    pub fn from_routes(
        routes: impl IntoIterator<Item = (String, RouteLimitConfig)>,
        max_keys_per_route: usize,
    ) -> Self {
        let limiters = routes
            .into_iter()
            .map(|(route, config)| {
                let limiter = RateLimiter::new(route.clone(), config, max_keys_per_route);
                (route, limiter)
            })
            .collect();
        Self { limiters }
    }

    /// Add a limiter for a route
    pub fn add_limiter(&mut self, route: impl Into<String>, config: RouteLimitConfig, max_keys: usize) {
        let route = route.into();
        self.limiters.insert(route.clone(), RateLimiter::new(route, config, max_keys));
    }

    /// The limiter for a route, if one is configured
    pub fn limiter(&self, route: &str) -> Option<&RateLimiter> {
        self.limiters.get(route)
    }

    /// Check a request against its route's limiter
    ///
    /// Routes with no configured limit are always allowed.
    pub fn check(&self, route: &str, client_key: &str) -> Option<RateLimitDecision> {
        self.limiters.get(route).map(|limiter| limiter.check(client_key))
    }
}

//! Wiring tests: validated config in, working registries out
//!
//! Mirrors what the server binary does at process start: load and
//! validate configuration, then construct the resilience registry, the
//! cache client, and the rate limiter registry from it.

use std::sync::Arc;
use std::time::Duration;

use marque_caching::{CacheClient, CacheClientConfig, MemoryKvStore};
use marque_config::{ConfigLoader, MarqueConfig};
use marque_interfaces::NoopMetrics;
use marque_ratelimit::{RateLimitStore, RateLimitStoreConfig, RateLimiterRegistry, RouteLimitConfig};
use marque_resilience::{CircuitBreakerConfig, ResilienceRegistry, RetryPolicy};

const WIRING_YAML: &str = r#"
resilience:
  dependencies:
    uspto:
      failure_threshold: 2
      reset_timeout: 30
    stripe:
      failure_threshold: 5
      reset_timeout: 60
  retry:
    max_attempts: 2
    base_delay: 1
cache:
  store_url: "redis://cache.internal:6379"
  default_ttl: 300
rate_limit:
  store:
    window: 60
    max_keys: 1000
    consume_ceiling: 2
  routes:
    search:
      window: 60
      max_hits: 3
"#;

fn load_config() -> MarqueConfig {
    ConfigLoader::with_prefix("MARQUE_WIRING_TEST")
        .from_yaml_str(WIRING_YAML)
        .expect("wiring config must validate")
}

fn build_resilience(config: &MarqueConfig) -> ResilienceRegistry {
    ResilienceRegistry::builder()
        .breakers(config.resilience.dependencies.iter().map(|(name, dep)| {
            (
                name.clone(),
                CircuitBreakerConfig::new(dep.failure_threshold, dep.reset_timeout),
            )
        }))
        .retry_policy(RetryPolicy {
            max_attempts: config.resilience.retry.max_attempts,
            base_delay: config.resilience.retry.base_delay,
            max_delay: config.resilience.retry.max_delay,
            jitter: config.resilience.retry.jitter,
            ..RetryPolicy::default()
        })
        .build()
}

#[test]
fn test_breakers_follow_configured_tolerances() {
    let config = load_config();
    let registry = build_resilience(&config);

    let uspto = registry.breaker("uspto").unwrap();
    uspto.record_failure();
    assert!(!uspto.is_open());
    uspto.record_failure();
    assert!(uspto.is_open());

    // stripe has its own, larger tolerance
    let stripe = registry.breaker("stripe").unwrap();
    for _ in 0..4 {
        stripe.record_failure();
    }
    assert!(!stripe.is_open());
}

#[test]
fn test_unconfigured_dependency_fails_at_lookup() {
    let config = load_config();
    let registry = build_resilience(&config);

    assert!(registry.breaker("euipo").is_err());
}

#[test]
fn test_route_limits_follow_config() {
    let config = load_config();
    let limiters = RateLimiterRegistry::from_routes(
        config.rate_limit.routes.iter().map(|(route, limit)| {
            (
                route.clone(),
                RouteLimitConfig {
                    window: limit.window,
                    max_hits: limit.max_hits,
                },
            )
        }),
        config.rate_limit.store.max_keys,
    );

    for _ in 0..3 {
        assert!(limiters.check("search", "10.1.2.3").unwrap().allowed);
    }
    assert!(!limiters.check("search", "10.1.2.3").unwrap().allowed);

    // no configured limit for billing
    assert!(limiters.check("billing", "10.1.2.3").is_none());
}

#[test]
fn test_consume_ceiling_follows_config() {
    let config = load_config();
    let store = RateLimitStore::new(RateLimitStoreConfig {
        window: config.rate_limit.store.window,
        max_keys: config.rate_limit.store.max_keys,
        consume_ceiling: config.rate_limit.store.consume_ceiling,
    });

    assert!(store.consume("batch-import").is_ok());
    assert!(store.consume("batch-import").is_ok());
    assert!(store.consume("batch-import").is_err());
}

#[tokio::test]
async fn test_cache_client_uses_configured_ttl() {
    let config = load_config();
    let cache = CacheClient::new(
        Arc::new(MemoryKvStore::new()),
        CacheClientConfig {
            service: "search".to_string(),
            default_ttl: Some(config.cache.default_ttl),
            retry_policy: RetryPolicy::new(
                config.resilience.retry.max_attempts,
                config.resilience.retry.base_delay,
            ),
        },
        Arc::new(NoopMetrics),
    );

    let hit = serde_json::json!({
        "mark": "ACME",
        "status": "registered",
        "classes": [9, 42],
    });
    cache.set("tm:query", &hit, None).await.unwrap();
    assert_eq!(
        cache.get::<serde_json::Value>("tm:query").await.unwrap(),
        Some(hit)
    );
    assert!(cache.health_check().await);
}

#[test]
fn test_registry_lock_is_shared_wiring_point() {
    let config = load_config();
    let registry = Arc::new(build_resilience(&config));

    // consumers clone the same keyed lock out of the registry
    let lock_a = registry.lock().clone();
    let lock_b = registry.lock().clone();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let guard = lock_a.acquire("pay:idem-123").await.unwrap();
        let blocked = lock_b.acquire_timeout("pay:idem-123", Duration::from_millis(20)).await;
        assert!(blocked.is_err());
        drop(guard);
        assert!(lock_b.acquire("pay:idem-123").await.is_ok());
    });
}

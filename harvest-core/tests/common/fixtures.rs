//! Shared fixtures

use std::sync::Arc;
use std::time::Duration;

use harvest_core::infrastructure::cache::{BackendLoader, CacheService, DistributedCacheFactory};
use harvest_core::infrastructure::clock::ManualClock;
use harvest_core::infrastructure::rate_limiter::{RateLimitRule, RateLimiter};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Start time for manual clocks; an arbitrary instant in 2024
pub const T0: u64 = 1_700_000_000_000;

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(T0))
}

pub fn local_cache(clock: Arc<ManualClock>) -> Arc<CacheService> {
    let loader = BackendLoader::local_only(clock, SWEEP_INTERVAL);
    Arc::new(CacheService::new(Arc::new(loader)))
}

pub fn distributed_cache(
    factory: Arc<dyn DistributedCacheFactory>,
    clock: Arc<ManualClock>,
) -> Arc<CacheService> {
    let loader = BackendLoader::distributed(factory, clock, SWEEP_INTERVAL);
    Arc::new(CacheService::new(Arc::new(loader)))
}

pub fn rule(window_ms: u64, max_requests: u32) -> RateLimitRule {
    RateLimitRule::new(window_ms, max_requests, "ratelimit:test", "Too many requests")
        .expect("valid rule")
}

/// Fixed-window limiter backed by the local cache
pub fn cached_limiter(window_ms: u64, max_requests: u32) -> (RateLimiter, Arc<ManualClock>) {
    let clock = manual_clock();
    let cache = local_cache(clock.clone());
    let limiter = RateLimiter::new(rule(window_ms, max_requests), Some(cache), clock.clone())
        .with_cleanup_probability(0.0);
    (limiter, clock)
}

/// Sliding-log limiter with no cache
pub fn memory_limiter(window_ms: u64, max_requests: u32) -> (RateLimiter, Arc<ManualClock>) {
    let clock = manual_clock();
    let limiter = RateLimiter::new(rule(window_ms, max_requests), None, clock.clone())
        .with_cleanup_probability(0.0);
    (limiter, clock)
}

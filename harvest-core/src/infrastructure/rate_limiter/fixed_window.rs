//! Fixed-window counter kept in the shared cache

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::types::{RateLimitCounter, RateLimitDecision, RateLimitRule, retry_after_seconds};
use crate::infrastructure::cache::CacheService;

/// Counts requests per identifier in the cache facade
///
/// The read and the write are separate cache calls, so concurrent requests
/// for the same key can each read the same count and admit slightly more than
/// `max_requests` in a window. Limits are approximate under contention.
pub struct FixedWindowLimiter {
    cache: Arc<CacheService>,
}

impl FixedWindowLimiter {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    pub async fn check(&self, rule: &RateLimitRule, key: &str, now: u64) -> RateLimitDecision {
        let limit = rule.max_requests();
        let existing: Option<RateLimitCounter> = self.cache.get(key).await;

        let counter = match existing {
            Some(counter) if !counter.is_expired(now) => counter,
            _ => {
                let counter = RateLimitCounter::start(now, rule.window_ms());
                self.store(key, &counter, now).await;
                return RateLimitDecision::allowed(limit, limit - 1, counter.reset_at);
            }
        };

        if counter.count >= limit {
            let retry_after = retry_after_seconds(counter.reset_at, now);
            debug!(key = %key, count = counter.count, limit, "Fixed window exhausted");
            return RateLimitDecision::denied(limit, counter.reset_at, retry_after);
        }

        let counter = RateLimitCounter {
            count: counter.count + 1,
            reset_at: counter.reset_at,
        };
        self.store(key, &counter, now).await;

        RateLimitDecision::allowed(limit, limit - counter.count, counter.reset_at)
    }

    async fn store(&self, key: &str, counter: &RateLimitCounter, now: u64) {
        // Expire with the window so stale counters don't linger
        let remaining_ms = counter.reset_at.saturating_sub(now);
        let ttl = Duration::from_secs(remaining_ms.div_ceil(1000).max(1));
        self.cache.set(key, counter, Some(ttl)).await;
    }

    pub async fn clear(&self, key: &str) {
        self.cache.delete(key).await;
    }

    /// Drop expired counters held in process; the distributed store expires its own
    pub async fn purge_local(&self) -> usize {
        if self.cache.status().client_loaded {
            return 0;
        }
        self.cache.loader().local_store().await.purge_expired().await
    }
}

//! Sliding-log limiter used when no cache is wired in
//!
//! Keeps every admitted timestamp per key, so a burst at a window boundary
//! cannot double the budget the way a fixed window can.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{RateLimitDecision, RateLimitRule, retry_after_seconds};

#[derive(Debug, Default)]
pub struct SlidingLogLimiter {
    log: Mutex<HashMap<String, Vec<u64>>>,
}

fn in_window(timestamp: u64, now: u64, window_ms: u64) -> bool {
    now.saturating_sub(timestamp) < window_ms
}

impl SlidingLogLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check(&self, rule: &RateLimitRule, key: &str, now: u64) -> RateLimitDecision {
        let limit = rule.max_requests();
        let window_ms = rule.window_ms();

        let mut log = self.log.lock().await;
        let timestamps = log.entry(key.to_string()).or_default();
        timestamps.retain(|&t| in_window(t, now, window_ms));

        if timestamps.len() >= limit as usize {
            // The oldest surviving entry is the next to leave the window
            let reset_at = timestamps
                .first()
                .map_or(now, |&oldest| oldest.saturating_add(window_ms));
            debug!(key = %key, limit, "Sliding log exhausted");
            return RateLimitDecision::denied(limit, reset_at, retry_after_seconds(reset_at, now));
        }

        timestamps.push(now);
        let used = timestamps.len() as u32;
        let reset_at = timestamps
            .first()
            .map_or(now, |&oldest| oldest)
            .saturating_add(window_ms);

        RateLimitDecision::allowed(limit, limit - used, reset_at)
    }

    /// Drop keys with no timestamps left in the window
    pub async fn cleanup(&self, window_ms: u64, now: u64) -> usize {
        let mut log = self.log.lock().await;
        let before = log.len();
        log.retain(|_, timestamps| {
            timestamps.retain(|&t| in_window(t, now, window_ms));
            !timestamps.is_empty()
        });
        before - log.len()
    }

    pub async fn clear(&self, key: &str) {
        self.log.lock().await.remove(key);
    }

    /// Number of tracked keys
    pub async fn tracked_keys(&self) -> usize {
        self.log.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(window_ms: u64, max: u32) -> RateLimitRule {
        RateLimitRule::new(window_ms, max, "ratelimit:test", "slow down").unwrap()
    }

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let limiter = SlidingLogLimiter::new();
        let rule = rule(1_000, 3);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check(&rule, "k", 0).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = limiter.check(&rule, "k", 500).await;
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_seconds, Some(1));
        assert_eq!(denied.reset_at, 1_000);
    }

    #[tokio::test]
    async fn test_no_boundary_burst() {
        let limiter = SlidingLogLimiter::new();
        let rule = rule(60_000, 2);

        assert!(limiter.check(&rule, "k", 59_000).await.allowed);
        assert!(limiter.check(&rule, "k", 59_500).await.allowed);
        // A fixed window would reset at 60s here
        assert!(!limiter.check(&rule, "k", 60_500).await.allowed);
        assert!(limiter.check(&rule, "k", 119_000).await.allowed);
    }

    #[tokio::test]
    async fn test_denied_requests_are_not_logged() {
        let limiter = SlidingLogLimiter::new();
        let rule = rule(1_000, 1);

        assert!(limiter.check(&rule, "k", 0).await.allowed);
        assert!(!limiter.check(&rule, "k", 100).await.allowed);
        assert!(!limiter.check(&rule, "k", 900).await.allowed);
        assert!(limiter.check(&rule, "k", 1_000).await.allowed);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let limiter = SlidingLogLimiter::new();
        let rule = rule(1_000, 5);

        limiter.check(&rule, "old", 0).await;
        limiter.check(&rule, "fresh", 1_500).await;

        assert_eq!(limiter.cleanup(1_000, 2_000).await, 1);
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let limiter = SlidingLogLimiter::new();
        let rule = rule(1_000, 1);

        limiter.check(&rule, "k", 0).await;
        limiter.clear("k").await;
        assert!(limiter.check(&rule, "k", 1).await.allowed);
    }
}

//! Rate limiter service

use http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::fixed_window::FixedWindowLimiter;
use super::identifier::resolve_identifier;
use super::sliding_log::SlidingLogLimiter;
use super::types::{RateLimitDecision, RateLimitError, RateLimitPreset, RateLimitRule};
use crate::config::RateLimitConfig;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::clock::Clock;

const DEFAULT_CLEANUP_PROBABILITY: f64 = 0.01;

enum LimiterStore {
    Cache(FixedWindowLimiter),
    Memory(SlidingLogLimiter),
}

/// Per-rule request limiter
///
/// With a cache the limiter counts in fixed windows shared by every process
/// using that cache. Without one it keeps a per-process sliding log.
pub struct RateLimiter {
    rule: RateLimitRule,
    store: LimiterStore,
    clock: Arc<dyn Clock>,
    enabled: bool,
    cleanup_probability: f64,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule, cache: Option<Arc<CacheService>>, clock: Arc<dyn Clock>) -> Self {
        let store = match cache {
            Some(cache) => LimiterStore::Cache(FixedWindowLimiter::new(cache)),
            None => LimiterStore::Memory(SlidingLogLimiter::new()),
        };

        Self {
            rule,
            store,
            clock,
            enabled: true,
            cleanup_probability: DEFAULT_CLEANUP_PROBABILITY,
        }
    }

    /// Build one of the built-in profiles from configuration
    pub fn preset(
        preset: RateLimitPreset,
        config: &RateLimitConfig,
        cache: Option<Arc<CacheService>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        Ok(Self::new(preset.rule(config)?, cache, clock)
            .with_enabled(config.enabled)
            .with_cleanup_probability(config.cleanup_probability))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_cleanup_probability(mut self, probability: f64) -> Self {
        self.cleanup_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn rule(&self) -> &RateLimitRule {
        &self.rule
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether counts live in the cache rather than in this process
    pub fn uses_cache(&self) -> bool {
        matches!(self.store, LimiterStore::Cache(_))
    }

    /// Check a request, identifying the client from its headers
    pub async fn check(&self, headers: &HeaderMap) -> RateLimitDecision {
        let identifier = resolve_identifier(headers);
        self.check_identifier(&identifier).await
    }

    /// Check and count a request for an already resolved identifier
    pub async fn check_identifier(&self, identifier: &str) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let limit = self.rule.max_requests();

        if !self.enabled {
            return RateLimitDecision::allowed(
                limit,
                limit,
                now.saturating_add(self.rule.window_ms()),
            );
        }

        self.maybe_cleanup(now).await;

        let key = self.rule.counter_key(identifier);
        let decision = match &self.store {
            LimiterStore::Cache(limiter) => limiter.check(&self.rule, &key, now).await,
            LimiterStore::Memory(limiter) => limiter.check(&self.rule, &key, now).await,
        };

        if !decision.allowed {
            warn!(
                identifier = %identifier,
                rule = %self.rule.key_prefix(),
                limit,
                retry_after = decision.retry_after_seconds.unwrap_or_default(),
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Forget the count for an identifier, e.g. after a successful login
    pub async fn clear(&self, identifier: &str) {
        let key = self.rule.counter_key(identifier);
        match &self.store {
            LimiterStore::Cache(limiter) => limiter.clear(&key).await,
            LimiterStore::Memory(limiter) => limiter.clear(&key).await,
        }
    }

    async fn maybe_cleanup(&self, now: u64) {
        if self.cleanup_probability <= 0.0 || rand::random::<f64>() >= self.cleanup_probability {
            return;
        }

        let removed = match &self.store {
            LimiterStore::Cache(limiter) => limiter.purge_local().await,
            LimiterStore::Memory(limiter) => limiter.cleanup(self.rule.window_ms(), now).await,
        };

        if removed > 0 {
            debug!(rule = %self.rule.key_prefix(), removed, "Pruned stale rate limit entries");
        }
    }
}

/// The four built-in limiters, sharing one cache
#[derive(Clone)]
pub struct RateLimiters {
    pub strict: Arc<RateLimiter>,
    pub public: Arc<RateLimiter>,
    pub api: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn from_config(
        config: &RateLimitConfig,
        cache: Option<Arc<CacheService>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        let build = |preset| -> Result<Arc<RateLimiter>, RateLimitError> {
            Ok(Arc::new(RateLimiter::preset(
                preset,
                config,
                cache.clone(),
                clock.clone(),
            )?))
        };

        Ok(Self {
            strict: build(RateLimitPreset::Strict)?,
            public: build(RateLimitPreset::Public)?,
            api: build(RateLimitPreset::Api)?,
            auth: build(RateLimitPreset::Auth)?,
        })
    }

    pub fn get(&self, preset: RateLimitPreset) -> &Arc<RateLimiter> {
        match preset {
            RateLimitPreset::Strict => &self.strict,
            RateLimitPreset::Public => &self.public,
            RateLimitPreset::Api => &self.api,
            RateLimitPreset::Auth => &self.auth,
        }
    }
}

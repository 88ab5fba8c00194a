//! Infrastructure layer

pub mod cache;
pub mod clock;
pub mod rate_limiter;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, RateLimitConfig};
use cache::{BackendLoader, CacheService, CacheTtl, DistributedCacheFactory, RedisCacheFactory};
use clock::{Clock, system_clock};
use rate_limiter::{RateLimitError, RateLimiters};

/// Owns the cache handles shared by route handlers
///
/// Built once at startup and passed to whatever needs it; there is no global
/// instance.
#[derive(Clone)]
pub struct CacheProvider {
    cache: Arc<CacheService>,
    clock: Arc<dyn Clock>,
    distributed: bool,
}

impl CacheProvider {
    /// Wire the provider from configuration, using Redis when it is enabled
    pub fn from_config(config: &Config) -> Self {
        let factory: Option<Arc<dyn DistributedCacheFactory>> = config
            .redis
            .enabled
            .then(|| {
                Arc::new(RedisCacheFactory::new(config.redis.clone()))
                    as Arc<dyn DistributedCacheFactory>
            });

        Self::with_default_ttl(
            factory,
            system_clock(),
            config.cache.sweep_interval(),
            config.cache.default_ttl(),
        )
    }

    /// Wire the provider with an explicit factory and clock
    ///
    /// `None` runs on the local store only.
    pub fn new(
        factory: Option<Arc<dyn DistributedCacheFactory>>,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        Self::with_default_ttl(factory, clock, sweep_interval, CacheTtl::MEDIUM)
    }

    /// Wire the provider with an explicit default lifetime for
    /// [`CacheService::set_default`]
    pub fn with_default_ttl(
        factory: Option<Arc<dyn DistributedCacheFactory>>,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
        default_ttl: Duration,
    ) -> Self {
        let distributed = factory.is_some();
        let loader = match factory {
            Some(factory) => BackendLoader::distributed(factory, clock.clone(), sweep_interval),
            None => BackendLoader::local_only(clock.clone(), sweep_interval),
        };

        Self {
            cache: Arc::new(CacheService::new(Arc::new(loader)).with_default_ttl(default_ttl)),
            clock,
            distributed,
        }
    }

    pub fn cache(&self) -> Arc<CacheService> {
        self.cache.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Build the preset limiters
    ///
    /// Counters go to the shared cache when a distributed backend is
    /// configured, otherwise each limiter keeps a sliding log in process.
    pub fn rate_limiters(&self, config: &RateLimitConfig) -> Result<RateLimiters, RateLimitError> {
        let cache = self.distributed.then(|| self.cache.clone());
        RateLimiters::from_config(config, cache, self.clock.clone())
    }
}

//! Test doubles for the distributed backend

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use harvest_core::infrastructure::cache::{
    CacheBackend, CacheError, ConnectionStatus, DistributedCacheFactory, LocalCache,
};
use harvest_core::infrastructure::clock::Clock;

/// Factory whose connection attempt always fails
#[derive(Default)]
pub struct FailingFactory {
    pub calls: AtomicUsize,
}

impl FailingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributedCacheFactory for FailingFactory {
    async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::connection("connection refused (127.0.0.1:6379)"))
    }
}

/// In-memory stand-in for a remote store that can be made to fail on demand
pub struct FlakyBackend {
    store: LocalCache,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            store: LocalCache::new(clock, Duration::from_secs(60)),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Disconnected)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        self.guard()?;
        self.store.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.guard()?;
        self.store.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        self.guard()?;
        self.store.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.guard()?;
        self.store.delete_pattern(pattern).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.guard()?;
        self.store.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.guard()?;
        self.store.ttl(key).await
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        self.guard()?;
        self.store.increment(key, by).await
    }

    async fn health_check(&self) -> Result<Duration, CacheError> {
        self.guard()?;
        Ok(Duration::from_millis(1))
    }

    async fn disconnect(&self) {
        self.store.disconnect().await;
    }

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: !self.failing.load(Ordering::SeqCst),
            reconnect_attempts: 0,
        }
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Factory that hands out one shared [`FlakyBackend`]
pub struct FlakyFactory {
    pub backend: Arc<FlakyBackend>,
    pub calls: AtomicUsize,
}

impl FlakyFactory {
    pub fn new(backend: Arc<FlakyBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DistributedCacheFactory for FlakyFactory {
    async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone())
    }
}

//! Cache facade
//!
//! Route handlers talk to [`CacheService`] only. It resolves the active
//! backend through the [`BackendLoader`] and, when a distributed call fails,
//! serves that one call from the local store. Callers never see backend errors.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::{CacheBackend, ConnectionStatus};
use super::errors::CacheError;
use super::keys::CacheTtl;
use super::loader::{ActiveBackend, BackendLoader, BackendStatus};

/// A single operation inside a [`CacheService::batch`] call
#[derive(Debug, Clone)]
pub enum CacheOperation {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: serde_json::Value,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
    Exists {
        key: String,
    },
}

impl CacheOperation {
    fn key(&self) -> &str {
        match self {
            Self::Get { key } | Self::Set { key, .. } | Self::Delete { key } | Self::Exists { key } => {
                key
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Set { .. } => "set",
            Self::Delete { .. } => "delete",
            Self::Exists { .. } => "exists",
        }
    }
}

/// Outcome of one batched operation, in the same position as its input
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOperationResult {
    Value(Option<serde_json::Value>),
    Stored(bool),
    Deleted(u64),
    Exists(bool),
}

/// Health report for the active backend
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub backend: &'static str,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Cache facade with transparent local fallback
pub struct CacheService {
    loader: Arc<BackendLoader>,
    default_ttl: Duration,
}

impl CacheService {
    pub fn new(loader: Arc<BackendLoader>) -> Self {
        Self {
            loader,
            default_ttl: CacheTtl::MEDIUM,
        }
    }

    /// Lifetime used by [`set_default`](Self::set_default)
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn loader(&self) -> &Arc<BackendLoader> {
        &self.loader
    }

    async fn execute<T, F, Fut>(&self, operation: &'static str, key: &str, call: F) -> Result<T, CacheError>
    where
        F: Fn(Arc<dyn CacheBackend>) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let active = self.loader.backend().await;
        self.execute_on(&active, operation, key, call).await
    }

    async fn execute_on<T, F, Fut>(
        &self,
        active: &ActiveBackend,
        operation: &'static str,
        key: &str,
        call: F,
    ) -> Result<T, CacheError>
    where
        F: Fn(Arc<dyn CacheBackend>) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        match call(active.handle()).await {
            Ok(value) => Ok(value),
            Err(e) if active.is_distributed() => {
                warn!(
                    operation,
                    key = %key,
                    error = %e,
                    "Distributed cache call failed, serving from local cache"
                );
                let local: Arc<dyn CacheBackend> = self.loader.local_store().await;
                call(local).await
            }
            Err(e) => Err(e),
        }
    }

    /// Get a typed value; a type mismatch counts as a miss
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let value = match self
            .execute("get", key, |backend| async move { backend.get(key).await })
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache get failed");
                return None;
            }
        };

        let Some(value) = value else {
            debug!(key = %key, "Cache miss");
            return None;
        };

        match serde_json::from_value(value) {
            Ok(typed) => {
                debug!(key = %key, "Cache hit");
                Some(typed)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape, treating as miss");
                None
            }
        }
    }

    /// Store a value; returns whether it was written
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool
    where
        T: Serialize + ?Sized,
    {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };

        match self
            .execute("set", key, |backend| {
                let value = value.clone();
                async move { backend.set(key, value, ttl).await }
            })
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache set failed");
                false
            }
        }
    }

    /// Store a value with the configured default lifetime
    pub async fn set_default<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        self.set(key, value, Some(self.default_ttl)).await
    }

    pub async fn delete(&self, key: &str) -> u64 {
        self.execute("delete", key, |backend| async move { backend.delete(key).await })
            .await
            .unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Cache delete failed");
                0
            })
    }

    /// Delete every key matching a `*`/`?` glob
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        self.execute("delete_pattern", pattern, |backend| async move {
            backend.delete_pattern(pattern).await
        })
        .await
        .unwrap_or_else(|e| {
            warn!(pattern = %pattern, error = %e, "Cache pattern delete failed");
            0
        })
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.execute("exists", key, |backend| async move { backend.exists(key).await })
            .await
            .unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Cache exists failed");
                false
            })
    }

    /// Remaining lifetime of a key
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.execute("ttl", key, |backend| async move { backend.ttl(key).await })
            .await
            .unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Cache ttl failed");
                None
            })
    }

    pub async fn increment(&self, key: &str, by: i64) -> Option<i64> {
        match self
            .execute("increment", key, |backend| async move {
                backend.increment(key, by).await
            })
            .await
        {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache increment failed");
                None
            }
        }
    }

    /// Return the cached value, or compute, store and return it
    ///
    /// Concurrent misses each run `factory`. Factory errors are returned as-is
    /// and nothing is stored.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = factory().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Run several operations against one resolved backend
    pub async fn batch(&self, operations: Vec<CacheOperation>) -> Vec<CacheOperationResult> {
        let active = self.loader.backend().await;

        let futures = operations
            .iter()
            .map(|operation| self.run_operation(&active, operation));

        futures::future::join_all(futures).await
    }

    async fn run_operation(
        &self,
        active: &ActiveBackend,
        operation: &CacheOperation,
    ) -> CacheOperationResult {
        let key = operation.key();

        let result = match operation {
            CacheOperation::Get { .. } => self
                .execute_on(active, "get", key, |backend| async move { backend.get(key).await })
                .await
                .map(CacheOperationResult::Value),
            CacheOperation::Set { value, ttl, .. } => self
                .execute_on(active, "set", key, |backend| {
                    let value = value.clone();
                    let ttl = *ttl;
                    async move { backend.set(key, value, ttl).await }
                })
                .await
                .map(CacheOperationResult::Stored),
            CacheOperation::Delete { .. } => self
                .execute_on(active, "delete", key, |backend| async move {
                    backend.delete(key).await
                })
                .await
                .map(CacheOperationResult::Deleted),
            CacheOperation::Exists { .. } => self
                .execute_on(active, "exists", key, |backend| async move {
                    backend.exists(key).await
                })
                .await
                .map(CacheOperationResult::Exists),
        };

        result.unwrap_or_else(|e| {
            warn!(operation = operation.name(), key = %key, error = %e, "Batched cache operation failed");
            match operation {
                CacheOperation::Get { .. } => CacheOperationResult::Value(None),
                CacheOperation::Set { .. } => CacheOperationResult::Stored(false),
                CacheOperation::Delete { .. } => CacheOperationResult::Deleted(0),
                CacheOperation::Exists { .. } => CacheOperationResult::Exists(false),
            }
        })
    }

    /// Probe the active backend without falling back
    pub async fn health_check(&self) -> CacheHealth {
        let backend = self.loader.backend().await.handle();

        match backend.health_check().await {
            Ok(latency) => CacheHealth {
                backend: backend.backend_name(),
                healthy: true,
                latency_ms: Some(latency.as_millis() as u64),
                error: None,
            },
            Err(e) => {
                warn!(backend = backend.backend_name(), error = %e, "Cache health check failed");
                CacheHealth {
                    backend: backend.backend_name(),
                    healthy: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.loader.backend().await.handle().connection_status()
    }

    /// Snapshot of the loader without I/O
    pub fn status(&self) -> BackendStatus {
        self.loader.status()
    }

    /// Release every backend; the next call resolves a backend again
    pub async fn disconnect(&self) {
        self.loader.reset().await;
    }
}

//! Cache backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::CacheError;

/// Connection state reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    /// Status of a backend that cannot lose its connection
    pub fn always_connected() -> Self {
        Self {
            connected: true,
            reconnect_attempts: 0,
        }
    }
}

/// Key/value store with TTL support
///
/// Values are carried as [`serde_json::Value`] so the trait stays object-safe;
/// typed access lives on [`CacheService`](super::CacheService).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a live value
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store a value, optionally expiring after `ttl`
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Remove a key, returning the number of entries removed
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    /// Remove every key matching a `*`/`?` glob
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining lifetime; `None` when the key is missing or never expires
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Add `by` to an integer value, creating it at zero when missing
    async fn increment(&self, key: &str, by: i64) -> Result<i64, CacheError>;

    /// Round-trip latency to the backend
    async fn health_check(&self) -> Result<Duration, CacheError>;

    /// Release connections and background tasks
    async fn disconnect(&self);

    fn connection_status(&self) -> ConnectionStatus;

    fn backend_name(&self) -> &'static str;
}

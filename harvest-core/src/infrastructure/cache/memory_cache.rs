//! In-process cache used when no distributed backend is available

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::backend::{CacheBackend, ConnectionStatus};
use super::errors::CacheError;
use super::pattern::GlobPattern;
use crate::infrastructure::clock::Clock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Option<u64>,
}

impl CacheEntry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

type Entries = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// Map-backed cache with lazy expiry and a periodic sweep
pub struct LocalCache {
    entries: Entries,
    clock: Arc<dyn Clock>,
    sweeper: Option<JoinHandle<()>>,
}

impl LocalCache {
    pub const NAME: &'static str = "local";

    /// Create the store and start the sweep task if a tokio runtime is running
    pub fn new(clock: Arc<dyn Clock>, sweep_interval: Duration) -> Self {
        let entries: Entries = Arc::new(RwLock::new(HashMap::new()));

        let sweeper = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(Self::sweep_loop(
                entries.clone(),
                clock.clone(),
                sweep_interval,
            ))),
            Err(_) => {
                debug!("No tokio runtime available, local cache sweep disabled");
                None
            }
        };

        Self {
            entries,
            clock,
            sweeper,
        }
    }

    async fn sweep_loop(entries: Entries, clock: Arc<dyn Clock>, period: Duration) {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = Self::sweep(&entries, clock.now_millis()).await;
            if removed > 0 {
                debug!(removed, "Swept expired local cache entries");
            }
        }
    }

    async fn sweep(entries: &Entries, now: u64) -> usize {
        let mut entries = entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Remove expired entries immediately
    pub async fn purge_expired(&self) -> usize {
        Self::sweep(&self.entries, self.clock.now_millis()).await
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expires_at(&self, ttl: Option<Duration>) -> Option<u64> {
        ttl.map(|ttl| {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            self.clock.now_millis().saturating_add(millis)
        })
    }

    /// Look up a live entry, evicting it if it has expired
    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check under the write lock; a concurrent set may have replaced it
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            trace!(key = %key, "Evicted expired local cache entry");
        }
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }
}

fn as_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(self.live_entry(key).await.map(|entry| entry.value))
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: self.expires_at(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self.entries.write().await.remove(key).map_or(0, |_| 1))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let glob = GlobPattern::new(pattern)?;
        let now = self.clock.now_millis();

        let mut entries = self.entries.write().await;
        let mut removed = 0u64;
        entries.retain(|key, entry| {
            if entry.is_expired(now) {
                return false;
            }
            if glob.is_match(key) {
                removed += 1;
                return false;
            }
            true
        });

        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = self.clock.now_millis();
        Ok(self
            .live_entry(key)
            .await
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| Duration::from_millis(expires_at.saturating_sub(now))))
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;

        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if entry.is_expired(now) {
                    *entry = CacheEntry {
                        value: serde_json::Value::from(0),
                        expires_at: None,
                    };
                }
            })
            .or_insert_with(|| CacheEntry {
                value: serde_json::Value::from(0),
                expires_at: None,
            });

        let current = as_integer(&entry.value).ok_or_else(|| CacheError::NotAnInteger {
            key: key.to_string(),
        })?;
        let next = current
            .checked_add(by)
            .ok_or_else(|| CacheError::IncrementOverflow {
                key: key.to_string(),
            })?;
        entry.value = serde_json::Value::from(next);

        Ok(next)
    }

    async fn health_check(&self) -> Result<Duration, CacheError> {
        Ok(Duration::ZERO)
    }

    async fn disconnect(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        self.entries.write().await.clear();
    }

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::always_connected()
    }

    fn backend_name(&self) -> &'static str {
        Self::NAME
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

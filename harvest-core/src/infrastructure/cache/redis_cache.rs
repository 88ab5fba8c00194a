//! Redis-protocol cache backend
//!
//! Works against Redis, Dragonfly or any server speaking the same protocol.
//! A single multiplexed connection is shared by all callers. When it drops,
//! the adapter fails commands fast with [`CacheError::Disconnected`] and
//! reconnects in a background task with a linear backoff. A cycle that runs
//! out of attempts is restarted by the next command.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, FromRedisValue};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{CacheBackend, ConnectionStatus};
use super::errors::CacheError;
use super::loader::DistributedCacheFactory;
use crate::config::RedisConfig;

const SCAN_COUNT: u64 = 100;
const RECONNECT_STEP_MS: u64 = 100;
const RECONNECT_MAX_DELAY_MS: u64 = 3_000;

/// Backoff before reconnect attempt `attempt` (1-based)
pub fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_millis((attempt as u64 * RECONNECT_STEP_MS).min(RECONNECT_MAX_DELAY_MS))
}

/// Escape the characters Redis treats as glob syntax but local matching
/// treats literally, so both backends agree on what a pattern means
fn escape_redis_glob(pattern: &str, keep_wildcards: bool) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '[' | ']' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '*' | '?' if !keep_wildcards => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

struct Inner {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    key_prefix: String,
    connected: AtomicBool,
    reconnect_attempts: AtomicU32,
    reconnecting: AtomicBool,
    shutdown: AtomicBool,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    max_reconnect_attempts: u32,
    connect_timeout: Duration,
    command_timeout: Duration,
}

/// Distributed cache backend
#[derive(Clone)]
pub struct RedisCache {
    inner: Arc<Inner>,
}

impl RedisCache {
    pub const NAME: &'static str = "redis";

    /// Open a connection and verify it with `PING`
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached within the connect timeout
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let url = config.connection_url().map_err(|e| {
            error!(error = %e, "Invalid Redis connection settings");
            CacheError::connection(e.to_string())
        })?;
        let client = Client::open(url).map_err(|e| {
            error!(error = %e, "Invalid Redis connection settings");
            CacheError::connection(e.to_string())
        })?;

        let mut connection = open_connection(&client, config.connect_timeout()).await?;

        tokio::time::timeout(
            config.connect_timeout(),
            redis::cmd("PING").query_async::<String>(&mut connection),
        )
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(|e| CacheError::connection(format!("PING failed: {}", e)))?;

        debug!(
            host = %config.host,
            port = config.port,
            db = config.db,
            "Connected to Redis"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                connection: RwLock::new(Some(connection)),
                key_prefix: config.key_prefix.clone(),
                connected: AtomicBool::new(true),
                reconnect_attempts: AtomicU32::new(0),
                reconnecting: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                reconnect_task: Mutex::new(None),
                max_reconnect_attempts: config.max_reconnect_attempts,
                connect_timeout: config.connect_timeout(),
                command_timeout: config.command_timeout(),
            }),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.inner.key_prefix, key)
    }

    async fn query<T: FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, CacheError> {
        let mut connection = self.inner.connection().await?;

        match tokio::time::timeout(self.inner.command_timeout, cmd.query_async::<T>(&mut connection))
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() => {
                self.inner.handle_connection_loss(&e.to_string()).await;
                Err(CacheError::connection(e.to_string()))
            }
            Ok(Err(e)) => Err(CacheError::command(e.to_string())),
            Err(_) => {
                self.inner.handle_connection_loss("command timed out").await;
                Err(CacheError::Timeout)
            }
        }
    }
}

async fn open_connection(
    client: &Client,
    timeout: Duration,
) -> Result<MultiplexedConnection, CacheError> {
    tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(|e| CacheError::connection(e.to_string()))
}

impl Inner {
    async fn connection(self: &Arc<Self>) -> Result<MultiplexedConnection, CacheError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(CacheError::Disconnected);
        }

        let connection = self.connection.read().await.clone();
        match connection {
            Some(connection) => Ok(connection),
            None => {
                // A previous cycle may have run out of attempts
                self.start_reconnect("no live connection");
                Err(CacheError::Disconnected)
            }
        }
    }

    async fn handle_connection_loss(self: &Arc<Self>, reason: &str) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.connection.write().await = None;
        self.start_reconnect(reason);
    }

    /// Spawn a reconnect cycle unless one is running or the adapter is shut down
    fn start_reconnect(self: &Arc<Self>, reason: &str) {
        if self.shutdown.load(Ordering::SeqCst) || self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        warn!(reason = %reason, "Lost connection to Redis, reconnecting in background");
        let handle = tokio::spawn(Self::reconnect_loop(self.clone()));
        if let Ok(mut task) = self.reconnect_task.lock() {
            *task = Some(handle);
        }
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let attempt = self.reconnect_attempts.load(Ordering::SeqCst) + 1;
            if attempt > self.max_reconnect_attempts {
                error!(
                    attempts = self.max_reconnect_attempts,
                    "Redis reconnect attempts exhausted, retrying on next command"
                );
                break;
            }
            self.reconnect_attempts.store(attempt, Ordering::SeqCst);

            tokio::time::sleep(reconnect_delay(attempt)).await;

            match open_connection(&self.client, self.connect_timeout).await {
                Ok(connection) => {
                    *self.connection.write().await = Some(connection);
                    self.connected.store(true, Ordering::SeqCst);
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                    info!(attempt, "Reconnected to Redis");
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Redis reconnect attempt failed");
                }
            }
        }

        self.reconnecting.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(self.prefixed(key));

        let raw: Option<String> = self.query(cmd).await?;
        Ok(raw.map(|raw| match serde_json::from_str(&raw) {
            Ok(value) => value,
            // Written by another client as a bare string
            Err(_) => serde_json::Value::String(raw),
        }))
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let payload = serde_json::to_string(&value)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed(key)).arg(payload);
        if let Some(ttl) = ttl {
            // EX takes whole seconds and rejects zero
            let seconds = ttl.as_millis().div_ceil(1000).max(1) as u64;
            cmd.arg("EX").arg(seconds);
        }

        let reply: Option<String> = self.query(cmd).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(self.prefixed(key));
        self.query(cmd).await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let match_pattern = format!(
            "{}{}",
            escape_redis_glob(&self.inner.key_prefix, false),
            escape_redis_glob(pattern, true)
        );

        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);

            let (next, keys): (u64, Vec<String>) = self.query(scan).await?;

            if !keys.is_empty() {
                let mut del = redis::cmd("DEL");
                del.arg(&keys);
                deleted += self.query::<u64>(del).await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern = %pattern, deleted, "Deleted keys by pattern");
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(self.prefixed(key));
        let count: u64 = self.query(cmd).await?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut cmd = redis::cmd("PTTL");
        cmd.arg(self.prefixed(key));
        let millis: i64 = self.query(cmd).await?;

        // -2: missing, -1: no expiry
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        let mut cmd = redis::cmd("INCRBY");
        cmd.arg(self.prefixed(key)).arg(by);

        match self.query(cmd).await {
            Err(CacheError::Command(message)) if message.contains("not an integer") => {
                Err(CacheError::NotAnInteger {
                    key: key.to_string(),
                })
            }
            Err(CacheError::Command(message)) if message.contains("overflow") => {
                Err(CacheError::IncrementOverflow {
                    key: key.to_string(),
                })
            }
            other => other,
        }
    }

    async fn health_check(&self) -> Result<Duration, CacheError> {
        let started = Instant::now();
        let _: String = self.query(redis::cmd("PING")).await?;
        Ok(started.elapsed())
    }

    async fn disconnect(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if let Ok(mut task) = self.inner.reconnect_task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
        *self.inner.connection.write().await = None;
        self.inner.connected.store(false, Ordering::SeqCst);
        info!("Disconnected from Redis");
    }

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.inner.connected.load(Ordering::SeqCst),
            reconnect_attempts: self.inner.reconnect_attempts.load(Ordering::SeqCst),
        }
    }

    fn backend_name(&self) -> &'static str {
        Self::NAME
    }
}

/// Connects a [`RedisCache`] on first use of the cache
#[derive(Debug, Clone)]
pub struct RedisCacheFactory {
    config: RedisConfig,
}

impl RedisCacheFactory {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DistributedCacheFactory for RedisCacheFactory {
    async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
        let cache = RedisCache::connect(&self.config).await?;
        Ok(Arc::new(cache))
    }
}

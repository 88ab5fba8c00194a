//! Caching infrastructure

pub mod backend;
pub mod errors;
pub mod keys;
pub mod loader;
pub mod memory_cache;
pub mod pattern;
pub mod redis_cache;
pub mod service;

pub use backend::{CacheBackend, ConnectionStatus};
pub use errors::CacheError;
pub use keys::{CacheKeys, CachePatterns, CacheTtl};
pub use loader::{ActiveBackend, BackendLoader, BackendStatus, DistributedCacheFactory};
pub use memory_cache::LocalCache;
pub use redis_cache::{RedisCache, RedisCacheFactory};
pub use service::{CacheHealth, CacheOperation, CacheOperationResult, CacheService};

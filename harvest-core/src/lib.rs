//! Harvest Core - caching and rate limiting for the Harvest marketplace
//!
//! This crate provides the shared infrastructure that route handlers use to
//! cache computed data and to throttle clients:
//!
//! # Modules
//!
//! - [`config`]: strongly-typed configuration with TOML and environment variable support
//! - [`infrastructure`]: cache backends, backend loader, cache facade and rate limiter
//! - [`logging`]: structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! harvest-core/
//! ├── config/              # Configuration management and validation
//! ├── infrastructure/
//! │   ├── clock            # Injectable time source
//! │   ├── cache/           # Local store, Redis adapter, loader, facade
//! │   └── rate_limiter/    # Fixed-window limiter, sliding-log fallback
//! └── logging              # tracing-subscriber setup
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use harvest_core::{Config, CacheProvider};
//!
//! let config = Config::load()?;
//! let provider = CacheProvider::from_config(&config);
//! let limiters = provider.rate_limiters(&config.rate_limit)?;
//!
//! let decision = limiters.api.check(request.headers()).await;
//! ```
//!
//! Environment variables use the `HARVEST__` prefix with double underscore separators:
//!
//! ```bash
//! HARVEST__REDIS__ENABLED=true
//! HARVEST__REDIS__HOST=cache.internal
//! ```

pub mod config;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use infrastructure::CacheProvider;
pub use logging::init_tracing;

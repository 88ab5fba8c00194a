//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub redis: RedisConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How often the local store sweeps expired entries
    pub sweep_interval_seconds: u64,
    /// Lifetime of entries stored with `CacheService::set_default`
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 60,
            default_ttl_seconds: 300, // 5 minutes
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

/// Distributed cache (Redis/Dragonfly) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Feature flag; when false the process runs on the local store only
    pub enabled: bool,
    /// Full connection URL; overrides the individual connection fields when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    pub tls: bool,
    /// Namespace prepended to every key
    pub key_prefix: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            tls: false,
            key_prefix: "harvest:".to_string(),
            connect_timeout_ms: 5000,
            command_timeout_ms: 2000,
            max_reconnect_attempts: 10,
        }
    }
}

impl RedisConfig {
    /// Build the connection URL from the configured parts
    ///
    /// Credentials are percent-encoded, so they may contain any character.
    pub fn connection_url(&self) -> Result<String, url::ParseError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!(
            "{}://{}:{}/{}",
            scheme, self.host, self.port, self.db
        ))?;

        // Setters only fail for URLs without a host, which parse rejects
        if let Some(username) = &self.username {
            let _ = url.set_username(username);
        }
        if let Some(password) = &self.password {
            let _ = url.set_password(Some(password));
        }

        Ok(url.into())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Limits for a single named rate-limit rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    pub message: String,
}

impl RuleConfig {
    fn new(window_ms: u64, max_requests: u32, message: &str) -> Self {
        Self {
            window_ms,
            max_requests,
            message: message.to_string(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Probability that a check also prunes stale in-memory identifiers
    pub cleanup_probability: f64,
    /// Sensitive endpoints (password reset, payouts)
    pub strict: RuleConfig,
    /// Public read endpoints (catalog, farm pages)
    pub public: RuleConfig,
    /// Authenticated API traffic
    pub api: RuleConfig,
    /// Login and registration attempts
    pub auth: RuleConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_probability: 0.01,
            strict: RuleConfig::new(
                60_000,
                10,
                "Too many requests to a sensitive endpoint. Please slow down.",
            ),
            public: RuleConfig::new(60_000, 100, "Too many requests. Please try again later."),
            api: RuleConfig::new(60_000, 60, "API rate limit exceeded. Please try again later."),
            auth: RuleConfig::new(
                15 * 60_000,
                5,
                "Too many authentication attempts. Please try again later.",
            ),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.cache.validate()?;
        self.redis.validate()?;
        self.rate_limit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("HARVEST").separator("__"));

        let mut config: Config = builder.build()?.try_deserialize()?;

        // REDIS_URL is the common convention for hosted Redis providers
        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.redis.url = Some(redis_url);
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

//! Configuration validation module

use crate::config::{CacheConfig, LoggingConfig, RateLimitConfig, RedisConfig, RuleConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Cache configuration error: {message}")]
    Cache { message: String },

    #[error("Redis configuration error: {message}")]
    Redis { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn redis(message: impl Into<String>) -> Self {
        Self::Redis {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_seconds == 0 {
            return Err(ValidationError::cache(
                "Sweep interval must be greater than 0 seconds",
            ));
        }

        if self.default_ttl_seconds == 0 {
            return Err(ValidationError::cache(
                "Default TTL must be greater than 0 seconds",
            ));
        }

        Ok(())
    }
}

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // Connection details only matter when the backend is switched on
        if !self.enabled {
            return Ok(());
        }

        if self.url.is_none() {
            if self.host.is_empty() {
                return Err(ValidationError::redis("Host cannot be empty"));
            }
            if self.port == 0 {
                return Err(ValidationError::redis(format!(
                    "Port must be in range 1-65535, got {}",
                    self.port
                )));
            }
        }

        if self.db < 0 {
            return Err(ValidationError::redis(format!(
                "Database index must be non-negative, got {}",
                self.db
            )));
        }

        if self.connect_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(ValidationError::redis("Timeouts must be greater than 0"));
        }

        Ok(())
    }
}

fn validate_rule(name: &str, rule: &RuleConfig) -> Result<(), ValidationError> {
    if rule.window_ms == 0 {
        return Err(ValidationError::rate_limit(format!(
            "{} rule: window_ms must be greater than 0",
            name
        )));
    }

    if rule.max_requests == 0 {
        return Err(ValidationError::rate_limit(format!(
            "{} rule: max_requests must be greater than 0",
            name
        )));
    }

    Ok(())
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.cleanup_probability) {
            return Err(ValidationError::rate_limit(format!(
                "cleanup_probability must be within 0.0..=1.0, got {}",
                self.cleanup_probability
            )));
        }

        validate_rule("strict", &self.strict)?;
        validate_rule("public", &self.public)?;
        validate_rule("api", &self.api)?;
        validate_rule("auth", &self.auth)?;

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "Unsupported log format '{}', expected 'json' or 'pretty'",
                other
            ))),
        }
    }
}

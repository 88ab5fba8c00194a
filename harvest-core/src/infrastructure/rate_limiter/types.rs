//! Rate limiter types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::{RateLimitConfig, RuleConfig};

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit rule '{key_prefix}': {message}")]
    InvalidRule { key_prefix: String, message: String },
}

impl RateLimitError {
    fn invalid_rule(key_prefix: &str, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            key_prefix: key_prefix.to_string(),
            message: message.into(),
        }
    }
}

/// Fixed-window limit applied to one family of endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    window_ms: u64,
    max_requests: u32,
    key_prefix: String,
    message: String,
}

impl RateLimitRule {
    /// Build a rule; zero windows and zero budgets are rejected
    pub fn new(
        window_ms: u64,
        max_requests: u32,
        key_prefix: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, RateLimitError> {
        let key_prefix = key_prefix.into();

        if window_ms == 0 {
            return Err(RateLimitError::invalid_rule(
                &key_prefix,
                "window must be greater than 0 ms",
            ));
        }
        if max_requests == 0 {
            return Err(RateLimitError::invalid_rule(
                &key_prefix,
                "max_requests must be greater than 0",
            ));
        }

        Ok(Self {
            window_ms,
            max_requests,
            key_prefix,
            message: message.into(),
        })
    }

    pub fn from_config(
        config: &RuleConfig,
        key_prefix: impl Into<String>,
    ) -> Result<Self, RateLimitError> {
        Self::new(
            config.window_ms,
            config.max_requests,
            key_prefix,
            config.message.clone(),
        )
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Message returned to denied clients
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Storage key for an identifier under this rule
    pub fn counter_key(&self, identifier: &str) -> String {
        format!("{}:{}", self.key_prefix, identifier)
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the current window ends, in milliseconds since the Unix epoch
    pub reset_at: u64,
    /// Seconds to wait before retrying (only set when denied)
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitDecision {
    pub fn allowed(limit: u32, remaining: u32, reset_at: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
            retry_after_seconds: None,
        }
    }

    pub fn denied(limit: u32, reset_at: u64, retry_after_seconds: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    /// Window end in Unix seconds, rounded up
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at.div_ceil(1000)
    }
}

/// Stored per-identifier counter for the fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub count: u32,
    /// Window end in milliseconds since the Unix epoch
    #[serde(rename = "resetAt")]
    pub reset_at: u64,
}

impl RateLimitCounter {
    pub fn start(now: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(window_ms),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at
    }
}

/// Seconds until `reset_at`, rounded up
pub fn retry_after_seconds(reset_at: u64, now: u64) -> u64 {
    reset_at.saturating_sub(now).div_ceil(1000)
}

/// Built-in limiter profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitPreset {
    /// 10 requests per minute
    Strict,
    /// 100 requests per minute
    Public,
    /// 60 requests per minute
    Api,
    /// 5 attempts per 15 minutes
    Auth,
}

impl RateLimitPreset {
    pub const ALL: [RateLimitPreset; 4] = [Self::Strict, Self::Public, Self::Api, Self::Auth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Public => "public",
            Self::Api => "api",
            Self::Auth => "auth",
        }
    }

    pub fn key_prefix(&self) -> String {
        format!("ratelimit:{}", self.as_str())
    }

    fn rule_config<'a>(&self, config: &'a RateLimitConfig) -> &'a RuleConfig {
        match self {
            Self::Strict => &config.strict,
            Self::Public => &config.public,
            Self::Api => &config.api,
            Self::Auth => &config.auth,
        }
    }

    /// The rule for this preset as configured
    pub fn rule(&self, config: &RateLimitConfig) -> Result<RateLimitRule, RateLimitError> {
        RateLimitRule::from_config(self.rule_config(config), self.key_prefix())
    }
}

impl fmt::Display for RateLimitPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Cache error types

/// Errors raised by cache backends
///
/// These never cross the [`CacheService`](super::CacheService) boundary; the
/// facade turns them into a warning and a local fallback.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to connect to cache backend: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Command(String),

    #[error("Cache command timed out")]
    Timeout,

    #[error("Cache backend is disconnected")]
    Disconnected,

    #[error("Cache value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Value at key '{key}' is not an integer")]
    NotAnInteger { key: String },

    #[error("Increment of key '{key}' would overflow")]
    IncrementOverflow { key: String },
}

impl CacheError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Whether the error indicates the link to the backend is gone
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout | Self::Disconnected
        )
    }
}

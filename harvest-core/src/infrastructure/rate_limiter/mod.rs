//! Request rate limiting
//!
//! - Fixed window counters in the shared cache
//! - Sliding log fallback when no cache is configured
//! - Built-in presets for public, API, auth and sensitive endpoints

pub mod fixed_window;
pub mod identifier;
pub mod service;
pub mod sliding_log;
pub mod types;

pub use identifier::{USER_ID_HEADER, resolve_identifier};
pub use service::{RateLimiter, RateLimiters};
pub use types::{RateLimitCounter, RateLimitDecision, RateLimitError, RateLimitPreset, RateLimitRule};

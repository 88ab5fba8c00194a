//! Harvest Web - HTTP glue for the Harvest rate limiter
//!
//! Turns [`RateLimitDecision`](harvest_core::infrastructure::rate_limiter::RateLimitDecision)s
//! into responses: `X-RateLimit-*` headers on every response and a JSON 429
//! with `Retry-After` when a client is over its limit.

pub mod presentation;

pub use presentation::{
    RateLimitErrorBody, apply_rate_limit_headers, rate_limit_exceeded_response,
    rate_limit_middleware, with_rate_limit,
};

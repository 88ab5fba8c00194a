//! Presentation layer

pub mod middleware;
pub mod models;

pub use middleware::{
    apply_rate_limit_headers, rate_limit_exceeded_response, rate_limit_middleware,
    with_rate_limit,
};
pub use models::RateLimitErrorBody;

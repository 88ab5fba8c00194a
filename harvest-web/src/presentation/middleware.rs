//! Rate limit response helpers and middleware

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::sync::Arc;

use harvest_core::infrastructure::rate_limiter::{
    RateLimitDecision, RateLimiter, resolve_identifier,
};

use super::models::RateLimitErrorBody;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Set the `X-RateLimit-*` headers for a decision
///
/// The reset header carries the window end in Unix seconds.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_secs()));
}

/// Build the 429 response for a denied decision
pub fn rate_limit_exceeded_response(decision: &RateLimitDecision, message: &str) -> Response {
    let body = RateLimitErrorBody {
        error: message.to_string(),
        retry_after: decision.retry_after_seconds,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

    let headers = response.headers_mut();
    if let Some(retry_after) = decision.retry_after_seconds {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }
    apply_rate_limit_headers(headers, decision);

    response
}

/// Run `handler` only if the limiter admits the request
///
/// Denied requests get the 429 without the handler running. Admitted
/// responses get the rate limit headers added.
pub async fn with_rate_limit<F, Fut, R>(
    limiter: &RateLimiter,
    headers: &HeaderMap,
    handler: F,
) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = R>,
    R: IntoResponse,
{
    let decision = limiter.check(headers).await;
    if !decision.allowed {
        return rate_limit_exceeded_response(&decision, limiter.rule().message());
    }

    let mut response = handler().await.into_response();
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Rate limit every route behind this layer
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/api/farms", get(list_farms))
///     .layer(axum::middleware::from_fn_with_state(limiters.api.clone(), rate_limit_middleware));
/// ```
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    // Resolve before awaiting; the request body is not Sync
    let identifier = resolve_identifier(request.headers());
    let decision = limiter.check_identifier(&identifier).await;

    if !decision.allowed {
        tracing::debug!(
            path = %request.uri().path(),
            rule = %limiter.rule().key_prefix(),
            "Rejecting rate limited request"
        );
        return rate_limit_exceeded_response(&decision, limiter.rule().message());
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, middleware, routing::get};
    use harvest_core::infrastructure::clock::ManualClock;
    use harvest_core::infrastructure::rate_limiter::RateLimitRule;
    use tower::ServiceExt;

    const NOW: u64 = 1_700_000_000_000;

    fn limiter(max: u32) -> Arc<RateLimiter> {
        let rule = RateLimitRule::new(60_000, max, "ratelimit:test", "Too many requests").unwrap();
        Arc::new(
            RateLimiter::new(rule, None, Arc::new(ManualClock::new(NOW)))
                .with_cleanup_probability(0.0),
        )
    }

    #[test]
    fn test_headers_for_allowed_decision() {
        let decision = RateLimitDecision::allowed(60, 59, NOW + 60_000);
        let mut headers = HeaderMap::new();

        apply_rate_limit_headers(&mut headers, &decision);

        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "60");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "59");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "1700000060");
        assert!(headers.get("retry-after").is_none());
    }

    #[tokio::test]
    async fn test_exceeded_response() {
        let decision = RateLimitDecision::denied(5, NOW + 49_000, 49);
        let response = rate_limit_exceeded_response(&decision, "Slow down");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "49");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Slow down", "retryAfter": 49}));
    }

    #[tokio::test]
    async fn test_middleware_blocks_after_limit() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter(1), rate_limit_middleware));

        let request = || {
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", "198.51.100.1")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("x-ratelimit-remaining").unwrap(), "0");

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get("retry-after").unwrap(), "60");
    }

    #[tokio::test]
    async fn test_with_rate_limit_skips_handler_when_denied() {
        let limiter = limiter(1);
        let headers = HeaderMap::new();
        let mut runs = 0;

        let ok = with_rate_limit(&limiter, &headers, || {
            runs += 1;
            async { (StatusCode::CREATED, "created") }
        })
        .await;
        assert_eq!(ok.status(), StatusCode::CREATED);
        assert_eq!(ok.headers().get("x-ratelimit-limit").unwrap(), "1");

        let denied = with_rate_limit(&limiter, &headers, || async { "unreachable" }).await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(runs, 1);
    }
}

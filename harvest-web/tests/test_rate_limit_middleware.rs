//! End-to-end tests for rate limited routes
//!
//! Builds a router the way a service would: provider, preset limiters, and
//! one limiter layered per route group.

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use harvest_core::CacheProvider;
use harvest_core::config::RateLimitConfig;
use harvest_core::infrastructure::clock::ManualClock;
use harvest_core::infrastructure::rate_limiter::RateLimiters;
use harvest_web::{RateLimitErrorBody, rate_limit_middleware, with_rate_limit};

const T0: u64 = 1_700_000_000_000;

fn limiters(clock: Arc<ManualClock>) -> RateLimiters {
    let provider = CacheProvider::new(None, clock, Duration::from_secs(60));
    let config = RateLimitConfig {
        cleanup_probability: 0.0,
        ..RateLimitConfig::default()
    };
    provider.rate_limiters(&config).unwrap()
}

fn app(limiters: &RateLimiters) -> Router {
    let catalog = Router::new()
        .route("/farms", get(|| async { "farms" }))
        .layer(middleware::from_fn_with_state(
            limiters.public.clone(),
            rate_limit_middleware,
        ));

    let auth_limiter = limiters.auth.clone();
    let auth = Router::new().route(
        "/login",
        post(move |headers: HeaderMap| {
            let limiter = auth_limiter.clone();
            async move { with_rate_limit(&limiter, &headers, || async { "welcome" }).await }
        }),
    );

    catalog.merge(auth)
}

fn request(method: &str, uri: &str, ip: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> RateLimitErrorBody {
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_login_attempts_are_limited() {
    let clock = Arc::new(ManualClock::new(T0));
    let app = app(&limiters(clock.clone()));

    for remaining in (0..5).rev() {
        let response = app
            .clone()
            .oneshot(request("POST", "/login", "192.0.2.10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-ratelimit-remaining").unwrap(),
            remaining.to_string().as_str()
        );
    }

    clock.advance(Duration::from_secs(60));
    let denied = app
        .clone()
        .oneshot(request("POST", "/login", "192.0.2.10"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.headers().get("retry-after").unwrap(), "840");

    let body = body_json(denied).await;
    assert_eq!(body.retry_after, Some(840));
    assert!(body.error.contains("authentication attempts"));

    // Another client is unaffected
    let other = app
        .oneshot(request("POST", "/login", "192.0.2.11"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_catalog_and_login_limits_are_separate() {
    let clock = Arc::new(ManualClock::new(T0));
    let app = app(&limiters(clock));

    for _ in 0..5 {
        app.clone()
            .oneshot(request("POST", "/login", "192.0.2.20"))
            .await
            .unwrap();
    }

    let farms = app
        .oneshot(request("GET", "/farms", "192.0.2.20"))
        .await
        .unwrap();
    assert_eq!(farms.status(), StatusCode::OK);
    assert_eq!(farms.headers().get("x-ratelimit-limit").unwrap(), "100");
    assert_eq!(farms.headers().get("x-ratelimit-remaining").unwrap(), "99");
}

#[tokio::test]
async fn test_reset_header_is_unix_seconds() {
    let clock = Arc::new(ManualClock::new(T0 + 500));
    let app = app(&limiters(clock));

    let response = app
        .oneshot(request("GET", "/farms", "192.0.2.30"))
        .await
        .unwrap();

    // Window ends at T0 + 60.5 s, rounded up
    assert_eq!(
        response.headers().get("x-ratelimit-reset").unwrap(),
        ((T0 + 60_500).div_ceil(1000)).to_string().as_str()
    );
}

//! # Request Throttling
//!
//! One token bucket shared by every route, sized by `STEWARD_RATE_LIMIT`
//! (requests per second, default 100, `0` turns throttling off). Throttled
//! requests get 429 with a `Retry-After` hint in whole seconds.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

const DEFAULT_RPS: u32 = 100;

/// Bucket shared across handlers.
pub type RequestLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Bucket refilled at `requests_per_second`; zero means the default rate.
pub fn build_limiter(requests_per_second: u32) -> RequestLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RPS))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// `STEWARD_RATE_LIMIT`, or the default when unset or not a number.
pub fn configured_rate_limit() -> u32 {
    std::env::var("STEWARD_RATE_LIMIT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RPS)
}

/// Seconds until the bucket admits another request, at least one.
fn retry_after_secs(limiter: &RequestLimiter) -> Option<u64> {
    let refused = limiter.check().err()?;
    let wait = refused.wait_time_from(DefaultClock::default().now());
    Some(wait.as_secs().max(1))
}

/// Admit the request or answer 429.
pub async fn throttle(
    State(limiter): State<RequestLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(retry_after) = retry_after_secs(&limiter) else {
        return next.run(request).await;
    };
    tracing::warn!(
        event = "rate_limited",
        path = %request.uri().path(),
        retry_after,
        "Request throttled"
    );
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        "Too Many Requests",
    )
        .into_response()
}

// =============================================================================
// TESTS
// =============================================================================

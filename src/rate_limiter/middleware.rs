//! # Admission Middleware
//!
//! axum glue for [`RateLimiter`]. Mount with
//! `axum::middleware::from_fn_with_state(limiter, rate_limit)`.
//!
//! Denied requests get:
//!
//! ```text
//!     HTTP/1.1 429 Too Many Requests
//!     Retry-After: <seconds>
//!     X-RateLimit-Limit: <capacity>
//!     X-RateLimit-Remaining: 0
//!     Content-Type: application/json
//!
//!     {"success":false,"error":"Rate limit exceeded. Please try again later."}
//! ```
//!
//! Admitted requests are forwarded untouched.

use super::limiter::RateLimiter;
use crate::models::ErrorResponse;
use axum::{
    body::Body,
    extract::State,
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Admission middleware: forwards admitted requests, answers 429 otherwise.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = limiter.decide(&request);
    if decision.allowed {
        return next.run(request).await;
    }

    debug!(
        path = %request.uri().path(),
        retry_after = decision.retry_after_secs,
        "Request rate limited"
    );
    too_many_requests(decision.retry_after_secs, limiter.config().capacity)
}

/// The 429 response sent to a denied client.
pub fn too_many_requests(retry_after_secs: u64, limit: u32) -> Response {
    // Json sets Content-Type: application/json
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new(RATE_LIMIT_MESSAGE)),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
    response
}

/// Serves the limiter's counter snapshot as JSON.
pub async fn metrics_handler(State(limiter): State<Arc<RateLimiter>>) -> Response {
    Json(limiter.metrics()).into_response()
}

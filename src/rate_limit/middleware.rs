//! Rate limiting middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GateError;
use crate::observability::metrics;
use crate::rate_limit::limiter::{Decision, FixedWindowLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Count the request against `limiter` and reject with 429 past the quota.
///
/// Quota headers go on every response, allowed or denied. When limiters are
/// stacked, an allowed response keeps the headers of the innermost limiter
/// that set them. A store failure lets the request through without headers.
pub async fn rate_limit(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = limiter.key_for(&request);

    let decision = match limiter.check(&key).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(limiter = %limiter.name(), key = %key, error = %e, "Rate limit store failed, allowing request");
            metrics::record_rate_limit_decision(limiter.name(), "error");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        tracing::warn!(limiter = %limiter.name(), key = %key, "Rate limit exceeded");
        metrics::record_rate_limit_decision(limiter.name(), "denied");

        let mut response = GateError::quota_exceeded(limiter.message()).into_response();
        let headers = response.headers_mut();
        apply_headers(headers, &decision);
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs(limiter.now_ms())),
        );
        return response;
    }

    metrics::record_rate_limit_decision(limiter.name(), "allowed");
    let mut response = next.run(request).await;
    if !response.headers().contains_key(X_RATELIMIT_LIMIT) {
        apply_headers(response.headers_mut(), &decision);
    }
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_epoch_secs()));
}

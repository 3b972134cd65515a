//! Axum middleware that enforces rate limits ahead of route handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tracing::warn;

use super::client::{client_id_from_headers, RouteClassifier};
use crate::ratelimit::{RateLimitBackend, RateLimitDecision};

/// Header carrying the remaining budget on allowed responses.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// State shared by every invocation of the middleware.
pub struct RateLimitState<R: RateLimitBackend> {
    backend: Arc<R>,
    classifier: RouteClassifier,
}

impl<R: RateLimitBackend> RateLimitState<R> {
    /// Create middleware state around a backend and a classifier.
    pub fn new(backend: Arc<R>, classifier: RouteClassifier) -> Self {
        Self { backend, classifier }
    }
}

impl<R: RateLimitBackend> Clone for RateLimitState<R> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            classifier: self.classifier.clone(),
        }
    }
}

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    /// Human-readable reason
    pub error: &'static str,
    /// Seconds until the client may retry
    pub retry_after: u64,
}

/// Build the rejection response for a denied decision.
pub fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, HeaderValue::from(retry_after))],
        Json(RateLimitedBody {
            error: "Too many requests",
            retry_after,
        }),
    )
        .into_response()
}

/// Rate limiting middleware.
///
/// Denied requests are answered with 429 before the inner handler runs.
pub async fn rate_limit<R: RateLimitBackend + 'static>(
    State(state): State<RateLimitState<R>>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = client_id_from_headers(request.headers());
    let route = state.classifier.classify(request.uri().path());
    let decision = state.backend.check(&client_id, route);

    if !decision.allowed {
        warn!(
            client_id = %client_id,
            route = %route,
            path = %request.uri().path(),
            retry_after = decision.retry_after_secs(),
            "Rejecting rate limited request"
        );
        return too_many_requests(&decision);
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    response
}

/// Wrap every route of `router` with the rate limiting middleware.
pub fn with_rate_limit<S, R>(
    router: Router<S>,
    backend: Arc<R>,
    classifier: RouteClassifier,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    R: RateLimitBackend + 'static,
{
    router.layer(middleware::from_fn_with_state(
        RateLimitState::new(backend, classifier),
        rate_limit::<R>,
    ))
}

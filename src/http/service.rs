//! Decision service routes.
//!
//! Lets another process ask for a rate limit decision over HTTP instead of
//! embedding the middleware.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::client::{RouteClassifier, UNKNOWN_CLIENT};
use crate::ratelimit::{RateLimitBackend, RateLimitDecision, RouteClass};

/// Body of `POST /v1/check`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    /// Caller identity; empty means unknown
    #[serde(default)]
    pub client_id: String,
    /// Selects the admin budget explicitly
    #[serde(default)]
    pub is_admin_route: bool,
    /// Request path, classified against the configured admin prefix
    #[serde(default)]
    pub path: Option<String>,
}

impl CheckRequest {
    /// The route class this request is checked against.
    ///
    /// Admin if the flag is set or the path falls under the admin prefix.
    pub fn route(&self, classifier: &RouteClassifier) -> RouteClass {
        let by_path = self
            .path
            .as_deref()
            .is_some_and(|path| classifier.classify(path).is_admin());
        RouteClass::from_admin_flag(self.is_admin_route || by_path)
    }
}

/// Response of `POST /v1/check`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(flatten)]
    pub decision: RateLimitDecision,
    /// Whole seconds to wait, present only on denial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<RateLimitDecision> for CheckResponse {
    fn from(decision: RateLimitDecision) -> Self {
        Self {
            decision,
            retry_after: (!decision.allowed).then(|| decision.retry_after_secs()),
        }
    }
}

/// Response of `GET /v1/stats`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Keys currently held by the limiter
    pub tracked_entries: usize,
}

struct ServiceState<R: RateLimitBackend> {
    backend: Arc<R>,
    classifier: RouteClassifier,
}

impl<R: RateLimitBackend> Clone for ServiceState<R> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            classifier: self.classifier.clone(),
        }
    }
}

/// Build the decision service router.
pub fn router<R: RateLimitBackend + 'static>(
    backend: Arc<R>,
    classifier: RouteClassifier,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/check", post(check::<R>))
        .route("/v1/stats", get(stats::<R>))
        .with_state(ServiceState {
            backend,
            classifier,
        })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[instrument(
    skip_all,
    fields(
        client_id = %payload.0.client_id,
        is_admin_route = payload.0.is_admin_route,
        path = ?payload.0.path
    )
)]
async fn check<R: RateLimitBackend>(
    State(state): State<ServiceState<R>>,
    payload: Json<CheckRequest>,
) -> Json<CheckResponse> {
    let Json(request) = payload;
    let client_id = if request.client_id.is_empty() {
        UNKNOWN_CLIENT
    } else {
        request.client_id.as_str()
    };

    let route = request.route(&state.classifier);
    let decision = state.backend.check(client_id, route);
    debug!(route = %route, allowed = decision.allowed, remaining = decision.remaining, "Decision made");

    Json(decision.into())
}

async fn stats<R: RateLimitBackend>(State(state): State<ServiceState<R>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        tracked_entries: state.backend.tracked_entries(),
    })
}

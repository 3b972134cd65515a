//! HTTP boundary: client identification, enforcement middleware and the
//! decision service.

mod client;
mod middleware;
mod server;
mod service;

pub use client::{client_id_from_headers, RouteClassifier, UNKNOWN_CLIENT};
pub use middleware::{
    rate_limit, too_many_requests, with_rate_limit, RateLimitState, RateLimitedBody,
    X_RATELIMIT_REMAINING,
};
pub use server::HttpServer;
pub use service::{router, CheckRequest, CheckResponse, StatsResponse};

//! Rate limiter trait for abstracting the decision source at the HTTP boundary.

use super::key::RouteClass;
use super::limiter::RateLimitDecision;

/// Trait for rate limiter implementations.
///
/// The HTTP layer is generic over this trait so handlers and middleware can
/// be exercised against a fixed decision in tests. Checks are synchronous:
/// a decision never waits on I/O.
pub trait RateLimitBackend: Send + Sync {
    /// Count a request and decide whether it may proceed.
    fn check(&self, client_id: &str, route: RouteClass) -> RateLimitDecision;

    /// Number of keys currently tracked.
    fn tracked_entries(&self) -> usize;
}

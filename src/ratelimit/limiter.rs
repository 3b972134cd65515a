//! Core rate limiter implementation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::backend::RateLimitBackend;
use super::entry::TrackingEntry;
use super::key::{ClientKey, RouteClass};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
/// Default maximum requests per window on public routes.
pub const DEFAULT_PUBLIC_MAX_REQUESTS: u64 = 30;
/// Default maximum requests per window on admin routes.
pub const DEFAULT_ADMIN_MAX_REQUESTS: u64 = 100;
/// Entries older than this many windows are evicted by a sweep.
pub const DEFAULT_STALE_AFTER_WINDOWS: u32 = 2;

/// Thresholds and timing for a limiter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSettings {
    /// Length of a counting window
    pub window: Duration,
    /// Maximum requests per window for public routes
    pub public_max_requests: u64,
    /// Maximum requests per window for admin routes
    pub admin_max_requests: u64,
    /// Age past which the sweep removes an entry
    pub stale_after: Duration,
}

impl LimitSettings {
    /// The threshold that applies to a route class.
    pub fn max_requests(&self, route: RouteClass) -> u64 {
        match route {
            RouteClass::Public => self.public_max_requests,
            RouteClass::Admin => self.admin_max_requests,
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            public_max_requests: DEFAULT_PUBLIC_MAX_REQUESTS,
            admin_max_requests: DEFAULT_ADMIN_MAX_REQUESTS,
            stale_after: DEFAULT_WINDOW * DEFAULT_STALE_AFTER_WINDOWS,
        }
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the window; zero once denied
    pub remaining: u64,
    /// Milliseconds until the current window rolls over
    pub reset_after_ms: u64,
}

impl RateLimitDecision {
    /// The `Retry-After` value in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_after_ms.div_ceil(1000)
    }
}

/// Whole milliseconds in `d`, rounding any remainder up so an open window
/// never reports zero time left.
fn millis_rounded_up(d: Duration) -> u64 {
    u64::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Fixed-window rate limiter keyed by client identifier and route class.
///
/// This struct is thread-safe and can be shared across multiple tasks. Each
/// check holds the registry lock for its whole lookup, reset and increment,
/// so concurrent checks on the same key never lose an update.
pub struct RateLimiter {
    /// Tracking entries indexed by client key
    entries: Mutex<HashMap<ClientKey, TrackingEntry>>,
    /// Thresholds for this instance
    settings: LimitSettings,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self::with_settings(LimitSettings::default())
    }

    /// Create a new rate limiter with the given settings.
    pub fn with_settings(settings: LimitSettings) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Get the settings this limiter was built with.
    pub fn settings(&self) -> &LimitSettings {
        &self.settings
    }

    /// Check the rate limit for a client against a route class.
    ///
    /// The request is always counted, including when it ends up denied.
    pub fn check_rate_limit(&self, client_id: &str, route: RouteClass) -> RateLimitDecision {
        self.check_rate_limit_at(client_id, route, Instant::now())
    }

    /// Check the rate limit as of `now`.
    pub fn check_rate_limit_at(
        &self,
        client_id: &str,
        route: RouteClass,
        now: Instant,
    ) -> RateLimitDecision {
        let key = ClientKey::new(client_id, route);
        let window = self.settings.window;
        let max_requests = self.settings.max_requests(route);

        trace!(key = %key, "Checking rate limit");

        let (count, reset_after) = {
            let mut entries = self.entries.lock();

            let entry = entries.entry(key.clone()).or_insert_with(|| {
                debug!(key = %key, limit = max_requests, "Creating new tracking entry");
                TrackingEntry::new(now)
            });

            if entry.is_expired(now, window) {
                debug!(key = %key, previous_count = entry.count(), "Window expired, resetting");
                entry.reset(now);
            }

            let count = entry.increment();
            (count, entry.duration_until_reset(now, window))
        };

        let allowed = count <= max_requests;
        if !allowed {
            debug!(key = %key, count = count, limit = max_requests, "Rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            remaining: if allowed { max_requests - count } else { 0 },
            reset_after_ms: millis_rounded_up(reset_after),
        }
    }

    /// Remove entries that have gone stale.
    ///
    /// Returns the number of entries evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Remove entries that are stale as of `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let max_age = self.settings.stale_after;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(now, max_age));
        before - entries.len()
    }

    /// Get the stored count for a client and route class.
    ///
    /// Returns `None` if no entry exists. The value may exceed the limit by
    /// the number of denied requests in the current window.
    pub fn current_count(&self, client_id: &str, route: RouteClass) -> Option<u64> {
        let key = ClientKey::new(client_id, route);
        let entries = self.entries.lock();
        entries.get(&key).map(|e| e.count())
    }

    /// Clear all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Get the number of tracked entries.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitBackend for RateLimiter {
    fn check(&self, client_id: &str, route: RouteClass) -> RateLimitDecision {
        self.check_rate_limit(client_id, route)
    }

    fn tracked_entries(&self) -> usize {
        self.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: &str = "1.2.3.4";

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.entry_count(), 0);
        assert_eq!(limiter.settings(), &LimitSettings::default());
    }

    #[test]
    fn test_check_creates_entry() {
        let limiter = RateLimiter::new();

        let decision = limiter.check_rate_limit(CLIENT, RouteClass::Public);

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 29);
        assert_eq!(limiter.entry_count(), 1);
        assert_eq!(limiter.current_count(CLIENT, RouteClass::Public), Some(1));
    }

    #[test]
    fn test_public_burst_scenario() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for i in 0..30u64 {
            let now = start + Duration::from_millis(i * 30);
            let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now);
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 29 - i);
        }

        let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start + secs(1));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_after_ms, 59_000);
        assert_eq!(decision.retry_after_secs(), 59);
    }

    #[test]
    fn test_admin_threshold() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..100 {
            assert!(limiter.check_rate_limit_at(CLIENT, RouteClass::Admin, now).allowed);
        }

        let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Admin, now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_denial_is_sticky_within_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..31 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start);
        }

        for offset in [1, 10, 30, 59, 60] {
            let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start + secs(offset));
            assert!(!decision.allowed, "still denied at +{}s", offset);
        }
    }

    #[test]
    fn test_overshoot_is_counted() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..35 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now);
        }

        assert_eq!(limiter.current_count(CLIENT, RouteClass::Public), Some(35));
    }

    #[test]
    fn test_route_classes_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..31 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now);
        }

        let admin = limiter.check_rate_limit_at(CLIENT, RouteClass::Admin, now);
        assert!(admin.allowed);
        assert_eq!(admin.remaining, 99);

        let other = limiter.check_rate_limit_at("5.6.7.8", RouteClass::Public, now);
        assert!(other.allowed);
        assert_eq!(other.remaining, 29);

        assert_eq!(limiter.current_count(CLIENT, RouteClass::Public), Some(31));
        assert_eq!(limiter.current_count(CLIENT, RouteClass::Admin), Some(1));
        assert_eq!(limiter.entry_count(), 3);
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..50 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start);
        }

        // Exactly one window later the window is still open
        let edge = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start + secs(60));
        assert!(!edge.allowed);
        assert_eq!(edge.reset_after_ms, 0);

        let rolled = start + secs(60) + Duration::from_millis(1);
        let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, rolled);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 29);
        assert_eq!(decision.reset_after_ms, 60_000);
        assert_eq!(limiter.current_count(CLIENT, RouteClass::Public), Some(1));
    }

    #[test]
    fn test_reset_after_decreases_within_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        let mut previous = u64::MAX;
        for offset_ms in [0u64, 1, 500, 15_000, 45_000, 59_999] {
            let now = start + Duration::from_millis(offset_ms);
            let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Admin, now);
            assert!(decision.reset_after_ms > 0);
            assert!(decision.reset_after_ms < previous);
            assert_eq!(decision.reset_after_ms, 60_000 - offset_ms);
            previous = decision.reset_after_ms;
        }
    }

    #[test]
    fn test_sub_millisecond_remainder_rounds_up() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..30 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start);
        }

        let now = start + Duration::from_micros(59_999_500);
        let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now);
        assert!(!decision.allowed);
        assert_eq!(decision.reset_after_ms, 1);
        assert_eq!(decision.retry_after_secs(), 1);
    }

    #[test]
    fn test_unknown_clients_share_a_bucket() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for _ in 0..15 {
            limiter.check_rate_limit_at("unknown", RouteClass::Public, now);
        }
        for _ in 0..15 {
            limiter.check_rate_limit_at("unknown", RouteClass::Public, now);
        }

        let decision = limiter.check_rate_limit_at("unknown", RouteClass::Public, now);
        assert!(!decision.allowed);
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_empty_client_id_is_accepted() {
        let limiter = RateLimiter::new();

        let decision = limiter.check_rate_limit("", RouteClass::Public);

        assert!(decision.allowed);
        assert_eq!(limiter.current_count("", RouteClass::Public), Some(1));
    }

    #[test]
    fn test_clock_regression_does_not_reset() {
        let limiter = RateLimiter::new();
        let start = Instant::now() + secs(30);

        for _ in 0..30 {
            limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start);
        }

        let decision = limiter.check_rate_limit_at(CLIENT, RouteClass::Public, start - secs(10));
        assert!(!decision.allowed);
        assert_eq!(decision.reset_after_ms, 60_000);
    }

    #[test]
    fn test_custom_settings() {
        let limiter = RateLimiter::with_settings(LimitSettings {
            window: secs(1),
            public_max_requests: 2,
            admin_max_requests: 3,
            stale_after: secs(2),
        });
        let now = Instant::now();

        assert!(limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now).allowed);
        assert!(limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now).allowed);
        assert!(!limiter.check_rate_limit_at(CLIENT, RouteClass::Public, now).allowed);

        let later = now + Duration::from_millis(1_001);
        assert!(limiter.check_rate_limit_at(CLIENT, RouteClass::Public, later).allowed);
    }

    #[test]
    fn test_sweep_evicts_stale_entries() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.check_rate_limit_at("idle", RouteClass::Public, start);
        limiter.check_rate_limit_at("active", RouteClass::Public, start);
        limiter.check_rate_limit_at("active", RouteClass::Public, start + secs(70));

        let removed = limiter.sweep_at(start + secs(121));

        assert_eq!(removed, 1);
        assert_eq!(limiter.current_count("idle", RouteClass::Public), None);
        assert_eq!(limiter.current_count("active", RouteClass::Public), Some(1));
    }

    #[test]
    fn test_sweep_retains_entries_at_threshold() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.check_rate_limit_at(CLIENT, RouteClass::Admin, start);

        assert_eq!(limiter.sweep_at(start + secs(120)), 0);
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_clear_entries() {
        let limiter = RateLimiter::new();

        limiter.check_rate_limit(CLIENT, RouteClass::Public);
        assert_eq!(limiter.entry_count(), 1);

        limiter.clear();
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let decision = RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_after_ms: 58_001,
        };
        assert_eq!(decision.retry_after_secs(), 59);

        let decision = RateLimitDecision {
            reset_after_ms: 0,
            ..decision
        };
        assert_eq!(decision.retry_after_secs(), 0);
    }

    #[test]
    fn test_concurrent_checks_do_not_lose_updates() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        limiter.check_rate_limit(CLIENT, RouteClass::Admin);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(limiter.current_count(CLIENT, RouteClass::Admin), Some(200));
    }
}

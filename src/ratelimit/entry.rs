//! Per-key tracking entry for the fixed-window counter.

use std::time::{Duration, Instant};

/// One client's request activity within the current window.
#[derive(Debug, Clone)]
pub struct TrackingEntry {
    /// Requests observed since the window started. May exceed the limit.
    count: u64,
    /// When the current window started
    window_start: Instant,
}

impl TrackingEntry {
    /// Create an empty entry whose window starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Time elapsed since the window started.
    ///
    /// If `now` precedes the window start the clock has regressed; that is
    /// reported as zero elapsed time so the window stays open.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }

    /// Whether the window has expired at `now`.
    ///
    /// Expiry is strict: an entry exactly one window old is still open.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        self.elapsed(now) > window
    }

    /// Start a fresh window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.window_start = now;
    }

    /// Record one request and return the new count.
    pub fn increment(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(self.elapsed(now))
    }

    /// Whether the entry has gone untouched longer than `max_age`.
    pub fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        self.elapsed(now) > max_age
    }
}

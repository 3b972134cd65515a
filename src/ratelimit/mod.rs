//! Rate limiting logic and state management.

mod backend;
mod entry;
mod key;
mod limiter;
mod sweeper;

pub use backend::RateLimitBackend;
pub use entry::TrackingEntry;
pub use key::{ClientKey, RouteClass};
pub use limiter::{
    LimitSettings, RateLimitDecision, RateLimiter, DEFAULT_ADMIN_MAX_REQUESTS,
    DEFAULT_PUBLIC_MAX_REQUESTS, DEFAULT_STALE_AFTER_WINDOWS, DEFAULT_WINDOW,
};
pub use sweeper::Sweeper;

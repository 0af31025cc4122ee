//! Fixed-window rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → key.rs (client address or resolved identity)
//!     → limiter.rs (store.hit under "{limiter}:{key}" → Decision)
//!     → middleware.rs (X-RateLimit-* headers, 429 past the quota)
//!
//! Background:
//!     reclaimer.rs (periodic sweep of expired entries)
//! ```
//!
//! # Design Decisions
//! - One store shared by every named limiter; keys are namespaced
//! - Time comes from an injected clock
//! - Store failures fail open

pub mod clock;
pub mod key;
pub mod limiter;
pub mod middleware;
pub mod reclaimer;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{ClientIpKey, IdentityKey, KeyExtractor};
pub use limiter::{Decision, FixedWindowLimiter, LimiterStats, RateLimiters};
pub use middleware::rate_limit;
pub use reclaimer::Reclaimer;
pub use store::{InMemoryRateLimitStore, RateLimitEntry, RateLimitStore, StoreError};

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, 429 on exhaustion)
//!     → proxy handler
//!
//! Rewritten HTML response:
//!     → headers.rs (CSP, frame, referrer, permissions)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an exhausted bucket rejects before any upstream call
//! - Health checks bypass the limiter

pub mod headers;
pub mod rate_limit;

pub use headers::{compose_csp, SecurityPolicy};
pub use rate_limit::{rate_limit_middleware, RateLimiter};

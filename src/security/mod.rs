//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight, Access-Control-* headers)
//!     → rate_limit.rs (global per-client quota)
//!     → rate_limit.rs (write quota, POST /books only)
//!     → Pass to handlers
//! Outgoing response:
//!     → headers.rs (hardening headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Limiters are additive: the write quota never replaces the global one
//! - No trust in client input

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::cors_layer;
pub use headers::with_security_headers;
pub use rate_limit::{CounterStore, MemoryCounterStore, RateDecision, RateLimiter};

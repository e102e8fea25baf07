//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → axum routes `/vidproxy/*` and `/p/*` to the proxy handler
//!     → identifier.rs (extract + validate second path segment)
//!     → Return: Identifier or 400 with usage string
//! ```
//!
//! # Design Decisions
//! - Routes are fixed at compile time; there is no dynamic route table
//! - Validation happens before any outbound I/O
//! - Deterministic: same path always yields the same result

pub mod identifier;

pub use identifier::{Identifier, USAGE};

//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Identifier + RequestDescriptor
//!     → fetcher.rs (GET <origin>/embed/<id>, bounded body)
//!     → content.rs (text/html → rewrite pipeline, else passthrough)
//!     → ResponseEnvelope
//! ```

pub mod content;
pub mod fetcher;

pub use content::{dispatch, is_html};
pub use fetcher::{Fetcher, UpstreamResponse};

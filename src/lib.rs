//! Sanitizing reverse proxy for third-party video embed pages.
//!
//! Fetches `<upstream>/embed/<id>`, strips ad and hijack vectors from the
//! HTML with a fixed pipeline of tree rewrites, and returns the result under
//! a restrictive content security policy.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, StartupError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rewrite::RewritePipeline;
pub use routing::Identifier;

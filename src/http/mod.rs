//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → request.rs (request ID, forwarded headers)
//!     → [identifier check, upstream fetch, rewrite]
//!     → response.rs (status, content type, security headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, RequestDescriptor, X_REQUEST_ID};
pub use response::{BodyKind, ResponseEnvelope};
pub use server::{AppState, HttpServer, PROXY_PREFIXES};

//! Network layer subsystem.
//!
//! Plain TCP listeners are bound by the binary and handed to
//! `HttpServer::run`; TLS listeners are bound by `axum-server` from the
//! material loaded here.

pub mod tls;

pub use tls::load_tls_config;

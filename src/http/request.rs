//! Inbound request inspection.
//!
//! # Responsibilities
//! - Generate the request ID (UUID v4) for `SetRequestIdLayer`
//! - Capture the headers forwarded upstream, with their fallbacks
//!
//! # Design Decisions
//! - Request ID added as the outermost layer so the trace span sees it
//! - Forwarded header values are kept as raw `HeaderValue`s; a non-UTF-8
//!   user agent is forwarded byte-for-byte

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use axum::http::{Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns a fresh UUID v4 to every request without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID as a string, `unknown` when absent or not UTF-8.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// What the proxy needs from an inbound request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    /// Inbound `User-Agent`, empty when absent.
    pub user_agent: HeaderValue,
    /// Inbound `Accept-Language`, or the configured default.
    pub accept_language: HeaderValue,
}

impl RequestDescriptor {
    pub fn from_parts(uri: &Uri, headers: &HeaderMap, default_accept_language: &HeaderValue) -> Self {
        Self {
            path: uri.path().to_owned(),
            user_agent: headers
                .get(USER_AGENT)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("")),
            accept_language: headers
                .get(ACCEPT_LANGUAGE)
                .cloned()
                .unwrap_or_else(|| default_accept_language.clone()),
        }
    }
}

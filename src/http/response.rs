//! Outbound response assembly.
//!
//! # Responsibilities
//! - Build the client response for rewritten and passthrough bodies
//! - Preserve the upstream status on both paths
//!
//! # Design Decisions
//! - Only `content-type` is carried over from the upstream; no other
//!   upstream header reaches the client
//! - Security headers go on rewritten HTML only

use axum::body::Bytes;
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::security::SecurityPolicy;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Passthrough,
}

impl BodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Html => "html",
            BodyKind::Passthrough => "passthrough",
        }
    }
}

/// A finished response, ready to hand to axum.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: BodyKind,
}

impl ResponseEnvelope {
    /// Rewritten document with the security headers attached.
    pub fn html(status: StatusCode, body: String, policy: &SecurityPolicy) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        policy.apply(&mut headers);
        Self {
            status,
            headers,
            body: Bytes::from(body),
            kind: BodyKind::Html,
        }
    }

    /// Upstream body relayed untouched.
    pub fn passthrough(status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            content_type.unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );
        Self {
            status,
            headers,
            body,
            kind: BodyKind::Passthrough,
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

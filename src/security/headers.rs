//! Security headers for rewritten documents.
//!
//! # Responsibilities
//! - Compose the content security policy for the configured upstream
//! - Attach CSP, frame, referrer and permissions headers to HTML responses
//!
//! # Design Decisions
//! - Composed once at startup; every response carries the same bytes
//! - Passthrough responses never receive these headers, so the policy is
//!   applied per response instead of as a router layer
//! - `base-uri` admits the upstream origin, otherwise the injected base
//!   element would be ignored by the browser

use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, CONTENT_SECURITY_POLICY,
    REFERRER_POLICY, X_FRAME_OPTIONS,
};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Directives that do not depend on configuration, in emission order.
const LEADING_DIRECTIVES: &[&str] = &[
    "default-src 'self' https: data: blob:",
    "script-src 'unsafe-inline' 'unsafe-eval' https: blob: data:",
    "style-src 'unsafe-inline' https:",
    "img-src https: data: blob:",
    "media-src https: blob: data:",
    "connect-src https: wss: blob:",
    "child-src https: blob: data:",
    "frame-ancestors 'self'",
    "object-src 'none'",
];

const NAVIGATE_TO: &str = "navigate-to 'self'";

/// Header set attached to every rewritten HTML response.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    csp: HeaderValue,
}

impl SecurityPolicy {
    pub fn for_upstream(upstream_origin: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            csp: HeaderValue::from_str(&compose_csp(upstream_origin))?,
        })
    }

    pub fn content_security_policy(&self) -> &HeaderValue {
        &self.csp
    }

    /// Insert the policy headers, replacing any existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_SECURITY_POLICY, self.csp.clone());
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(REFERRER_POLICY, HeaderValue::from_static("origin"));
        headers.insert(
            PERMISSIONS_POLICY,
            HeaderValue::from_static("interest-cohort=(), autoplay=*, fullscreen=*"),
        );
    }
}

/// Build the CSP string, directives joined by `; `.
pub fn compose_csp(upstream_origin: &str) -> String {
    let base_uri = format!("base-uri 'self' {}", upstream_origin.trim_end_matches('/'));
    LEADING_DIRECTIVES
        .iter()
        .copied()
        .chain([base_uri.as_str(), NAVIGATE_TO])
        .collect::<Vec<_>>()
        .join("; ")
}

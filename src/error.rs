//! Error types for the request pipeline and server startup.

use axum::http::header::{InvalidHeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routing::identifier::USAGE;

/// Failures that terminate a proxied request.
///
/// Every variant maps to a non-2xx status; none of them is ever reported to
/// the client as a successful empty document.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The path did not carry an identifier of the form `tt` + 7-9 digits.
    #[error("missing or malformed identifier")]
    InvalidIdentifier,

    /// DNS, connect, TLS or protocol failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream body exceeds {limit} bytes")]
    UpstreamTooLarge { limit: usize },

    #[error("rate limit exceeded")]
    RateLimited,
}

impl ProxyError {
    /// Status code reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidIdentifier => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) | ProxyError::UpstreamTooLarge { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidIdentifier => "invalid_identifier",
            ProxyError::Upstream(_) => "upstream_transport",
            ProxyError::UpstreamTimeout => "upstream_timeout",
            ProxyError::UpstreamTooLarge { .. } => "upstream_too_large",
            ProxyError::RateLimited => "rate_limited",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            ProxyError::InvalidIdentifier => USAGE,
            ProxyError::Upstream(_) | ProxyError::UpstreamTooLarge { .. } => "Upstream request failed",
            ProxyError::UpstreamTimeout => "Upstream request timed out",
            ProxyError::RateLimited => "Rate limit exceeded",
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout
        } else {
            ProxyError::Upstream(err)
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}

/// Failures while assembling the server from its configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("configured value is not a valid header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

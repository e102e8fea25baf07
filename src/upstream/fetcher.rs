//! Outbound fetch of the embed page.
//!
//! # Responsibilities
//! - Build `<origin>/embed/<id>` from a validated identifier
//! - Send the fixed referer plus the forwarded client headers
//! - Read the body under a size limit
//!
//! # Design Decisions
//! - One attempt per inbound request; failures surface as 502/504
//! - Redirects are followed by reqwest, bounded by configuration
//! - The fetch future is owned by the handler, so a client disconnect
//!   drops it and aborts the outbound call

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{HeaderValue, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use axum::http::StatusCode;
use reqwest::redirect::Policy;

use crate::config::{SecurityConfig, TimeoutConfig, UpstreamConfig};
use crate::error::{ProxyError, StartupError};
use crate::http::request::RequestDescriptor;
use crate::routing::Identifier;

/// What came back from the upstream, before any interpretation.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// HTTP client bound to the configured upstream origin.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    origin: String,
    referer: HeaderValue,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(
        upstream: &UpstreamConfig,
        timeouts: &TimeoutConfig,
        security: &SecurityConfig,
    ) -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(upstream.max_redirects))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs))
            .build()?;

        let origin = upstream.origin().to_owned();
        let referer = HeaderValue::from_str(&format!("{origin}/"))?;

        Ok(Self {
            client,
            origin,
            referer,
            max_body_bytes: security.max_upstream_body_bytes,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn embed_url(&self, id: &Identifier) -> String {
        format!("{}/embed/{}", self.origin, id)
    }

    /// Fetch the embed page for `id`. Non-2xx statuses are returned, not
    /// treated as errors.
    pub async fn fetch(
        &self,
        id: &Identifier,
        request: &RequestDescriptor,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = self.embed_url(id);
        tracing::debug!(url = %url, "Fetching upstream");

        let mut response = self
            .client
            .get(&url)
            .header(REFERER, self.referer.clone())
            .header(USER_AGENT, request.user_agent.clone())
            .header(ACCEPT_LANGUAGE, request.accept_language.clone())
            .send()
            .await?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_bytes) {
            return Err(ProxyError::UpstreamTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(ProxyError::UpstreamTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(status = %status, bytes = body.len(), "Upstream responded");
        Ok(UpstreamResponse {
            status,
            content_type,
            body: Bytes::from(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(origin: &str) -> Fetcher {
        let upstream = UpstreamConfig {
            origin: origin.to_string(),
            ..UpstreamConfig::default()
        };
        Fetcher::new(&upstream, &TimeoutConfig::default(), &SecurityConfig::default()).unwrap()
    }

    #[test]
    fn embed_url_interpolates_identifier() {
        let id = Identifier::parse("tt0118884").unwrap();
        assert_eq!(fetcher("https://vidsrc.net").embed_url(&id), "https://vidsrc.net/embed/tt0118884");
        assert_eq!(fetcher("https://vidsrc.net/").embed_url(&id), "https://vidsrc.net/embed/tt0118884");
    }

    #[test]
    fn referer_is_origin_root() {
        let fetcher = fetcher("http://127.0.0.1:9000");
        assert_eq!(fetcher.origin(), "http://127.0.0.1:9000");
        assert_eq!(fetcher.referer, "http://127.0.0.1:9000/");
    }
}

//! Content-type dispatch between rewrite and passthrough.

use axum::http::header::HeaderValue;

use crate::http::response::ResponseEnvelope;
use crate::rewrite::RewritePipeline;
use crate::security::SecurityPolicy;
use crate::upstream::UpstreamResponse;

/// True when the upstream declared an HTML body.
pub fn is_html(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .map(|v| String::from_utf8_lossy(v.as_bytes()).to_ascii_lowercase())
        .is_some_and(|v| v.contains("text/html"))
}

/// Rewrite HTML, relay everything else unchanged.
pub fn dispatch(
    upstream: UpstreamResponse,
    pipeline: &RewritePipeline,
    policy: &SecurityPolicy,
) -> ResponseEnvelope {
    if !is_html(upstream.content_type.as_ref()) {
        return ResponseEnvelope::passthrough(upstream.status, upstream.content_type, upstream.body);
    }

    let source = String::from_utf8_lossy(&upstream.body);
    ResponseEnvelope::html(upstream.status, pipeline.rewrite(&source), policy)
}

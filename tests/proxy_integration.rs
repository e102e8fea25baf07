//! End-to-end tests: real proxy, mock upstream, real HTTP.

use std::time::Duration;

use axum::http::StatusCode;
use vidproxy::config::ProxyConfig;

mod common;
use common::{
    client, config_for, header_value, request_line, start_mock_upstream, start_proxy,
    start_routed_upstream, MockReply,
};

const EMBED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Embed</title>
<script src="https://cloudnestra.com/loader.js"></script>
<script>document.write('<scr'+'ipt src="/f59d.js"></scr'+'ipt>');</script>
</head>
<body>
<div id="AdWidgetContainer"><a href="https://ads.example/" target="_blank">ad</a></div>
<a href="/movie" target="_blank">one</a>
<a href="/tv" target="_blank">two</a>
<a href="/top" target="_blank">three</a>
<iframe id="player_iframe" src="//cloudnestra.com/rcp/abc" allowfullscreen></iframe>
<iframe id="chat" src="/chat"></iframe>
</body>
</html>"#;

#[tokio::test]
async fn invalid_identifiers_never_reach_upstream() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let proxy = start_proxy(config_for(&upstream)).await;
    let client = client();

    for path in [
        "/vidproxy",
        "/vidproxy/",
        "/vidproxy/abc",
        "/vidproxy/tt123",
        "/vidproxy/tt123456789012",
        "/p/xx0118884",
    ] {
        let response = client.get(proxy.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.text().await.unwrap(), "Usage: /vidproxy/tt0118884");
    }

    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn valid_identifier_fetches_embed_path_with_forwarded_headers() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client()
        .get(proxy.url("/vidproxy/tt0118884"))
        .header("user-agent", "TestAgent/1.0")
        .header("accept-language", "fr-FR")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let head = upstream.last_request().unwrap();
    assert_eq!(request_line(&head), "GET /embed/tt0118884 HTTP/1.1");
    assert_eq!(header_value(&head, "referer"), Some(format!("{}/", upstream.origin()).as_str()));
    assert_eq!(header_value(&head, "user-agent"), Some("TestAgent/1.0"));
    assert_eq!(header_value(&head, "accept-language"), Some("fr-FR"));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn missing_client_headers_use_fallbacks() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/p/TT12345678")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let head = upstream.last_request().unwrap();
    assert_eq!(request_line(&head), "GET /embed/TT12345678 HTTP/1.1");
    assert_eq!(header_value(&head, "user-agent"), Some(""));
    assert_eq!(header_value(&head, "accept-language"), Some("en-US,en;q=0.9"));
}

#[tokio::test]
async fn html_is_sanitized_and_hardened() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers["content-type"], "text/html; charset=utf-8");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "origin");
    assert_eq!(
        headers["permissions-policy"],
        "interest-cohort=(), autoplay=*, fullscreen=*"
    );
    let csp = headers["content-security-policy"].to_str().unwrap();
    assert!(csp.starts_with("default-src 'self' https: data: blob:; "));
    assert!(csp.contains(&format!("base-uri 'self' {}", upstream.origin())));
    assert!(headers.contains_key("x-request-id"));

    let body = response.text().await.unwrap();
    let base = format!(r#"<head><base href="{}/">"#, upstream.origin());
    assert!(body.contains(&base), "{body}");
    assert_eq!(body.matches("<base").count(), 1);
    assert!(!body.contains("cloudnestra.com/loader.js"));
    assert!(!body.contains("document.write"));
    assert!(!body.contains("AdWidgetContainer"));
    assert_eq!(body.matches("_blank").count(), 0);
    assert!(body.contains(r#"referrerpolicy="origin""#));
    assert!(body.contains(r#"sandbox="allow-scripts allow-same-origin allow-forms allow-presentation""#));
    assert!(body.contains(r#"<iframe id="chat" src="/chat"></iframe>"#));
    assert_eq!(body.matches("data-vidproxy-guard").count(), 1);
}

#[tokio::test]
async fn non_html_passes_through_unchanged() {
    let png: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR<head>";
    let upstream = start_mock_upstream(
        MockReply::html("")
            .with_content_type("image/png")
            .with_body(png),
    )
    .await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert!(response.headers().get("content-security-policy").is_none());
    assert_eq!(&response.bytes().await.unwrap()[..], png);
}

#[tokio::test]
async fn upstream_status_is_preserved() {
    let upstream = start_mock_upstream(MockReply::html("<p>Not found</p>").with_status(404)).await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.text().await.unwrap();
    assert!(body.contains("<p>Not found</p>"));
    assert!(body.contains("<base href="));
}

#[tokio::test]
async fn non_html_error_passes_through_unchanged() {
    let json = br#"{"error":"busy"}"#;
    let upstream = start_mock_upstream(
        MockReply::html("")
            .with_status(503)
            .with_content_type("application/json")
            .with_body(json),
    )
    .await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert!(response.headers().get("content-security-policy").is_none());
    assert_eq!(&response.bytes().await.unwrap()[..], json);
}

#[tokio::test]
async fn redirects_are_followed_to_the_final_page() {
    let upstream = start_routed_upstream(|path| match path {
        "/embed/tt0118884" => MockReply::redirect("/landing"),
        _ => MockReply::html(EMBED_PAGE),
    })
    .await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-security-policy").is_some());

    let body = response.text().await.unwrap();
    assert!(body.contains("<base href="), "{body}");
    assert!(!body.contains("cloudnestra.com/loader.js"));
    assert_eq!(body.matches("data-vidproxy-guard").count(), 1);

    assert_eq!(upstream.hits(), 2);
    let head = upstream.last_request().unwrap();
    assert_eq!(request_line(&head), "GET /landing HTTP/1.1");
}

#[tokio::test]
async fn redirect_chain_beyond_limit_is_bad_gateway() {
    let upstream = start_routed_upstream(|path| {
        let hop = path
            .rsplit('/')
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(0);
        MockReply::redirect(format!("/hop/{}", hop + 1))
    })
    .await;
    let mut config = config_for(&upstream);
    config.upstream.max_redirects = 2;
    let proxy = start_proxy(config).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text().await.unwrap(), "Upstream request failed");
    assert_eq!(upstream.hits(), 3);
}

#[tokio::test]
async fn csp_is_identical_across_requests() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let proxy = start_proxy(config_for(&upstream)).await;
    let client = client();

    let first = client.get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    let second = client.get(proxy.url("/p/tt7654321")).send().await.unwrap();
    assert_eq!(
        first.headers()["content-security-policy"],
        second.headers()["content-security-policy"]
    );
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let mut config = ProxyConfig::default();
    config.upstream.origin = "http://127.0.0.1:1".to_string();
    config.rate_limit.enabled = false;
    let proxy = start_proxy(config).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text().await.unwrap(), "Upstream request failed");
}

#[tokio::test]
async fn slow_upstream_is_gateway_timeout() {
    let upstream = start_mock_upstream(
        MockReply::html(EMBED_PAGE).with_delay(Duration::from_secs(3)),
    )
    .await;
    let mut config = config_for(&upstream);
    config.timeouts.upstream_secs = 1;
    let proxy = start_proxy(config).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn oversized_upstream_body_is_rejected() {
    let big = "x".repeat(4096);
    let upstream = start_mock_upstream(MockReply::html(&big)).await;
    let mut config = config_for(&upstream);
    config.security.max_upstream_body_bytes = 1024;
    let proxy = start_proxy(config).await;

    let response = client().get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn rate_limit_rejects_excess_but_not_health() {
    let upstream = start_mock_upstream(MockReply::html(EMBED_PAGE)).await;
    let mut config = config_for(&upstream);
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst_size = 2;
    let proxy = start_proxy(config).await;
    let client = client();

    for _ in 0..2 {
        let response = client.get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let limited = client.get(proxy.url("/vidproxy/tt0118884")).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.text().await.unwrap(), "Rate limit exceeded");
    assert_eq!(upstream.hits(), 2);

    let health = client.get(proxy.url("/healthz")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_version() {
    let upstream = start_mock_upstream(MockReply::html("")).await;
    let proxy = start_proxy(config_for(&upstream)).await;

    let response = client().get(proxy.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(upstream.hits(), 0);
}

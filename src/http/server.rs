//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router: proxy routes, health check
//! - Wire up middleware (request ID, tracing, concurrency cap, timeout,
//!   rate limit)
//! - Serve plain TCP or TLS until shutdown is signalled
//!
//! # Data Flow
//! ```text
//! request ─▶ SetRequestId ─▶ Trace ─▶ PropagateRequestId ─▶ ConcurrencyLimit
//!         ─▶ Timeout ─▶ [rate limit] ─▶ proxy_handler
//!
//! proxy_handler:
//!     RequestDescriptor → Identifier → Fetcher::fetch → content::dispatch
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, StartupError};
use crate::http::request::{request_id, MakeRequestUuidV4, RequestDescriptor};
use crate::http::response::ResponseEnvelope;
use crate::observability::metrics;
use crate::rewrite::RewritePipeline;
use crate::routing::Identifier;
use crate::security::{rate_limit_middleware, RateLimiter, SecurityPolicy};
use crate::upstream::{self, Fetcher};

/// Path prefixes served by the proxy handler.
pub const PROXY_PREFIXES: &[&str] = &["/vidproxy", "/p"];

/// Grace period for in-flight TLS connections after shutdown is signalled.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    pub pipeline: Arc<RewritePipeline>,
    pub policy: Arc<SecurityPolicy>,
    pub default_accept_language: HeaderValue,
}

/// HTTP server for the sanitizing proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Assemble the server. Expects an already validated configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let origin = config.upstream.origin();
        let state = AppState {
            fetcher: Fetcher::new(&config.upstream, &config.timeouts, &config.security)?,
            pipeline: Arc::new(RewritePipeline::standard(origin)),
            policy: Arc::new(SecurityPolicy::for_upstream(origin)?),
            default_accept_language: HeaderValue::from_str(
                &config.upstream.default_accept_language,
            )?,
        };

        tracing::debug!(
            origin = %origin,
            rules = ?state.pipeline.rule_names(),
            "Rewrite pipeline ready"
        );

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut proxy = Router::new();
        for prefix in PROXY_PREFIXES {
            proxy = proxy
                .route(prefix, get(proxy_handler))
                .route(&format!("{prefix}/"), get(proxy_handler))
                .route(&format!("{prefix}/{{*rest}}"), get(proxy_handler));
        }
        let mut proxy = proxy.with_state(state);

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
            proxy = proxy.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        proxy
            .route("/healthz", get(health_handler))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on the configured bind address.
    pub async fn run_tls(
        self,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            signal_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Validate, fetch, and rewrite or relay.
async fn proxy_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let request = RequestDescriptor::from_parts(&uri, &headers, &state.default_accept_language);

    match proxy(&state, &request).await {
        Ok(envelope) => {
            metrics::record_request(envelope.kind.as_str(), envelope.status.as_u16(), start);
            tracing::info!(
                status = %envelope.status,
                kind = envelope.kind.as_str(),
                bytes = envelope.body.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request served"
            );
            envelope.into_response()
        }
        Err(err) => {
            metrics::record_request(err.kind(), err.status().as_u16(), start);
            if matches!(err, ProxyError::InvalidIdentifier) {
                tracing::debug!(path = %request.path, "Rejected identifier");
            } else {
                metrics::record_upstream_error(err.kind());
                tracing::warn!(error = %err, status = %err.status(), "Upstream fetch failed");
            }
            err.into_response()
        }
    }
}

async fn proxy(state: &AppState, request: &RequestDescriptor) -> Result<ResponseEnvelope, ProxyError> {
    let id = Identifier::from_path(&request.path)?;
    let fetched = state.fetcher.fetch(&id, request).await?;
    Ok(upstream::dispatch(fetched, &state.pipeline, &state.policy))
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! handlers, middleware, rewrite rules
//!     → logging.rs (tracing events, pretty or JSON on stdout)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → log aggregation (stdout)
//!     → Prometheus scrape on observability.metrics_address
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to the per-request span, so every event inside
//!   the handler carries it
//! - Metric calls are no-ops until the exporter is installed, which keeps
//!   tests free of global state

pub mod logging;
pub mod metrics;

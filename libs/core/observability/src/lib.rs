//! Prometheus metrics for the engagement services.
//!
//! - recorder installation and the `/metrics` handler
//! - [`middleware::metrics_middleware`] for per-route HTTP metrics
//! - [`QueryMetrics`] for feed and rollup queries
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, QueryMetrics};
//!
//! init_metrics()?;
//!
//! let timer = QueryMetrics::start("feed");
//! // ... run the query ...
//! timer.success(page.count);
//!
//! let app = Router::new().route("/metrics", get(metrics_handler));
//! ```

pub mod engagement;
pub mod middleware;

pub use engagement::{QueryMetrics, QueryTimer};

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the global Prometheus recorder on first call.
///
/// Later calls return the same handle. Fails only if another recorder was
/// installed outside this crate.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok(handle)
    })
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for `/metrics`.
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    describe_counter!(
        "engagement_queries_total",
        "Engagement queries by query kind and outcome"
    );
    describe_histogram!(
        "engagement_query_duration_seconds",
        "Engagement query duration in seconds, including store round trips"
    );
    describe_histogram!(
        "engagement_query_rows",
        "Rows returned or scanned by an engagement query"
    );
}

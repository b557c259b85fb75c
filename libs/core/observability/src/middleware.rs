//! Per-route HTTP metrics.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response, StatusCode},
    middleware::Next,
};
use metrics::{counter, histogram};
use std::time::Instant;

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Records `http_requests_total`, `http_request_duration_seconds` and, for
/// 4xx/5xx responses, `http_requests_errors_total`.
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use observability::middleware::metrics_middleware;
///
/// // `route_layer` so MatchedPath is available and the `path` label stays a
/// // template like `/domains/{domain}/feed` instead of the raw URI.
/// let app = Router::new()
///     .route("/domains/{domain}/feed", get(feed))
///     .route_layer(middleware::from_fn(metrics_middleware));
/// ```
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = match matched_path {
        Some(template) => template.as_str().to_owned(),
        None => request.uri().path().to_owned(),
    };

    let response = next.run(request).await;
    let status = response.status();
    let code = status.as_u16().to_string();

    histogram!("http_request_duration_seconds", "method" => method.clone(), "path" => path.clone())
        .record(started.elapsed().as_secs_f64());
    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => code.clone(),
        "status_class" => status_class(status)
    )
    .increment(1);

    if status.is_client_error() || status.is_server_error() {
        counter!("http_requests_errors_total", "method" => method, "path" => path, "status" => code)
            .increment(1);
    }

    response
}

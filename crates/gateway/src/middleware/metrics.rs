//! Per-request Prometheus metrics

use axum::{extract::Request, middleware::Next, response::Response};
use opensynthesis_common::metrics::RequestMetrics;

/// Record method, path, status and latency of every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let tracker = RequestMetrics::start(request.method().as_str(), request.uri().path());
    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}

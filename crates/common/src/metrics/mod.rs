//! Metrics and observability utilities
//!
//! Provides Prometheus metric descriptions and recording helpers for the
//! retrieval and generation paths.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Open Synthesis metrics
pub const METRICS_PREFIX: &str = "opensynthesis";

/// Buckets for generation latency (long-running model calls)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.5,    // 500ms
    1.0,    // 1s
    2.5,    // 2.5s
    5.0,    // 5s
    10.0,   // 10s
    30.0,   // 30s
    60.0,   // 1m
    120.0,  // 2m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of hybrid retrievals"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Hybrid retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned from the last retrieval"
    );

    describe_counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation calls by mode and status"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Inference backend call latency in seconds"
    );

    describe_counter!(
        format!("{}_busy_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Requests rejected because the generation slot was held"
    );

    describe_counter!(
        format!("{}_validation_stages_total", METRICS_PREFIX),
        Unit::Count,
        "Validation stages run, labelled by stage and parse outcome"
    );

    describe_counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks added to the vector store"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, domain: &str, result_count: usize) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "domain" => domain.to_string()
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "domain" => domain.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record a finished generation call
pub fn record_generation(duration_secs: f64, mode: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "mode" => mode.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record a rejected admission attempt
pub fn record_busy_rejection() {
    counter!(format!("{}_busy_rejections_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a validation stage outcome
pub fn record_validation_stage(stage: &str, parsed: bool) {
    counter!(
        format!("{}_validation_stages_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "parsed" => parsed.to_string()
    )
    .increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(domain: &str, chunks_added: usize) {
    counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        "domain" => domain.to_string()
    )
    .increment(chunks_added as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in GENERATION_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: helpers must be no-ops
        let metrics = RequestMetrics::start("POST", "/api/chat");
        metrics.finish(200);
        record_retrieval(0.01, "default", 3);
        record_generation(1.5, "blocking", true);
        record_busy_rejection();
        record_validation_stage("citation", false);
        record_ingestion("default", 12);
    }
}

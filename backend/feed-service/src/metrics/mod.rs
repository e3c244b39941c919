//! Prometheus metrics for the fan-out worker and the HTTP API.

use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, TextEncoder,
};

pub mod middleware;

pub use middleware::MetricsMiddleware;

static FANOUT_TASKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fanout_tasks_total",
        "Fan-out tasks by outcome (delivered/post_not_found/no_followers/dead_lettered/failed)",
        &["outcome"]
    )
    .expect("Failed to register fanout tasks metric")
});

static FANOUT_FEED_UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fanout_feed_updates_total",
        "Per-follower feed updates by result (prepended/already_present)",
        &["result"]
    )
    .expect("Failed to register fanout feed updates metric")
});

static FANOUT_QUEUE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fanout_queue_errors_total",
        "Errors returned by the event queue while taking tasks"
    )
    .expect("Failed to register fanout queue errors metric")
});

static FANOUT_TASK_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "fanout_task_duration_seconds",
        "Time spent processing one fan-out task",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("Failed to register fanout task duration metric")
});

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "feed_service_http_requests_total",
            "Total HTTP requests handled by feed-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create feed_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register feed_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "feed_service_http_request_duration_seconds",
            "HTTP request latency for feed-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create feed_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register feed_service_http_request_duration_seconds");
    histogram
});

/// Record a finished task by outcome label
pub fn record_task(outcome: &str, elapsed: Duration) {
    FANOUT_TASKS_TOTAL.with_label_values(&[outcome]).inc();
    FANOUT_TASK_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_feed_update(result: &str) {
    FANOUT_FEED_UPDATES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_queue_error() {
    FANOUT_QUEUE_ERRORS_TOTAL.inc();
}

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

/// Prometheus text exposition of the default registry
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_counter_increments_per_outcome() {
        let before = FANOUT_TASKS_TOTAL.with_label_values(&["no_followers"]).get();
        record_task("no_followers", Duration::from_millis(3));
        record_task("no_followers", Duration::from_millis(3));
        let after = FANOUT_TASKS_TOTAL.with_label_values(&["no_followers"]).get();
        assert!(after >= before + 2);
    }

    #[actix_web::test]
    async fn test_serve_metrics_exposes_fanout_series() {
        record_queue_error();
        record_feed_update("prepended");

        let resp = serve_metrics().await;
        assert!(resp.status().is_success());

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("fanout_queue_errors_total"));
        assert!(text.contains("fanout_feed_updates_total"));
    }
}

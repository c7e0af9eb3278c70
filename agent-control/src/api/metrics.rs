//! Self-metrics for the `/v1/metrics` endpoint (`spec.md` §4.3). Registered
//! once, lazily, against `prometheus`'s default registry so
//! `prometheus::gather()` in `handlers::metrics_handler` has real series to
//! report instead of an empty body.

use std::sync::OnceLock;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

pub struct ServerMetrics {
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub config_applies_total: IntCounterVec,
    pub config_reloads_total: IntCounterVec,
}

fn register() -> ServerMetrics {
    let http_requests_total = IntCounterVec::new(
        Opts::new(
            "nrdot_http_requests_total",
            "Total HTTP requests handled by the API server",
        ),
        &["method", "path", "status"],
    )
    .expect("metric definition is valid");
    let _ = prometheus::register(Box::new(http_requests_total.clone()));

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "nrdot_http_request_duration_seconds",
            "HTTP request latency in seconds",
        ),
        &["method", "path"],
    )
    .expect("metric definition is valid");
    let _ = prometheus::register(Box::new(http_request_duration_seconds.clone()));

    let config_applies_total = IntCounterVec::new(
        Opts::new("nrdot_config_applies_total", "Total ApplyConfig calls, by outcome"),
        &["outcome"],
    )
    .expect("metric definition is valid");
    let _ = prometheus::register(Box::new(config_applies_total.clone()));

    let config_reloads_total = IntCounterVec::new(
        Opts::new(
            "nrdot_config_reloads_total",
            "Total POST /v1/reload calls, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric definition is valid");
    let _ = prometheus::register(Box::new(config_reloads_total.clone()));

    ServerMetrics {
        http_requests_total,
        http_request_duration_seconds,
        config_applies_total,
        config_reloads_total,
    }
}

/// The process-wide self-metrics registry, created and registered with
/// `prometheus`'s default registry on first use.
pub fn metrics() -> &'static ServerMetrics {
    static METRICS: OnceLock<ServerMetrics> = OnceLock::new();
    METRICS.get_or_init(register)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_idempotently_registered() {
        // Calling this from more than one test in the same process must not
        // panic with a duplicate-registration error.
        let first = metrics();
        let second = metrics();
        first.http_requests_total.with_label_values(&["GET", "/v1/status", "200"]).inc();
        assert_eq!(
            second
                .http_requests_total
                .with_label_values(&["GET", "/v1/status", "200"])
                .get(),
            1
        );
    }
}

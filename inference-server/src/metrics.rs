//! Prometheus metrics for the batching pipeline.
//!
//! Gauges are updated only at enqueue/dequeue and worker start/end so they
//! cannot drift from the true queue depth or in-flight count.

use std::time::Duration;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Request terminal states used as the `status` label.
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const TIMEOUT: &str = "timeout";
    pub const OVERLOADED: &str = "overloaded";
}

pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub batch_size: Histogram,
    pub request_latency: Histogram,
    pub batch_wait_time: Histogram,
    pub inference_time: Histogram,
    pub queue_size: IntGauge,
    pub inflight_batches: IntGauge,
    /// Items dropped before batching because the caller stopped waiting.
    pub cancelled_items: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("batcher_requests_total", "Total number of prediction requests"),
            &["status"],
        )
        .expect("batcher_requests_total opts");

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("batcher_batch_size", "Distribution of batch sizes processed")
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0]),
        )
        .expect("batcher_batch_size opts");

        let request_latency = Histogram::with_opts(
            HistogramOpts::new(
                "batcher_request_latency_seconds",
                "End-to-end request latency",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("batcher_request_latency_seconds opts");

        let batch_wait_time = Histogram::with_opts(
            HistogramOpts::new(
                "batcher_batch_wait_time_seconds",
                "Time spent waiting to form a batch",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]),
        )
        .expect("batcher_batch_wait_time_seconds opts");

        let inference_time = Histogram::with_opts(
            HistogramOpts::new(
                "batcher_inference_time_seconds",
                "Model inference time per batch",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )
        .expect("batcher_inference_time_seconds opts");

        let queue_size = IntGauge::new("batcher_queue_size", "Current number of requests in queue")
            .expect("batcher_queue_size opts");

        let inflight_batches = IntGauge::new(
            "batcher_inflight_batches",
            "Current number of batches being processed",
        )
        .expect("batcher_inflight_batches opts");

        let cancelled_items = IntCounter::new(
            "batcher_cancelled_items_total",
            "Items dropped before batching because the caller went away",
        )
        .expect("batcher_cancelled_items_total opts");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(batch_size.clone()),
            Box::new(request_latency.clone()),
            Box::new(batch_wait_time.clone()),
            Box::new(inference_time.clone()),
            Box::new(queue_size.clone()),
            Box::new(inflight_batches.clone()),
            Box::new(cancelled_items.clone()),
        ] {
            registry.register(collector).expect("register metric");
        }

        Self {
            registry,
            requests_total,
            batch_size,
            request_latency,
            batch_wait_time,
            inference_time,
            queue_size,
            inflight_batches,
            cancelled_items,
        }
    }

    /// Count a terminal request state and observe its end-to-end latency.
    pub fn record_request(&self, status: &str, latency: Duration) {
        self.requests_total.with_label_values(&[status]).inc();
        self.request_latency.observe(latency.as_secs_f64());
    }

    /// Render the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposition_contains_all_instruments() {
        let metrics = Metrics::new();
        metrics.record_request(status::SUCCESS, Duration::from_millis(3));
        metrics.batch_size.observe(4.0);
        metrics.queue_size.set(7);
        metrics.inflight_batches.set(1);

        let text = metrics.encode();
        assert!(text.contains("batcher_requests_total"));
        assert!(text.contains("batcher_batch_size"));
        assert!(text.contains("batcher_request_latency_seconds"));
        assert!(text.contains("batcher_batch_wait_time_seconds"));
        assert!(text.contains("batcher_inference_time_seconds"));
        assert!(text.contains("batcher_queue_size 7"));
        assert!(text.contains("batcher_inflight_batches 1"));
    }

    #[test]
    fn test_status_label_values() {
        let metrics = Metrics::new();
        metrics.record_request(status::OVERLOADED, Duration::from_millis(1));
        metrics.record_request(status::OVERLOADED, Duration::from_millis(1));

        let text = metrics.encode();
        assert!(text.contains(r#"batcher_requests_total{status="overloaded"} 2"#));
    }
}

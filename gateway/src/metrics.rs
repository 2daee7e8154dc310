//! Gateway metrics.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    /// Requests by terminal status (success, unauthorized, rate_limited,
    /// upstream_error, timeout, validation_error).
    pub requests_total: IntCounterVec,
    /// Requests admitted because the counter store was unreachable.
    pub rate_limit_fallback: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Total requests handled by the gateway"),
            &["status"],
        )
        .expect("gateway_requests_total opts");

        let rate_limit_fallback = IntCounter::new(
            "gateway_rate_limit_fallback_total",
            "Requests admitted while the counter store was unreachable",
        )
        .expect("gateway_rate_limit_fallback_total opts");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("register gateway_requests_total");
        registry
            .register(Box::new(rate_limit_fallback.clone()))
            .expect("register gateway_rate_limit_fallback_total");

        Self {
            registry,
            requests_total,
            rate_limit_fallback,
        }
    }

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
    fn test_exposition() {
        let metrics = Metrics::new();
        metrics.requests_total.with_label_values(&["success"]).inc();
        metrics.rate_limit_fallback.inc();

        let text = metrics.encode();
        assert!(text.contains(r#"gateway_requests_total{status="success"} 1"#));
        assert!(text.contains("gateway_rate_limit_fallback_total 1"));
    }
}

use std::time::Duration;

use prometheus::{
    opts, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    request_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    inflight_requests: IntGauge,
    upstream_errors_total: IntCounterVec,
    fragments_forwarded_total: IntCounter,
    fragments_suppressed_total: IntCounter,
}

pub struct InflightGuard {
    gauge: IntGauge,
}

impl RelayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let request_total = IntCounterVec::new(
            opts!(
                "relay_http_requests_total",
                "Total chat requests handled by the relay"
            ),
            &["status"],
        )
        .expect("valid request_total metric");

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "relay_http_request_duration_seconds",
                "Time until the chat handler returned a response head, by status",
            ),
            &["status"],
        )
        .expect("valid request_duration_seconds metric");

        let inflight_requests = IntGauge::new(
            "relay_inflight_streams",
            "Chat requests currently being relayed",
        )
        .expect("valid inflight_requests metric");

        let upstream_errors_total = IntCounterVec::new(
            opts!(
                "relay_upstream_errors_total",
                "Upstream failures by kind"
            ),
            &["kind"],
        )
        .expect("valid upstream_errors_total metric");

        let fragments_forwarded_total = IntCounter::new(
            "relay_fragments_forwarded_total",
            "Sanitized fragments written to clients",
        )
        .expect("valid fragments_forwarded_total metric");

        let fragments_suppressed_total = IntCounter::new(
            "relay_fragments_suppressed_total",
            "Fragments dropped because nothing was left after sanitizing",
        )
        .expect("valid fragments_suppressed_total metric");

        registry
            .register(Box::new(request_total.clone()))
            .expect("register request_total");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("register request_duration_seconds");
        registry
            .register(Box::new(inflight_requests.clone()))
            .expect("register inflight_requests");
        registry
            .register(Box::new(upstream_errors_total.clone()))
            .expect("register upstream_errors_total");
        registry
            .register(Box::new(fragments_forwarded_total.clone()))
            .expect("register fragments_forwarded_total");
        registry
            .register(Box::new(fragments_suppressed_total.clone()))
            .expect("register fragments_suppressed_total");

        Self {
            registry,
            request_total,
            request_duration_seconds,
            inflight_requests,
            upstream_errors_total,
            fragments_forwarded_total,
            fragments_suppressed_total,
        }
    }

    /// Keeps the in-flight gauge raised until dropped. Owned, so it can move
    /// into a response body that outlives the handler.
    pub fn inflight_guard(&self) -> InflightGuard {
        self.inflight_requests.inc();
        InflightGuard {
            gauge: self.inflight_requests.clone(),
        }
    }

    pub fn observe_request(&self, status: u16, duration: Duration) {
        let status_label = status.to_string();
        self.request_total.with_label_values(&[status_label.as_str()]).inc();
        self.request_duration_seconds
            .with_label_values(&[status_label.as_str()])
            .observe(duration.as_secs_f64());
    }

    pub fn observe_upstream_error(&self, kind: &str) {
        self.upstream_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn observe_fragment(&self, forwarded: bool) {
        if forwarded {
            self.fragments_forwarded_total.inc();
        } else {
            self.fragments_suppressed_total.inc();
        }
    }

    pub fn render(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|error| error.to_string())?;
        String::from_utf8(buffer).map_err(|error| error.to_string())
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflight_gauge_follows_guard_lifetime() {
        let metrics = RelayMetrics::new();
        let guard = metrics.inflight_guard();
        assert_eq!(metrics.inflight_requests.get(), 1);
        drop(guard);
        assert_eq!(metrics.inflight_requests.get(), 0);
    }

    #[test]
    fn render_lists_registered_families() {
        let metrics = RelayMetrics::new();
        metrics.observe_upstream_error("timeout");
        metrics.observe_fragment(true);
        metrics.observe_request(500, Duration::from_millis(3));

        let rendered = metrics.render().expect("metrics should render");
        assert!(rendered.contains("relay_upstream_errors_total{kind=\"timeout\"} 1"));
        assert!(rendered.contains("relay_fragments_forwarded_total 1"));
        assert!(rendered.contains("relay_http_request_duration_seconds_count{status=\"500\"} 1"));
    }
}

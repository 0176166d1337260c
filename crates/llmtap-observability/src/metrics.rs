//! Capture metrics with Prometheus
//!
//! Persistence runs off the caller's data path, so its outcome is only
//! observable here and in logs:
//! - Rows persisted and persistence failures, by capture path
//! - Streams that ended without a finish chunk
//! - Failed model calls
//! - Call latency

use prometheus::{Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector for the capture pipeline
#[derive(Clone)]
pub struct CaptureMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Rows handed to the sink successfully
    pub rows_persisted: CounterVec,
    /// Rows the sink rejected
    pub persist_failures: CounterVec,
    /// Streams that ended, errored or were dropped before a finish chunk
    pub streams_incomplete: Counter,
    /// Model calls that failed
    pub calls_failed: Counter,
    /// End-to-end call latency
    pub call_latency_seconds: HistogramVec,
}

impl CaptureMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rows_persisted = CounterVec::new(
            Opts::new("llmtap_rows_persisted_total", "Total number of call rows persisted"),
            &["path"],
        )?;

        let persist_failures = CounterVec::new(
            Opts::new(
                "llmtap_persist_failures_total",
                "Total number of call rows that failed to persist",
            ),
            &["path"],
        )?;

        let streams_incomplete = Counter::with_opts(Opts::new(
            "llmtap_streams_incomplete_total",
            "Streams that ended without a finish chunk",
        ))?;

        let calls_failed = Counter::with_opts(Opts::new(
            "llmtap_calls_failed_total",
            "Model calls that returned an error",
        ))?;

        let call_latency_seconds = HistogramVec::new(
            HistogramOpts::new("llmtap_call_latency_seconds", "Model call latency in seconds")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["path"],
        )?;

        registry.register(Box::new(rows_persisted.clone()))?;
        registry.register(Box::new(persist_failures.clone()))?;
        registry.register(Box::new(streams_incomplete.clone()))?;
        registry.register(Box::new(calls_failed.clone()))?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            rows_persisted,
            persist_failures,
            streams_incomplete,
            calls_failed,
            call_latency_seconds,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one row save
    pub fn record_persisted(&self, path: &str, success: bool) {
        if success {
            self.rows_persisted.with_label_values(&[path]).inc();
        } else {
            self.persist_failures.with_label_values(&[path]).inc();
        }
    }

    /// Record a finalized call
    pub fn record_call(&self, path: &str, latency_ms: u64, failed: bool) {
        self.call_latency_seconds
            .with_label_values(&[path])
            .observe(latency_ms as f64 / 1000.0);
        if failed {
            self.calls_failed.inc();
        }
    }

    pub fn record_incomplete_stream(&self) {
        self.streams_incomplete.inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &CaptureMetrics, name: &str) -> f64 {
        let gathered = metrics.registry().gather();
        let family = gathered
            .iter()
            .find(|m| m.name() == name)
            .unwrap_or_else(|| panic!("{name} metric not found"));
        family.metric[0].counter.as_ref().unwrap().value.unwrap()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = CaptureMetrics::new().unwrap();
        // Unlabelled counters are exported from the start
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_persisted() {
        let metrics = CaptureMetrics::new().unwrap();
        metrics.record_persisted("stream", true);
        metrics.record_persisted("stream", true);
        metrics.record_persisted("generate", false);

        assert_eq!(counter_value(&metrics, "llmtap_rows_persisted_total"), 2.0);
        assert_eq!(counter_value(&metrics, "llmtap_persist_failures_total"), 1.0);
    }

    #[test]
    fn test_record_call_and_incomplete() {
        let metrics = CaptureMetrics::new().unwrap();
        metrics.record_call("generate", 1500, true);
        metrics.record_call("generate", 200, false);
        metrics.record_incomplete_stream();

        assert_eq!(counter_value(&metrics, "llmtap_calls_failed_total"), 1.0);
        assert_eq!(counter_value(&metrics, "llmtap_streams_incomplete_total"), 1.0);
    }

    #[test]
    fn test_gather_text_format() {
        let metrics = CaptureMetrics::new().unwrap();
        metrics.record_call("stream", 250, false);

        let text = metrics.gather().unwrap();
        assert!(text.contains("llmtap_call_latency_seconds_count{path=\"stream\"} 1"));
        assert!(text.contains("# TYPE llmtap_calls_failed_total counter"));
    }
}

use crate::error::RenderError;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use std::time::Duration;

/// Per-render counters and histograms
///
/// Handles are no-ops until the host installs a `metrics` recorder.
pub struct RenderMetrics {
    pub renders_total: Counter,
    pub render_failures: Counter,
    pub render_duration: Histogram,
    pub output_bytes: Histogram,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self {
            renders_total: register_counter!("renders_total"),
            render_failures: register_counter!("render_failures_total"),
            render_duration: register_histogram!("render_duration_seconds"),
            output_bytes: register_histogram!("render_output_bytes"),
        }
    }

    pub fn record_success(&self, duration: Duration, bytes: usize) {
        self.renders_total.increment(1);
        self.render_duration.record(duration.as_secs_f64());
        self.output_bytes.record(bytes as f64);
    }

    pub fn record_failure(&self, duration: Duration, error: &RenderError) {
        self.renders_total.increment(1);
        self.render_failures.increment(1);
        self.render_duration.record(duration.as_secs_f64());
        metrics::increment_counter!("render_errors_total", "kind" => error.kind());
    }
}

impl Default for RenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

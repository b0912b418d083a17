//! Prometheus counters for the telemetry pipeline
//!
//! Registered in the default registry so a host process that already exposes
//! `/metrics` picks them up without extra wiring.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

lazy_static! {
    /// Events accepted into the buffer
    pub static ref EVENTS_ENQUEUED: IntCounter = register_int_counter!(
        "taskscope_events_enqueued_total",
        "Telemetry events accepted into the buffer"
    )
    .expect("metric can be registered");

    /// Events dropped because the buffer was full
    pub static ref EVENTS_DROPPED: IntCounter = register_int_counter!(
        "taskscope_events_dropped_total",
        "Telemetry events dropped because the buffer was at capacity"
    )
    .expect("metric can be registered");

    /// Batch send outcomes ("success" | "failure")
    pub static ref BATCHES_SENT: IntCounterVec = register_int_counter_vec!(
        "taskscope_batches_sent_total",
        "Ingestion batches by final outcome",
        &["outcome"]
    )
    .expect("metric can be registered");

    /// Events the server rejected inside an accepted batch
    pub static ref EVENTS_REJECTED: IntCounter = register_int_counter!(
        "taskscope_events_rejected_total",
        "Events rejected individually by the ingestion endpoint"
    )
    .expect("metric can be registered");

    /// Second attempts after a failed batch send
    pub static ref SEND_RETRIES: IntCounter = register_int_counter!(
        "taskscope_send_retries_total",
        "Batch sends retried after a first failure"
    )
    .expect("metric can be registered");
}

/// Render every metric in the default registry in text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_pipeline_counters() {
        EVENTS_ENQUEUED.inc_by(0);
        BATCHES_SENT.with_label_values(&["success"]).inc_by(0);

        let text = render();
        assert!(text.contains("taskscope_events_enqueued_total"));
        assert!(text.contains("taskscope_batches_sent_total"));
    }
}

//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    CONNECTIVITY_ONLINE, DIRECT_PUBLISH_TOTAL, DRAIN_EPISODES_TOTAL, DRAIN_TICKS_TOTAL,
    PUBLISH_FAILED_TOTAL, QUEUE_DEPTH, QUEUE_DRAINED_TOTAL, QUEUE_ENQUEUED_TOTAL,
    QUEUE_EVICTED_TOTAL, QUEUE_QUARANTINED_TOTAL, STORE_ERRORS_TOTAL,
    TRANSPORT_RECONNECTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn set_depth(depth: usize) {
        QUEUE_DEPTH.set(depth as i64);
    }

    pub fn record_enqueued() {
        QUEUE_ENQUEUED_TOTAL.inc();
    }

    pub fn record_evicted(count: u64) {
        QUEUE_EVICTED_TOTAL.inc_by(count);
    }

    pub fn record_drained() {
        QUEUE_DRAINED_TOTAL.inc();
    }

    pub fn record_quarantined() {
        QUEUE_QUARANTINED_TOTAL.inc();
    }

    pub fn record_direct_publish() {
        DIRECT_PUBLISH_TOTAL.inc();
    }

    /// Record a publish failure on the `direct` or `drain` path
    pub fn record_publish_failed(path: &str) {
        PUBLISH_FAILED_TOTAL.with_label_values(&[path]).inc();
    }
}

/// Helper struct for recording drain metrics
pub struct DrainMetrics;

impl DrainMetrics {
    pub fn record_tick(outcome: &str) {
        DRAIN_TICKS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_episode() {
        DRAIN_EPISODES_TOTAL.inc();
    }
}

/// Helper struct for recording record store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(operation: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}

/// Helper struct for recording transport metrics
pub struct TransportMetrics;

impl TransportMetrics {
    pub fn set_online(online: bool) {
        CONNECTIVITY_ONLINE.set(if online { 1 } else { 0 });
    }

    pub fn record_reconnection() {
        TRANSPORT_RECONNECTIONS_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_tick_outcomes_are_separate_series() {
        DrainMetrics::record_tick("idle");
        let output = encode_metrics().unwrap();
        assert!(output.contains("spool_drain_ticks_total{outcome=\"idle\"}"));
    }
}

//! Prometheus metrics for the telemetry spool.
//!
//! - Queue metrics (depth, enqueued, evicted, drained, quarantined)
//! - Drain metrics (ticks by outcome, episodes)
//! - Delivery metrics (direct publishes, publish failures)
//! - Storage metrics (record store errors by operation)
//! - Transport metrics (connectivity, reconnections)

mod helpers;

pub use helpers::{encode_metrics, DrainMetrics, QueueMetrics, StoreMetrics, TransportMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "spool";

lazy_static! {
    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Entries currently held in the durable queue
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Entries currently held in the durable queue"
    ).unwrap();

    /// Messages written to the queue while offline
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Total messages written to the queue while offline"
    ).unwrap();

    /// Entries evicted to respect the capacity bound
    pub static ref QUEUE_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_evicted_total", METRIC_PREFIX),
        "Total oldest entries evicted to respect the capacity bound"
    ).unwrap();

    /// Entries published and removed by the drain engine
    pub static ref QUEUE_DRAINED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_drained_total", METRIC_PREFIX),
        "Total entries published and removed during drain"
    ).unwrap();

    /// Undecodable entries moved out of the queue
    pub static ref QUEUE_QUARANTINED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_quarantined_total", METRIC_PREFIX),
        "Total undecodable entries moved out of the queue"
    ).unwrap();

    // ============================================================================
    // Drain Metrics
    // ============================================================================

    /// Drain ticks by outcome
    pub static ref DRAIN_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_drain_ticks_total", METRIC_PREFIX),
        "Total drain ticks by outcome",
        &["outcome"]
    ).unwrap();

    /// Drain timers started
    pub static ref DRAIN_EPISODES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_drain_episodes_total", METRIC_PREFIX),
        "Total drain timers started"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Messages published directly while online
    pub static ref DIRECT_PUBLISH_TOTAL: IntCounter = register_int_counter!(
        format!("{}_direct_publish_total", METRIC_PREFIX),
        "Total messages published directly while online"
    ).unwrap();

    /// Publish failures by path (direct, drain)
    pub static ref PUBLISH_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_publish_failed_total", METRIC_PREFIX),
        "Total transport publish failures by path",
        &["path"]
    ).unwrap();

    // ============================================================================
    // Storage Metrics
    // ============================================================================

    /// Record store errors by queue operation
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total record store errors by queue operation",
        &["operation"]
    ).unwrap();

    // ============================================================================
    // Transport Metrics
    // ============================================================================

    /// Connectivity state (1 = online, 0 = offline)
    pub static ref CONNECTIVITY_ONLINE: IntGauge = register_int_gauge!(
        format!("{}_connectivity_online", METRIC_PREFIX),
        "Connectivity state (1=online, 0=offline)"
    ).unwrap();

    /// Transport reconnections observed by the connection monitor
    pub static ref TRANSPORT_RECONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_transport_reconnections_total", METRIC_PREFIX),
        "Total transport reconnections"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        QUEUE_DEPTH.set(3);
        let output = encode_metrics().unwrap();
        assert!(output.contains("spool_queue_depth"));
    }

    #[test]
    fn test_labelled_counters() {
        DRAIN_TICKS_TOTAL.with_label_values(&["published"]).inc();
        STORE_ERRORS_TOTAL.with_label_values(&["enqueue"]).inc();
        PUBLISH_FAILED_TOTAL.with_label_values(&["drain"]).inc();

        assert!(DRAIN_TICKS_TOTAL.with_label_values(&["published"]).get() >= 1);
        assert!(STORE_ERRORS_TOTAL.with_label_values(&["enqueue"]).get() >= 1);
    }
}

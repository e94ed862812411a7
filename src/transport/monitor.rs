//! Link probing task.
//!
//! Pings the transport on a fixed interval while the link is up and with
//! exponential backoff while it is down. Only status transitions produce
//! `TransportEvent`s, so subscribers see one `Connected` per outage.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::metrics::TransportMetrics;

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::health::LinkHealth;
use super::{ping_within, Transport, TransportEvent};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ConnectionMonitor {
    transport: Arc<dyn Transport>,
    health: Arc<LinkHealth>,
    events: broadcast::Sender<TransportEvent>,
    probe_interval: Duration,
    probe_timeout: Duration,
    backoff: ExponentialBackoff,
    shutdown: broadcast::Receiver<()>,
}

impl ConnectionMonitor {
    pub fn new(
        transport: Arc<dyn Transport>,
        health: Arc<LinkHealth>,
        events: broadcast::Sender<TransportEvent>,
        probe_interval: Duration,
        backoff: BackoffConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            transport,
            health,
            events,
            probe_interval: probe_interval.max(Duration::from_millis(1)),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            backoff: ExponentialBackoff::with_config(backoff),
            shutdown,
        }
    }

    /// Treat a probe that takes longer than `probe_timeout` as failed.
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout.max(Duration::from_millis(1));
        self
    }

    /// Probe the link once and publish an event if its status changed.
    /// Returns how long to wait before the next probe.
    pub async fn probe(&mut self) -> Duration {
        let kind = self.transport.kind();

        match ping_within(self.transport.as_ref(), self.probe_timeout).await {
            Ok(()) => {
                let reconnected = self.backoff.attempt() > 0;
                if self.health.set_connected() {
                    tracing::info!(cloud = %kind, "Transport link up");
                    if reconnected {
                        TransportMetrics::record_reconnection();
                    }
                    // No subscribers is not an error for the monitor
                    let _ = self.events.send(TransportEvent::Connected(kind));
                }
                self.backoff.reset();
                self.probe_interval
            }
            Err(e) => {
                if self.health.set_reconnecting() {
                    tracing::warn!(cloud = %kind, error = %e, "Transport link down");
                    let _ = self.events.send(TransportEvent::Disconnected(kind));
                }
                let delay = self.backoff.next_delay();
                tracing::debug!(
                    cloud = %kind,
                    error = %e,
                    attempt = self.backoff.attempt(),
                    retry_in_ms = delay.as_millis() as u64,
                    "Transport probe failed"
                );
                delay
            }
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(mut self) {
        tracing::info!(
            cloud = %self.transport.kind(),
            probe_interval_ms = self.probe_interval.as_millis() as u64,
            "Connection monitor started"
        );

        loop {
            let wait = self.probe().await;

            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Connection monitor received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!("Connection monitor stopped");
    }
}

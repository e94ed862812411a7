//! Producer-facing entry point of the queue.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::metrics::QueueMetrics;
use crate::transport::{publish_within, Qos, Transport, TransportEvent};

use super::drain::DrainEngine;
use super::gate::ConnectivityGate;
use super::models::{QueueConfig, QueueStats, SendOutcome};
use super::store::QueueStore;

/// Sends messages now when the link is up and queues them when it is not.
///
/// One facade owns one queue. Lifecycle events reach it either through
/// [`QueueFacade::handle_event`] or the listener spawned by
/// [`QueueFacade::register`].
pub struct QueueFacade {
    store: Arc<Mutex<QueueStore>>,
    transport: Arc<dyn Transport>,
    publish_timeout: Duration,
    gate: ConnectivityGate,
    drain: Arc<DrainEngine>,
}

impl QueueFacade {
    /// Open the file-backed queue and wire it to `transport`. Starts offline.
    pub fn new(config: QueueConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_store(QueueStore::open(config), transport)
    }

    /// Wire an already opened queue to `transport`.
    pub fn with_store(store: QueueStore, transport: Arc<dyn Transport>) -> Self {
        let interval = store.config().drain_interval;
        let max_parse_failures = store.config().max_parse_failures;
        let publish_timeout = store.config().publish_timeout;
        let store = Arc::new(Mutex::new(store));
        let online = Arc::new(AtomicBool::new(false));

        let drain = Arc::new(DrainEngine::new(
            store.clone(),
            transport.clone(),
            online.clone(),
            interval,
            max_parse_failures,
            publish_timeout,
        ));
        let gate = ConnectivityGate::new(online, drain.clone());

        Self {
            store,
            transport,
            publish_timeout,
            gate,
            drain,
        }
    }

    /// Publish `payload` under `label`, or queue it while offline.
    pub async fn send(&self, label: &str, payload: &str) -> SendOutcome {
        if label.is_empty() {
            tracing::warn!("Rejecting message with empty label");
            return SendOutcome::Failed;
        }

        let mut store = self.store.lock().await;

        if self.gate.is_online() {
            return match publish_within(
                self.transport.as_ref(),
                self.publish_timeout,
                label,
                payload,
                Qos::AtLeastOnce,
                false,
            )
            .await
            {
                Ok(()) => {
                    QueueMetrics::record_direct_publish();
                    SendOutcome::DeliveredNow
                }
                Err(e) => {
                    QueueMetrics::record_publish_failed("direct");
                    tracing::warn!(label = %label, error = %e, "Direct publish failed");
                    SendOutcome::Failed
                }
            };
        }

        match store.enqueue(label, payload) {
            Ok(id) => SendOutcome::Queued(id),
            Err(e) => {
                tracing::error!(label = %label, error = %e, "Failed to queue message");
                SendOutcome::Failed
            }
        }
    }

    /// Serialize `value` as JSON and [`send`](Self::send) it.
    pub async fn send_json<T: Serialize>(&self, label: &str, value: &T) -> SendOutcome {
        match serde_json::to_string(value) {
            Ok(payload) => self.send(label, &payload).await,
            Err(e) => {
                tracing::error!(label = %label, error = %e, "Failed to serialize message");
                SendOutcome::Failed
            }
        }
    }

    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(cloud) => self.gate.on_connected(cloud),
            TransportEvent::Disconnected(cloud) => self.gate.on_disconnected(cloud),
        }
    }

    /// Spawn a listener feeding `events` into this facade until shutdown.
    pub fn register(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<TransportEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let facade = self.clone();
        tokio::spawn(async move {
            tracing::info!("Queue event listener started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("Queue event listener received shutdown signal");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(event) => facade.handle_event(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped = skipped, "Queue event listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::info!("Queue event listener stopped");
        })
    }

    pub fn is_online(&self) -> bool {
        self.gate.is_online()
    }

    pub fn is_draining(&self) -> bool {
        self.drain.is_running()
    }

    /// Number of queued messages.
    pub async fn depth(&self) -> usize {
        self.store.lock().await.count()
    }

    pub async fn stats(&self) -> QueueStats {
        let store = self.store.lock().await;
        QueueStats {
            depth: store.count(),
            max_count: store.config().max_count,
            online: self.gate.is_online(),
            draining: self.drain.is_running(),
            store: store.kind(),
        }
    }

    /// Stop draining and flush the store.
    pub async fn shutdown(&self) {
        self.drain.stop();
        let mut store = self.store.lock().await;
        if store.flush().is_ok() {
            tracing::info!(depth = store.count(), "Queue flushed");
        }
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ProducerConfig;
use crate::queue::{QueueFacade, SendOutcome};

/// Periodic device status message.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub uptime_seconds: u64,
    pub queue_depth: usize,
    pub online: bool,
}

/// Background task that sends a status report through the queue on a timer.
pub struct StatusReporter {
    config: ProducerConfig,
    queue: Arc<QueueFacade>,
    started_at: Instant,
    shutdown: broadcast::Receiver<()>,
}

impl StatusReporter {
    pub fn new(
        config: ProducerConfig,
        queue: Arc<QueueFacade>,
        started_at: Instant,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            queue,
            started_at,
            shutdown,
        }
    }

    /// Build and send one report.
    pub async fn report(&self) -> SendOutcome {
        let report = StatusReport {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            queue_depth: self.queue.depth().await,
            online: self.queue.is_online(),
        };

        let outcome = self.queue.send_json(&self.config.label, &report).await;
        tracing::debug!(
            label = %self.config.label,
            uptime_seconds = report.uptime_seconds,
            queue_depth = report.queue_depth,
            outcome = outcome.as_str(),
            "Status report sent"
        );
        outcome
    }

    pub async fn run(mut self) {
        let interval = Duration::from_millis(self.config.interval_ms.max(1));
        let mut timer = tokio::time::interval(interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            label = %self.config.label,
            "Status reporter started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Status reporter received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.report().await;
                }
            }
        }

        tracing::info!("Status reporter stopped");
    }
}

//! Graceful shutdown.
//!
//! Runs in three phases:
//! 1. Signal background tasks (connection monitor, event listener, status
//!    reporter, HTTP server) to stop
//! 2. Wait for them to finish, aborting stragglers after a timeout
//! 3. Stop the drain timer and flush the queue to disk

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::queue::QueueFacade;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for background tasks to exit (default: 5 seconds)
    pub task_timeout: Duration,
    /// Time to wait for the final queue flush (default: 10 seconds)
    pub flush_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(10),
        }
    }
}

pub struct GracefulShutdown {
    queue: Arc<QueueFacade>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(queue: Arc<QueueFacade>, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self::with_config(queue, shutdown_tx, ShutdownConfig::default())
    }

    pub fn with_config(
        queue: Arc<QueueFacade>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            queue,
            shutdown_tx,
            config,
        }
    }

    /// Execute the shutdown sequence for the given background tasks.
    #[tracing::instrument(name = "graceful_shutdown", skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn execute(&self, reason: &str, tasks: Vec<JoinHandle<()>>) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling background tasks");
        // No receivers left just means every task already exited
        let _ = self.shutdown_tx.send(());

        tracing::info!("Phase 2: Waiting for background tasks");
        let (stopped, aborted) = self.wait_for_tasks(tasks).await;
        result.tasks_stopped = stopped;
        result.tasks_aborted = aborted;

        tracing::info!("Phase 3: Flushing queue");
        result.queue_flushed = timeout(self.config.flush_timeout, self.queue.shutdown())
            .await
            .is_ok();
        result.remaining_messages = self.queue.depth().await;

        result.duration = start.elapsed();
        result.success = result.tasks_aborted == 0 && result.queue_flushed;

        tracing::info!(
            tasks_stopped = result.tasks_stopped,
            tasks_aborted = result.tasks_aborted,
            queue_flushed = result.queue_flushed,
            remaining_messages = result.remaining_messages,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }

    /// Returns (finished, aborted) task counts.
    async fn wait_for_tasks(&self, tasks: Vec<JoinHandle<()>>) -> (usize, usize) {
        let total = tasks.len();
        if total == 0 {
            return (0, 0);
        }

        let aborts: Vec<_> = tasks.iter().map(|task| task.abort_handle()).collect();
        let mut pending: FuturesUnordered<_> = tasks.into_iter().collect();
        let mut finished = 0;

        let wait = async {
            while let Some(joined) = pending.next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "Background task ended abnormally");
                }
                finished += 1;
            }
        };

        if timeout(self.config.task_timeout, wait).await.is_err() {
            tracing::warn!(
                finished = finished,
                total = total,
                "Background tasks did not stop in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        (finished, total - finished)
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether every phase completed in time
    pub success: bool,
    /// Background tasks that exited on their own
    pub tasks_stopped: usize,
    /// Background tasks aborted after the timeout
    pub tasks_aborted: usize,
    /// Whether the final flush completed in time
    pub queue_flushed: bool,
    /// Messages still queued for the next run
    pub remaining_messages: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}

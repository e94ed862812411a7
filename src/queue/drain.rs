//! Drain timer.
//!
//! A drain episode starts when the transport connects and runs one step per
//! `drain_interval`. It ends on the first step that finds the transport
//! offline or the queue empty; at most one episode runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::metrics::{DrainMetrics, QueueMetrics};
use crate::store::RecordId;
use crate::transport::{publish_within, Qos, Transport};

use super::models::TickOutcome;
use super::store::{QueueStore, QueueStoreError};

pub struct DrainEngine {
    store: Arc<AsyncMutex<QueueStore>>,
    transport: Arc<dyn Transport>,
    online: Arc<AtomicBool>,
    interval: Duration,
    max_parse_failures: u32,
    publish_timeout: Duration,
    /// Consecutive decode failures of the current head entry
    parse_failures: Mutex<Option<(RecordId, u32)>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Set when `start` is called while an episode is winding down
    restart: AtomicBool,
}

impl DrainEngine {
    pub fn new(
        store: Arc<AsyncMutex<QueueStore>>,
        transport: Arc<dyn Transport>,
        online: Arc<AtomicBool>,
        interval: Duration,
        max_parse_failures: u32,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            online,
            interval,
            max_parse_failures,
            publish_timeout,
            parse_failures: Mutex::new(None),
            timer: Mutex::new(None),
            restart: AtomicBool::new(false),
        }
    }

    /// Start a drain episode. Returns false if one is already running.
    ///
    /// The first step runs one interval after this call.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut timer = lock(&self.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            self.restart.store(true, Ordering::Release);
            return false;
        }

        self.restart.store(false, Ordering::Release);
        DrainMetrics::record_episode();
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Drain timer started");
        *timer = Some(tokio::spawn(self.clone().run()));
        true
    }

    /// Cancel the running episode, if any.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
            tracing::debug!("Drain timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = self.tick().await;
            if !outcome.is_terminal() {
                continue;
            }

            let mut timer = lock(&self.timer);
            if self.restart.swap(false, Ordering::AcqRel) {
                // A connect arrived while this episode was ending
                continue;
            }
            *timer = None;
            tracing::debug!(outcome = outcome.as_str(), "Drain timer stopped");
            break;
        }
    }

    /// Process at most one queued entry.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = self.step().await;
        DrainMetrics::record_tick(outcome.as_str());
        outcome
    }

    async fn step(&self) -> TickOutcome {
        if !self.online.load(Ordering::Acquire) {
            return TickOutcome::Offline;
        }

        let mut store = self.store.lock().await;
        if store.count() == 0 {
            return TickOutcome::Idle;
        }

        let entry = match store.peek_oldest() {
            Ok(Some(entry)) => entry,
            Ok(None) => return TickOutcome::Idle,
            Err(QueueStoreError::PayloadParse { id, source }) => {
                let failures = self.note_parse_failure(&id);
                tracing::warn!(
                    id = %id,
                    error = %source,
                    failures = failures,
                    "Queued record cannot be decoded"
                );
                if self.max_parse_failures > 0
                    && failures >= self.max_parse_failures
                    && store.quarantine(&id)
                {
                    *lock(&self.parse_failures) = None;
                }
                return TickOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read queue head");
                return TickOutcome::Skipped;
            }
        };
        *lock(&self.parse_failures) = None;

        // The store stays locked for the publish, so it is bounded
        if let Err(e) = publish_within(
            self.transport.as_ref(),
            self.publish_timeout,
            &entry.label,
            &entry.payload,
            Qos::AtLeastOnce,
            false,
        )
        .await
        {
            QueueMetrics::record_publish_failed("drain");
            tracing::warn!(
                id = %entry.id,
                label = %entry.label,
                error = %e,
                "Publish failed, entry stays queued"
            );
            return TickOutcome::PublishFailed;
        }

        if store.remove_oldest(&entry.id) {
            QueueMetrics::record_drained();
            tracing::debug!(
                id = %entry.id,
                label = %entry.label,
                remaining = store.count(),
                "Queued message delivered"
            );
            TickOutcome::Published
        } else {
            TickOutcome::Skipped
        }
    }

    fn note_parse_failure(&self, id: &RecordId) -> u32 {
        let mut tracker = lock(&self.parse_failures);
        let failures = match tracker.as_ref() {
            Some((head, count)) if head == id => count + 1,
            _ => 1,
        };
        *tracker = Some((id.clone(), failures));
        failures
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

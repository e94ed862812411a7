use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::metrics::TransportMetrics;
use crate::transport::CloudType;

use super::drain::DrainEngine;

/// Online/offline state as seen by the queue.
///
/// Starts offline. A connect starts a drain episode; a disconnect only
/// flips the state and lets the running episode notice on its next step.
pub struct ConnectivityGate {
    online: Arc<AtomicBool>,
    drain: Arc<DrainEngine>,
}

impl ConnectivityGate {
    pub fn new(online: Arc<AtomicBool>, drain: Arc<DrainEngine>) -> Self {
        Self { online, drain }
    }

    pub fn on_connected(&self, cloud: CloudType) {
        self.online.store(true, Ordering::Release);
        TransportMetrics::set_online(true);

        let started = self.drain.start();
        tracing::info!(cloud = %cloud, drain_started = started, "Cloud connected");
    }

    pub fn on_disconnected(&self, cloud: CloudType) {
        self.online.store(false, Ordering::Release);
        TransportMetrics::set_online(false);
        tracing::info!(cloud = %cloud, "Cloud disconnected");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

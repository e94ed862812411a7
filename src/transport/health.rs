//! Transport link health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

/// Link status as last observed by the connection monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// No probe has completed yet
    Unknown,
    /// Last probe succeeded
    Connected,
    /// Last probe failed, retrying with backoff
    Reconnecting,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Unknown => "unknown",
            LinkStatus::Connected => "connected",
            LinkStatus::Reconnecting => "reconnecting",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkStatus::Connected,
            2 => LinkStatus::Reconnecting,
            _ => LinkStatus::Unknown,
        }
    }
}

/// Link health tracker shared between the monitor and status endpoints
pub struct LinkHealth {
    status: AtomicU8,
    last_connected: AtomicI64,
    failed_probes: AtomicU32,
    total_reconnections: AtomicU32,
}

impl LinkHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(LinkStatus::Unknown as u8),
            last_connected: AtomicI64::new(0),
            failed_probes: AtomicU32::new(0),
            total_reconnections: AtomicU32::new(0),
        }
    }

    /// Record a successful probe. Returns true on a transition into `Connected`.
    pub fn set_connected(&self) -> bool {
        let previous = LinkStatus::from_u8(
            self.status
                .swap(LinkStatus::Connected as u8, Ordering::AcqRel),
        );
        self.last_connected
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Release);
        self.failed_probes.store(0, Ordering::Release);

        if previous == LinkStatus::Reconnecting {
            self.total_reconnections.fetch_add(1, Ordering::AcqRel);
        }
        previous != LinkStatus::Connected
    }

    /// Record a failed probe. Returns true on a transition out of `Connected`.
    pub fn set_reconnecting(&self) -> bool {
        let previous = LinkStatus::from_u8(
            self.status
                .swap(LinkStatus::Reconnecting as u8, Ordering::AcqRel),
        );
        self.failed_probes.fetch_add(1, Ordering::AcqRel);
        previous == LinkStatus::Connected
    }

    /// Get current status
    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.status() == LinkStatus::Connected
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> LinkHealthStats {
        LinkHealthStats {
            status: self.status(),
            last_connected_ms: self.last_connected.load(Ordering::Acquire),
            failed_probes: self.failed_probes.load(Ordering::Acquire),
            total_reconnections: self.total_reconnections.load(Ordering::Acquire),
        }
    }
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Link health statistics
#[derive(Debug, Clone, Serialize)]
pub struct LinkHealthStats {
    pub status: LinkStatus,
    pub last_connected_ms: i64,
    pub failed_probes: u32,
    pub total_reconnections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_transitions() {
        let health = LinkHealth::new();
        assert_eq!(health.status(), LinkStatus::Unknown);

        assert!(health.set_connected());
        assert!(!health.set_connected());
        assert!(health.is_connected());

        assert!(health.set_reconnecting());
        assert!(!health.set_reconnecting());
        assert_eq!(health.status(), LinkStatus::Reconnecting);
    }

    #[test]
    fn test_link_health_stats() {
        let health = LinkHealth::new();

        health.set_reconnecting();
        health.set_reconnecting();
        health.set_connected();

        let stats = health.stats();
        assert_eq!(stats.status, LinkStatus::Connected);
        assert_eq!(stats.total_reconnections, 1);
        assert_eq!(stats.failed_probes, 0); // Reset on connect
        assert!(stats.last_connected_ms > 0);
    }
}

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QueueSettings;
use crate::store::RecordId;

pub const DEFAULT_STORE_PATH: &str = "default.json";
pub const DEFAULT_MAX_COUNT: usize = 10;
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_PARSE_FAILURES: u32 = 5;
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5000;

/// Queue configuration, fixed once the queue is built.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Backing file of the durable store
    pub store_path: PathBuf,
    /// Maximum number of retained entries, always at least 1
    pub max_count: usize,
    /// Period of the drain timer
    pub drain_interval: Duration,
    /// Consecutive decode failures of the head entry before it is
    /// quarantined; 0 retries forever
    pub max_parse_failures: u32,
    /// Store receiving quarantined records; discarded when `None`
    pub dead_letter_path: Option<PathBuf>,
    /// Longest a publish may hold the queue before it counts as failed
    pub publish_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            max_count: DEFAULT_MAX_COUNT,
            drain_interval: Duration::from_millis(DEFAULT_DRAIN_INTERVAL_MS),
            max_parse_failures: DEFAULT_MAX_PARSE_FAILURES,
            dead_letter_path: None,
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MS),
        }
    }
}

impl QueueConfig {
    /// Build from raw settings, replacing unusable values with defaults.
    pub fn from_settings(settings: &QueueSettings) -> Self {
        let store_path = if settings.store_path.trim().is_empty() {
            PathBuf::from(DEFAULT_STORE_PATH)
        } else {
            PathBuf::from(&settings.store_path)
        };

        let max_count = if settings.max_count <= 0 {
            DEFAULT_MAX_COUNT
        } else {
            settings.max_count as usize
        };

        let drain_interval = if settings.drain_interval_ms == 0 {
            Duration::from_millis(DEFAULT_DRAIN_INTERVAL_MS)
        } else {
            Duration::from_millis(settings.drain_interval_ms)
        };

        let dead_letter_path = settings
            .dead_letter_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Self {
            store_path,
            max_count,
            drain_interval,
            max_parse_failures: settings.max_parse_failures,
            dead_letter_path,
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MS),
        }
    }

    /// Replace the publish time limit. Zero keeps the current one.
    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        if !publish_timeout.is_zero() {
            self.publish_timeout = publish_timeout;
        }
        self
    }
}

/// Encoding of a queued message inside a store item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QueueRecord {
    pub label: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
}

/// A message waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: RecordId,
    pub label: String,
    pub payload: String,
    pub queued_at: Option<DateTime<Utc>>,
}

/// What happened to a `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Published straight to the transport
    DeliveredNow,
    /// Stored for later delivery
    Queued(RecordId),
    /// Neither published nor stored
    Failed,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SendOutcome::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SendOutcome::DeliveredNow => "delivered",
            SendOutcome::Queued(_) => "queued",
            SendOutcome::Failed => "failed",
        }
    }
}

/// Result of a single drain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Head entry published and removed
    Published,
    /// Transport rejected the head entry; it stays queued
    PublishFailed,
    /// Nothing was delivered this tick (undecodable head, store error,
    /// or removal failed)
    Skipped,
    /// Queue is empty
    Idle,
    /// Transport is offline
    Offline,
}

impl TickOutcome {
    /// Whether the drain episode ends with this outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TickOutcome::Idle | TickOutcome::Offline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TickOutcome::Published => "published",
            TickOutcome::PublishFailed => "publish_failed",
            TickOutcome::Skipped => "skipped",
            TickOutcome::Idle => "idle",
            TickOutcome::Offline => "offline",
        }
    }
}

/// Queue statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub max_count: usize,
    pub online: bool,
    pub draining: bool,
    pub store: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> QueueSettings {
        QueueSettings::default()
    }

    #[test]
    fn test_from_settings_defaults() {
        let config = QueueConfig::from_settings(&settings());
        assert_eq!(config.store_path, PathBuf::from("default.json"));
        assert_eq!(config.max_count, 10);
        assert_eq!(config.drain_interval, Duration::from_millis(1000));
        assert_eq!(config.max_parse_failures, 5);
        assert!(config.dead_letter_path.is_none());
    }

    #[test]
    fn test_from_settings_normalizes_invalid_values() {
        let config = QueueConfig::from_settings(&QueueSettings {
            store_path: "  ".to_string(),
            max_count: -3,
            drain_interval_ms: 0,
            max_parse_failures: 0,
            dead_letter_path: Some(String::new()),
        });
        assert_eq!(config.store_path, PathBuf::from("default.json"));
        assert_eq!(config.max_count, 10);
        assert_eq!(config.drain_interval, Duration::from_millis(1000));
        assert_eq!(config.max_parse_failures, 0);
        assert!(config.dead_letter_path.is_none());

        let config = QueueConfig::from_settings(&QueueSettings {
            max_count: 0,
            ..settings()
        });
        assert_eq!(config.max_count, 10);
    }

    #[test]
    fn test_from_settings_keeps_valid_values() {
        let config = QueueConfig::from_settings(&QueueSettings {
            store_path: "/data/spool.json".to_string(),
            max_count: 3,
            drain_interval_ms: 100,
            max_parse_failures: 2,
            dead_letter_path: Some("/data/dead.json".to_string()),
        });
        assert_eq!(config.store_path, PathBuf::from("/data/spool.json"));
        assert_eq!(config.max_count, 3);
        assert_eq!(config.drain_interval, Duration::from_millis(100));
        assert_eq!(config.dead_letter_path, Some(PathBuf::from("/data/dead.json")));
    }

    #[test]
    fn test_publish_timeout_override() {
        let config = QueueConfig::from_settings(&settings());
        assert_eq!(config.publish_timeout, Duration::from_millis(5000));

        let config = config.with_publish_timeout(Duration::from_millis(250));
        assert_eq!(config.publish_timeout, Duration::from_millis(250));

        let config = config.with_publish_timeout(Duration::ZERO);
        assert_eq!(config.publish_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_record_encoding() {
        let record = QueueRecord {
            label: "sensors".to_string(),
            data: "{\"t\":21}".to_string(),
            queued_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"label":"sensors","data":"{\"t\":21}"}"#);

        let decoded: QueueRecord = serde_json::from_str(r#"{"label":"a","data":"b"}"#).unwrap();
        assert_eq!(decoded.label, "a");
        assert!(decoded.queued_at.is_none());
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(SendOutcome::DeliveredNow.is_success());
        assert!(SendOutcome::Queued(RecordId::from("x")).is_success());
        assert!(!SendOutcome::Failed.is_success());

        assert!(TickOutcome::Idle.is_terminal());
        assert!(TickOutcome::Offline.is_terminal());
        assert!(!TickOutcome::PublishFailed.is_terminal());
        assert_eq!(TickOutcome::PublishFailed.as_str(), "publish_failed");
    }
}

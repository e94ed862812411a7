use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Durable queue settings as read from configuration.
///
/// Values are normalized when the queue is built (see
/// `queue::QueueConfig::from_settings`).
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Location of the durable backing file
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Maximum number of retained entries (non-positive means default)
    #[serde(default = "default_max_count")]
    pub max_count: i64,
    /// Drain timer period in milliseconds
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Consecutive decode failures before the head entry is quarantined (0 = never)
    #[serde(default = "default_max_parse_failures")]
    pub max_parse_failures: u32,
    /// Where quarantined records are kept; discarded when unset
    #[serde(default)]
    pub dead_letter_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Transport backend: "redis" or "memory"
    #[serde(default = "default_transport_kind")]
    pub kind: String,
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prepended to every message label to form the channel name
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Connectivity probe interval while connected, in milliseconds
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// First retry delay after a failed probe, in milliseconds
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    /// Upper bound for the retry delay, in milliseconds
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    /// Longest a single publish may take, in milliseconds
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// Longest a connectivity probe may take, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Periodic device status reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    #[serde(default = "default_producer_enabled")]
    pub enabled: bool,
    #[serde(default = "default_producer_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_producer_label")]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_store_path() -> String {
    "default.json".to_string()
}

fn default_max_count() -> i64 {
    10
}

fn default_drain_interval_ms() -> u64 {
    1000
}

fn default_max_parse_failures() -> u32 {
    5
}

fn default_transport_kind() -> String {
    "redis".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_topic_prefix() -> String {
    "telemetry:".to_string()
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_retry_initial_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_producer_enabled() -> bool {
    true
}

fn default_producer_interval_ms() -> u64 {
    10_000
}

fn default_producer_label() -> String {
    "status".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "telemetry-spool".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("queue.store_path", default_store_path())?
            .set_default("queue.max_count", default_max_count())?
            .set_default("transport.kind", default_transport_kind())?
            .set_default("transport.url", default_redis_url())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SPOOL__QUEUE__MAX_COUNT, SPOOL__TRANSPORT__URL, ...
            .add_source(
                Environment::with_prefix("SPOOL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            max_count: default_max_count(),
            drain_interval_ms: default_drain_interval_ms(),
            max_parse_failures: default_max_parse_failures(),
            dead_letter_path: None,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            url: default_redis_url(),
            topic_prefix: default_topic_prefix(),
            probe_interval_ms: default_probe_interval_ms(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            publish_timeout_ms: default_publish_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl TransportConfig {
    /// Publish time limit; zero means the default.
    pub fn publish_timeout(&self) -> Duration {
        non_zero_ms(self.publish_timeout_ms, default_publish_timeout_ms())
    }

    /// Probe time limit; zero means the default.
    pub fn probe_timeout(&self) -> Duration {
        non_zero_ms(self.probe_timeout_ms, default_probe_timeout_ms())
    }
}

fn non_zero_ms(value: u64, default: u64) -> Duration {
    Duration::from_millis(if value == 0 { default } else { value })
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: default_producer_enabled(),
            interval_ms: default_producer_interval_ms(),
            label: default_producer_label(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let queue = QueueSettings::default();
        assert_eq!(queue.store_path, "default.json");
        assert_eq!(queue.max_count, 10);
        assert!(queue.dead_letter_path.is_none());

        let transport = TransportConfig::default();
        assert_eq!(transport.kind, "redis");
        assert_eq!(transport.topic_prefix, "telemetry:");
        assert_eq!(transport.publish_timeout(), Duration::from_secs(5));
        assert_eq!(transport.probe_timeout(), Duration::from_secs(3));

        let server = ServerConfig::default();
        assert!(!server.enabled);
        assert_eq!(server.port, 8090);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "queue": { "max_count": 3 },
            "transport": { "kind": "memory" }
        }))
        .unwrap();

        assert_eq!(settings.queue.max_count, 3);
        assert_eq!(settings.queue.store_path, "default.json");
        assert_eq!(settings.queue.drain_interval_ms, 1000);
        assert_eq!(settings.transport.kind, "memory");
        assert_eq!(settings.transport.publish_timeout_ms, 5000);
        assert_eq!(settings.producer.label, "status");
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_zero_timeouts_use_defaults() {
        let transport = TransportConfig {
            publish_timeout_ms: 0,
            probe_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(transport.publish_timeout(), Duration::from_millis(5000));
        assert_eq!(transport.probe_timeout(), Duration::from_millis(250));
    }
}

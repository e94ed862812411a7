//! Outbound message transport.
//!
//! The queue publishes through a [`Transport`] and learns about link state
//! from [`TransportEvent`]s delivered on a broadcast channel:
//!
//! - `RedisTransport`: Redis pub/sub, one channel per label
//! - `MemoryTransport`: in-process, records every publish
//!
//! Use `create_transport()` to build the backend named in configuration and
//! `ConnectionMonitor` to turn probe results into lifecycle events.

mod backoff;
mod factory;
mod health;
pub mod memory;
mod monitor;
pub mod redis_transport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use factory::create_transport;
pub use health::{LinkHealth, LinkHealthStats, LinkStatus};
pub use memory::{MemoryTransport, PublishedMessage};
pub use monitor::ConnectionMonitor;
pub use redis_transport::RedisTransport;

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Backend that raised a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudType {
    Mqtt,
    Dash,
    Aws,
    Azure,
    Gcp,
    Watson,
    Redis,
    Memory,
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloudType::Mqtt => "MQTT",
            CloudType::Dash => "DASH",
            CloudType::Aws => "AWS",
            CloudType::Azure => "AZURE",
            CloudType::Gcp => "GCP",
            CloudType::Watson => "WATSON",
            CloudType::Redis => "REDIS",
            CloudType::Memory => "MEMORY",
        };
        f.write_str(name)
    }
}

/// Transport lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(CloudType),
    Disconnected(CloudType),
}

/// Errors that can occur when publishing.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link is down
    #[error("Transport not connected: {0}")]
    NotConnected(String),

    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The transport did not answer in time
    #[error("Transport timed out after {0:?}")]
    Timeout(Duration),
}

/// Publish-by-label transport.
///
/// A successful `publish` means the message was handed to the link, not that
/// the remote end acknowledged it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend identifier.
    fn kind(&self) -> CloudType;

    /// Publish `payload` under `label`.
    async fn publish(
        &self,
        label: &str,
        payload: &str,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError>;

    /// Check that the link is usable.
    async fn ping(&self) -> Result<(), TransportError>;
}

/// Publish through `transport`, giving up after `limit`.
pub async fn publish_within(
    transport: &dyn Transport,
    limit: Duration,
    label: &str,
    payload: &str,
    qos: Qos,
    retain: bool,
) -> Result<(), TransportError> {
    timeout(limit, transport.publish(label, payload, qos, retain))
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

/// Ping `transport`, giving up after `limit`.
pub async fn ping_within(transport: &dyn Transport, limit: Duration) -> Result<(), TransportError> {
    timeout(limit, transport.ping())
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

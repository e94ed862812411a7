//! Transport factory

use std::sync::Arc;

use crate::config::TransportConfig;

use super::memory::MemoryTransport;
use super::redis_transport::RedisTransport;
use super::Transport;

/// Create a transport based on configuration.
///
/// - `"redis"`: a `RedisTransport` for `config.url`
/// - `"memory"`: a `MemoryTransport`
///
/// An unknown kind or an unusable Redis URL falls back to memory with a
/// warning, so the device keeps queueing instead of failing to start.
pub fn create_transport(config: &TransportConfig) -> Arc<dyn Transport> {
    match config.kind.as_str() {
        "redis" => match RedisTransport::new(config) {
            Ok(transport) => {
                tracing::info!(
                    transport = "redis",
                    url = %config.url,
                    topic_prefix = %config.topic_prefix,
                    "Creating Redis transport"
                );
                Arc::new(transport)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    url = %config.url,
                    "Invalid Redis transport configuration, falling back to memory"
                );
                Arc::new(MemoryTransport::new())
            }
        },
        "memory" => {
            tracing::info!(transport = "memory", "Creating memory transport");
            Arc::new(MemoryTransport::new())
        }
        other => {
            tracing::warn!(
                transport = %other,
                "Unknown transport kind, falling back to memory"
            );
            Arc::new(MemoryTransport::new())
        }
    }
}

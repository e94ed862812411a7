//! Redis pub/sub transport.
//!
//! Each message is published with `PUBLISH <topic_prefix><label> <payload>`
//! over a shared multiplexed connection. Redis pub/sub has no delivery
//! acknowledgement, so every QoS level degrades to handing the message to
//! the server.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::config::TransportConfig;

use super::{CloudType, Qos, Transport, TransportError};

pub struct RedisTransport {
    /// Redis client for creating connections
    client: Client,

    /// Multiplexed connection (shared across tasks)
    connection: RwLock<Option<MultiplexedConnection>>,

    topic_prefix: String,
    url: String,

    /// Limit for connecting and for each command
    command_timeout: Duration,
}

impl RedisTransport {
    /// Create a transport for the configured URL. No connection is made yet.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            topic_prefix: config.topic_prefix.clone(),
            url: config.url.clone(),
            command_timeout: config.publish_timeout(),
        })
    }

    /// Channel name a label is published on.
    pub fn channel_for(&self, label: &str) -> String {
        format!("{}{}", self.topic_prefix, label)
    }

    /// Get the Redis URL (for debugging).
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, TransportError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // Double-check in case another task connected while we waited
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        let conn = timeout(
            self.command_timeout,
            self.client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.command_timeout))??;
        *conn_guard = Some(conn.clone());
        tracing::info!(url = %self.url, "Redis transport connection established");
        Ok(conn)
    }

    /// Forget the cached connection after a link-level failure.
    async fn reset_on_link_error(&self, error: &RedisError) {
        if error.is_connection_dropped() || error.is_io_error() || error.is_timeout() {
            self.reset_connection().await;
        }
    }

    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
    }

    /// Run `command` with the command timeout, dropping a connection that
    /// stopped answering.
    async fn run<T, F>(&self, command: F) -> Result<T, TransportError>
    where
        F: std::future::Future<Output = Result<T, RedisError>>,
    {
        match timeout(self.command_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.reset_on_link_error(&e).await;
                Err(TransportError::Redis(e))
            }
            Err(_) => {
                tracing::warn!(
                    url = %self.url,
                    timeout_ms = self.command_timeout.as_millis() as u64,
                    "Redis command timed out, dropping connection"
                );
                self.reset_connection().await;
                Err(TransportError::Timeout(self.command_timeout))
            }
        }
    }
}

#[async_trait]
impl Transport for RedisTransport {
    fn kind(&self) -> CloudType {
        CloudType::Redis
    }

    async fn publish(
        &self,
        label: &str,
        payload: &str,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        let mut conn = self.get_connection().await?;
        let channel = self.channel_for(label);

        let receivers: i64 = self.run(conn.publish(&channel, payload)).await?;
        tracing::trace!(
            channel = %channel,
            receivers = receivers,
            qos = ?qos,
            retain = retain,
            "Published to Redis"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let mut conn = self.get_connection().await?;
        let _: String = self
            .run(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_naming() {
        let config = TransportConfig {
            topic_prefix: "devices/abc/".to_string(),
            ..Default::default()
        };
        let transport = RedisTransport::new(&config).unwrap();
        assert_eq!(transport.channel_for("events"), "devices/abc/events");
        assert_eq!(transport.url(), "redis://localhost:6379");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = TransportConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(RedisTransport::new(&config).is_err());
    }
}

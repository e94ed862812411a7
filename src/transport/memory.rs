//! In-process transport.
//!
//! Keeps every published message in memory. The link can be taken down and
//! brought back with [`MemoryTransport::set_available`], which makes it
//! useful both as a local sink and for exercising the offline path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CloudType, Qos, Transport, TransportError};

/// A message handed to the memory transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub label: String,
    pub payload: String,
    pub qos: Qos,
    pub retain: bool,
}

pub struct MemoryTransport {
    available: AtomicBool,
    published: Mutex<Vec<PublishedMessage>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Bring the link up or down.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Labels and payloads published so far, oldest first.
    pub fn payloads(&self) -> Vec<(String, String)> {
        self.published()
            .into_iter()
            .map(|m| (m.label, m.payload))
            .collect()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> CloudType {
        CloudType::Memory
    }

    async fn publish(
        &self,
        label: &str,
        payload: &str,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::NotConnected("memory link is down".to_string()));
        }

        let message = PublishedMessage {
            label: label.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        };
        if let Ok(mut guard) = self.published.lock() {
            guard.push(message);
        }

        tracing::debug!(label = %label, bytes = payload.len(), "Published to memory transport");
        Ok(())
    }

    async fn ping(&self) -> Result<(), TransportError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(TransportError::NotConnected("memory link is down".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_records_message() {
        let transport = MemoryTransport::new();
        transport
            .publish("sensors", "{\"t\":21}", Qos::AtLeastOnce, false)
            .await
            .unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].label, "sensors");
        assert_eq!(published[0].qos, Qos::AtLeastOnce);
        assert!(!published[0].retain);
    }

    #[tokio::test]
    async fn test_unavailable_link_rejects_publish() {
        let transport = MemoryTransport::new();
        transport.set_available(false);

        let result = transport.publish("a", "b", Qos::AtLeastOnce, false).await;
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
        assert!(transport.ping().await.is_err());
        assert_eq!(transport.published_count(), 0);

        transport.set_available(true);
        assert!(transport.ping().await.is_ok());
    }

    #[test]
    fn test_ping_follows_availability() {
        let transport = MemoryTransport::default();
        tokio_test::assert_ok!(tokio_test::block_on(transport.ping()));

        transport.set_available(false);
        tokio_test::assert_err!(tokio_test::block_on(transport.ping()));
        assert!(!transport.is_available());
    }
}

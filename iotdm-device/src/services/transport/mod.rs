//! The publish/subscribe seam the engine talks through.

#[cfg(any(test, feature = "mock"))]
mod memory;
mod mqtt;

#[cfg(any(test, feature = "mock"))]
pub use memory::{MemoryTransport, Published};
pub use mqtt::MqttTransport;

use async_trait::async_trait;
use iotdm_api::QoS;

use crate::errors::TransportError;

/// A message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Connection-like collaborator. Delivery of inbound messages is the
/// implementation's business; it hands them to
/// [`ManagedDevice::dispatch`](crate::ManagedDevice::dispatch).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError>;

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;
}

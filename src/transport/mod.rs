//! Transport layer for broker communication.

pub mod mqtt;

use async_trait::async_trait;

pub use mqtt::{ConnectionState, LinkStatus, MqttError, MqttLink};

/// A message received from the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Outbound broker seam. The production implementation is [`MqttLink`];
/// tests substitute a capturing mock.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError>;
    async fn subscribe(&self, topic: &str) -> Result<(), MqttError>;
}

#[async_trait]
impl Broker for MqttLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError> {
        MqttLink::publish(self, topic, payload, retain).await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        MqttLink::subscribe(self, topic).await
    }
}

/// Finish a connect attempt whose state machine has settled: failure states
/// map to their errors, a connected link registers every control
/// subscription before the caller unblocks.
pub async fn complete_connect<B: Broker + ?Sized>(
    broker: &B,
    settled: LinkStatus,
    subscriptions: &[String],
) -> Result<(), MqttError> {
    match settled.state {
        ConnectionState::Connected => {
            for topic in subscriptions {
                broker.subscribe(topic).await?;
            }
            Ok(())
        }
        ConnectionState::Unreachable => Err(MqttError::Unreachable),
        _ => Err(MqttError::Rejected {
            code: settled.last_error_code,
        }),
    }
}

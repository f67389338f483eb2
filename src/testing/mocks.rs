//! Mock implementations for test scenarios that must not touch a real broker.

use crate::transport::mqtt::ConnectionState;
use crate::transport::{Broker, MqttError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// One captured publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// In-memory [`Broker`] that records every publish and subscribe, optionally
/// refusing all of them to exercise failure paths.
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    published: Arc<Mutex<Vec<CapturedPublish>>>,
    subscribed: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker where every call fails as if the link were down.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of everything published so far.
    pub fn published(&self) -> Vec<CapturedPublish> {
        self.published.lock().unwrap().clone()
    }

    /// Snapshot of every subscribed topic pattern, in registration order.
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    fn down_error(&self) -> MqttError {
        MqttError::NotConnected {
            state: ConnectionState::Unreachable,
        }
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError> {
        if self.fail {
            return Err(self.down_error());
        }
        self.published.lock().unwrap().push(CapturedPublish {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        if self.fail {
            return Err(self.down_error());
        }
        self.subscribed.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

//! MQTT transport, split into a pure connection state machine and the
//! impure client that drives it against a real broker.

pub mod client;
pub mod connection;

pub use client::MqttLink;
pub use connection::{
    rejection_message, transition, ConnectionState, LinkAction, LinkEvent, LinkStatus, MqttError,
};

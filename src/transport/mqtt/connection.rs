//! Pure connection state management.
//!
//! The connection-establishment state machine lives here as data and pure
//! transitions; the network driver in [`super::client`] feeds it events and
//! executes the actions it returns. Exactly one [`LinkStatus`] is live per
//! epoch, behind a single watch channel whose sender side is the only writer.

use crate::config::GatewayConfig;
use rumqttc::{ConnectReturnCode, MqttOptions};
use std::time::Duration;
use thiserror::Error;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection requested, or cleanly disconnected.
    Off,
    /// First attempt, broker located through a DNS service record.
    ConnectingViaServiceRecord,
    /// Direct host:port attempt.
    ConnectingViaHost,
    Connected,
    /// Broker answered the handshake with a reject code.
    ProtocolRejected,
    /// Host unresolvable, or the connection attempt(s) failed.
    Unreachable,
}

/// The state cell shared between the caller and the network driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Broker-supplied reason code; meaningful only in `ProtocolRejected` and
    /// `Unreachable`.
    pub last_error_code: u8,
}

impl LinkStatus {
    pub const OFF: Self = Self {
        state: ConnectionState::Off,
        last_error_code: 0,
    };

    /// Whether `connect()` may stop blocking: the machine reached one
    /// well-defined outcome.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected
                | ConnectionState::ProtocolRejected
                | ConnectionState::Unreachable
        )
    }
}

/// Events delivered by the network driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake answered; `code` 0 is acceptance, anything else a reject.
    ConnAck { code: u8 },
    /// Connection dropped; `code` 0 is a clean client-requested disconnect.
    Disconnect { code: u8 },
}

/// Follow-up the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    /// The broker rejected us; tear the socket down.
    RequestDisconnect,
    /// Reissue the connect to the configured host on the conventional MQTT
    /// port. Happens at most once per epoch.
    FallBackToHost,
}

/// Apply one event to the state machine.
pub fn transition(current: LinkStatus, event: LinkEvent) -> (LinkStatus, LinkAction) {
    use ConnectionState::*;

    // Settled failures absorb every further callback.
    if matches!(current.state, ProtocolRejected | Unreachable) {
        return (current, LinkAction::None);
    }

    match (current.state, event) {
        (ConnectingViaServiceRecord | ConnectingViaHost, LinkEvent::ConnAck { code: 0 }) => (
            LinkStatus {
                state: Connected,
                last_error_code: 0,
            },
            LinkAction::None,
        ),
        (ConnectingViaServiceRecord | ConnectingViaHost, LinkEvent::ConnAck { code }) => (
            LinkStatus {
                state: ProtocolRejected,
                last_error_code: code,
            },
            LinkAction::RequestDisconnect,
        ),
        // The one built-in retry: service-record addressing failed, try the
        // host directly. Never loops back.
        (ConnectingViaServiceRecord, LinkEvent::Disconnect { .. }) => (
            LinkStatus {
                state: ConnectingViaHost,
                last_error_code: current.last_error_code,
            },
            LinkAction::FallBackToHost,
        ),
        (ConnectingViaHost, LinkEvent::Disconnect { code }) => (
            LinkStatus {
                state: Unreachable,
                last_error_code: code,
            },
            LinkAction::None,
        ),
        (Connected | Off, LinkEvent::Disconnect { code: 0 }) => (
            LinkStatus {
                state: Off,
                last_error_code: 0,
            },
            LinkAction::None,
        ),
        (Connected | Off, LinkEvent::Disconnect { code }) => (
            LinkStatus {
                state: Unreachable,
                last_error_code: code,
            },
            LinkAction::None,
        ),
        // A stray ConnAck outside a connecting state carries no information.
        (Connected | Off, LinkEvent::ConnAck { .. }) => (current, LinkAction::None),
        (ProtocolRejected | Unreachable, _) => (current, LinkAction::None),
    }
}

/// Human-readable reject reason for the broker-supplied code.
pub fn rejection_message(code: u8) -> String {
    match code {
        1 => "unacceptable protocol version".to_string(),
        2 => "identifier rejected".to_string(),
        3 => "broker unavailable".to_string(),
        other => format!("reserved error({other})"),
    }
}

/// Numeric form of the v3.1.1 connect return code.
pub fn return_code_byte(code: ConnectReturnCode) -> u8 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}

/// MQTT transport errors.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("host unresolvable or connection failed")]
    Unreachable,
    #[error("{}", rejection_message(*.code))]
    Rejected { code: u8 },
    #[error("not connected (state {state:?})")]
    NotConnected { state: ConnectionState },
    #[error("publish failed: {0}")]
    Publish(#[source] rumqttc::ClientError),
    #[error("subscribe failed: {0}")]
    Subscribe(#[source] rumqttc::ClientError),
}

/// Build client options for one connect attempt.
pub fn configure_mqtt_options(config: &GatewayConfig, host: &str, port: u16) -> MqttOptions {
    let client_id = format!("meter2mqtt-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive));
    // Credentials are passthrough: set only when a username is configured.
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    options
}

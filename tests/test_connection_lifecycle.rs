//! Connection lifecycle tests against the pure state machine.
//!
//! The full connect sequences are expressed as event streams fed through
//! `transition`, so the contracts hold without a broker on the other end.

use meter2mqtt::testing::MockBroker;
use meter2mqtt::translator::Translator;
use meter2mqtt::transport::complete_connect;
use meter2mqtt::transport::mqtt::{
    rejection_message, transition, ConnectionState, LinkAction, LinkEvent, LinkStatus, MqttError,
};

fn run_events(start: ConnectionState, events: &[LinkEvent]) -> (LinkStatus, Vec<LinkAction>) {
    let mut status = LinkStatus {
        state: start,
        last_error_code: 0,
    };
    let mut actions = Vec::new();
    for event in events {
        let (next, action) = transition(status, *event);
        status = next;
        actions.push(action);
    }
    (status, actions)
}

#[test]
fn direct_connect_accept_then_clean_shutdown() {
    let (status, actions) = run_events(
        ConnectionState::ConnectingViaHost,
        &[
            LinkEvent::ConnAck { code: 0 },
            LinkEvent::Disconnect { code: 0 },
        ],
    );

    assert_eq!(status.state, ConnectionState::Off);
    assert_eq!(status.last_error_code, 0);
    assert_eq!(actions, vec![LinkAction::None, LinkAction::None]);
}

#[test]
fn unknown_host_falls_back_once_then_settles_unreachable() {
    // Service-record resolution fails, the direct-host retry fails too.
    let (status, actions) = run_events(
        ConnectionState::ConnectingViaServiceRecord,
        &[
            LinkEvent::Disconnect { code: 7 },
            LinkEvent::Disconnect { code: 7 },
        ],
    );

    assert_eq!(status.state, ConnectionState::Unreachable);
    assert_eq!(actions[0], LinkAction::FallBackToHost);
    // The second failure settles; it must not request another fallback.
    assert_eq!(actions[1], LinkAction::None);
}

#[test]
fn fallback_target_can_still_connect() {
    let (status, actions) = run_events(
        ConnectionState::ConnectingViaServiceRecord,
        &[
            LinkEvent::Disconnect { code: 7 },
            LinkEvent::ConnAck { code: 0 },
        ],
    );

    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(actions[0], LinkAction::FallBackToHost);
}

#[test]
fn broker_rejection_settles_and_requests_disconnect() {
    let (status, actions) = run_events(
        ConnectionState::ConnectingViaHost,
        &[LinkEvent::ConnAck { code: 2 }],
    );

    assert_eq!(status.state, ConnectionState::ProtocolRejected);
    assert_eq!(status.last_error_code, 2);
    assert_eq!(actions[0], LinkAction::RequestDisconnect);
}

#[test]
fn settled_failure_absorbs_late_events() {
    let (status, actions) = run_events(
        ConnectionState::ConnectingViaHost,
        &[
            LinkEvent::ConnAck { code: 1 },
            // Socket teardown callbacks arriving after settlement.
            LinkEvent::Disconnect { code: 0 },
            LinkEvent::ConnAck { code: 0 },
        ],
    );

    assert_eq!(status.state, ConnectionState::ProtocolRejected);
    assert_eq!(status.last_error_code, 1);
    assert_eq!(actions[1], LinkAction::None);
    assert_eq!(actions[2], LinkAction::None);
}

#[test]
fn connected_link_dropping_becomes_unreachable() {
    let (status, _) = run_events(
        ConnectionState::ConnectingViaHost,
        &[
            LinkEvent::ConnAck { code: 0 },
            LinkEvent::Disconnect { code: 7 },
        ],
    );

    assert_eq!(status.state, ConnectionState::Unreachable);
    assert_eq!(status.last_error_code, 7);
}

#[test]
fn fallback_happens_at_most_once_for_any_event_stream() {
    // Drive every two-event combination and count fallbacks.
    let events = [
        LinkEvent::ConnAck { code: 0 },
        LinkEvent::ConnAck { code: 2 },
        LinkEvent::Disconnect { code: 0 },
        LinkEvent::Disconnect { code: 7 },
    ];

    for first in events {
        for second in events {
            for third in events {
                let (_, actions) = run_events(
                    ConnectionState::ConnectingViaServiceRecord,
                    &[first, second, third],
                );
                let fallbacks = actions
                    .iter()
                    .filter(|a| **a == LinkAction::FallBackToHost)
                    .count();
                assert!(
                    fallbacks <= 1,
                    "more than one fallback for {first:?}, {second:?}, {third:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn connected_settlement_registers_exactly_two_subscriptions() {
    let broker = MockBroker::new();
    let translator = Translator::new("/home/meterDigitizer", "{{sensorId}}");
    let settled = LinkStatus {
        state: ConnectionState::Connected,
        last_error_code: 0,
    };

    complete_connect(&broker, settled, &translator.control_subscriptions())
        .await
        .unwrap();

    assert_eq!(
        broker.subscribed(),
        vec![
            "/home/meterDigitizer/control".to_string(),
            "/home/meterDigitizer/+/control".to_string(),
        ]
    );
}

#[tokio::test]
async fn failed_settlements_subscribe_nothing() {
    let broker = MockBroker::new();
    let subscriptions = vec!["/home/meterDigitizer/control".to_string()];

    let unreachable = LinkStatus {
        state: ConnectionState::Unreachable,
        last_error_code: 7,
    };
    let err = complete_connect(&broker, unreachable, &subscriptions)
        .await
        .unwrap_err();
    assert!(matches!(err, MqttError::Unreachable));

    let rejected = LinkStatus {
        state: ConnectionState::ProtocolRejected,
        last_error_code: 2,
    };
    let err = complete_connect(&broker, rejected, &subscriptions)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "identifier rejected");

    assert!(broker.subscribed().is_empty());
}

#[test]
fn user_facing_error_messages_match_the_exit_contract() {
    assert_eq!(
        MqttError::Unreachable.to_string(),
        "host unresolvable or connection failed"
    );
    assert_eq!(
        MqttError::Rejected { code: 1 }.to_string(),
        "unacceptable protocol version"
    );
    assert_eq!(
        MqttError::Rejected { code: 2 }.to_string(),
        "identifier rejected"
    );
    assert_eq!(
        MqttError::Rejected { code: 3 }.to_string(),
        "broker unavailable"
    );
    assert_eq!(rejection_message(9), "reserved error(9)");
}

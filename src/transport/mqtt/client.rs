//! Impure MQTT link: socket ownership and the network driver task.
//!
//! [`MqttLink`] wraps a rumqttc [`AsyncClient`] plus a driver task that polls
//! the rumqttc event loop. The driver is the single writer of the shared
//! [`LinkStatus`] watch channel; `connect()` blocks on that channel until the
//! state machine settles. Teardown is synchronous: the driver is signalled,
//! the broker disconnect is requested, and the task is joined before the
//! client handle is dropped.

use super::connection::{
    configure_mqtt_options, return_code_byte, transition, ConnectionState, LinkAction, LinkEvent,
    LinkStatus, MqttError,
};
use crate::config::{GatewayConfig, MQTT_DEFAULT_PORT};
use crate::error::GatewayResult;
use crate::transport::{complete_connect, InboundMessage};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Packet, QoS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reason code recorded for disconnects the broker never explained
/// (socket-level failures, resolution errors).
const CODE_CONNECTION_LOST: u8 = 7;

/// Capacity of the inbound message channel toward the event loop.
const INBOUND_CHANNEL_CAPACITY: usize = 32;

/// MQTT connection manager for one epoch.
pub struct MqttLink {
    config: GatewayConfig,
    client: Arc<Mutex<Option<AsyncClient>>>,
    status_tx: watch::Sender<LinkStatus>,
    status_rx: watch::Receiver<LinkStatus>,
    shutdown_tx: watch::Sender<bool>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    driver: Option<JoinHandle<()>>,
}

impl MqttLink {
    /// Create an unconnected link. The returned receiver yields broker
    /// messages once connected; it is consumed by the epoch's event loop.
    pub fn new(config: GatewayConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (status_tx, status_rx) = watch::channel(LinkStatus::OFF);
        let (shutdown_tx, _) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        (
            Self {
                config,
                client: Arc::new(Mutex::new(None)),
                status_tx,
                status_rx,
                shutdown_tx,
                inbound_tx,
                driver: None,
            },
            inbound_rx,
        )
    }

    /// Current state cell contents.
    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    /// Bring the link from `Off` to a settled state, blocking the caller
    /// until settlement. On success the given topic patterns are subscribed
    /// before this returns; on failure the error classifies the outcome.
    ///
    /// There is no internal timeout: every rumqttc failure path surfaces an
    /// event the state machine classifies, so settlement always occurs.
    pub async fn connect(&mut self, subscriptions: &[String]) -> GatewayResult<()> {
        let (initial, host, port) = self.select_target().await;
        self.status_tx.send_replace(LinkStatus {
            state: initial,
            last_error_code: 0,
        });

        let options = configure_mqtt_options(&self.config, &host, port);
        let (client, event_loop) = AsyncClient::new(options, 10);
        *self.client.lock().await = Some(client);

        let shutdown_rx = self.shutdown_tx.subscribe();
        self.driver = Some(tokio::spawn(drive(
            event_loop,
            self.client.clone(),
            self.status_tx.clone(),
            shutdown_rx,
            self.inbound_tx.clone(),
            self.config.clone(),
        )));

        let mut status_rx = self.status_rx.clone();
        let settled = *status_rx
            .wait_for(LinkStatus::is_settled)
            .await
            .map_err(|_| MqttError::Unreachable)?;

        complete_connect(self, settled, subscriptions).await?;
        Ok(())
    }

    /// Subscribe at-most-once on the live client.
    pub async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(MqttError::NotConnected {
            state: self.status().state,
        })?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(MqttError::Subscribe)?;
        info!(topic, "subscribed");
        Ok(())
    }

    /// Pick the first connect target: direct host when a port is configured,
    /// otherwise the DNS service record for the host. A failed service-record
    /// resolution consumes the one fallback transition immediately.
    async fn select_target(&self) -> (ConnectionState, String, u16) {
        if let Some(port) = self.config.port {
            return (ConnectionState::ConnectingViaHost, self.config.host.clone(), port);
        }

        match resolve_service_record(&self.config.host).await {
            Ok(addr) => (
                ConnectionState::ConnectingViaServiceRecord,
                addr.ip().to_string(),
                addr.port(),
            ),
            Err(e) => {
                warn!(host = %self.config.host, error = %e,
                    "service record resolution failed, falling back to direct host");
                (
                    ConnectionState::ConnectingViaHost,
                    self.config.host.clone(),
                    MQTT_DEFAULT_PORT,
                )
            }
        }
    }

    /// Publish at-most-once. Fails when the link is not in `Connected`.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError> {
        let status = self.status();
        if status.state != ConnectionState::Connected {
            return Err(MqttError::NotConnected { state: status.state });
        }

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(MqttError::NotConnected { state: status.state })?;
        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(MqttError::Publish)
    }

    /// Tear the link down: signal the driver, request the broker disconnect,
    /// and join the driver before the client handle is released.
    pub async fn disconnect(&mut self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(client) = self.client.lock().await.as_ref() {
            let _ = client.disconnect().await;
        }

        if let Some(handle) = self.driver.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(_) => debug!("mqtt driver stopped"),
                Err(_) => warn!("mqtt driver did not stop in time, aborting"),
            }
        }

        *self.client.lock().await = None;
        self.status_tx.send_replace(LinkStatus::OFF);
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        // Graceful teardown happens in disconnect(); this only covers the
        // error paths that unwind before it runs.
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.driver.take() {
            handle.abort();
        }
    }
}

/// Resolve the conventional MQTT service name for `host`.
async fn resolve_service_record(host: &str) -> std::io::Result<SocketAddr> {
    let service = format!("_mqtt._tcp.{host}");
    let mut addrs = tokio::net::lookup_host((service.as_str(), MQTT_DEFAULT_PORT)).await?;
    addrs.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no address records")
    })
}

/// Network driver: polls the rumqttc event loop, feeds the state machine and
/// executes its actions. Exits on shutdown signal or on a settled failure;
/// keeps running while connected to deliver inbound messages.
async fn drive(
    mut event_loop: EventLoop,
    client: Arc<Mutex<Option<AsyncClient>>>,
    status_tx: watch::Sender<LinkStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    config: GatewayConfig,
) {
    loop {
        let polled = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("mqtt driver shutting down");
                    return;
                }
                continue;
            }
            polled = event_loop.poll() => polled,
        };

        let event = match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => Some(LinkEvent::ConnAck {
                code: return_code_byte(ack.code),
            }),
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(message).await.is_err() {
                    debug!("inbound channel closed, dropping message");
                }
                None
            }
            Ok(_) => None,
            Err(ConnectionError::ConnectionRefused(code)) => Some(LinkEvent::ConnAck {
                code: return_code_byte(code),
            }),
            Err(e) => {
                debug!(error = %e, "mqtt network failure");
                Some(LinkEvent::Disconnect {
                    code: CODE_CONNECTION_LOST,
                })
            }
        };

        let Some(event) = event else { continue };

        let current = *status_tx.borrow();
        let (next, action) = transition(current, event);
        if next != current {
            info!(from = ?current.state, to = ?next.state, code = next.last_error_code,
                "connection state change");
            status_tx.send_replace(next);
        }

        match action {
            LinkAction::None => {}
            LinkAction::RequestDisconnect => {
                if let Some(client) = client.lock().await.as_ref() {
                    let _ = client.disconnect().await;
                }
            }
            LinkAction::FallBackToHost => {
                info!(host = %config.host, port = MQTT_DEFAULT_PORT,
                    "reissuing connect to host on conventional port");
                let options = configure_mqtt_options(&config, &config.host, MQTT_DEFAULT_PORT);
                let (new_client, new_event_loop) = AsyncClient::new(options, 10);
                event_loop = new_event_loop;
                *client.lock().await = Some(new_client);
            }
        }

        if matches!(
            next.state,
            ConnectionState::ProtocolRejected | ConnectionState::Unreachable
        ) {
            debug!("mqtt driver stopping on settled failure");
            return;
        }
    }
}

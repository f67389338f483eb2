//! One gateway epoch: a single bring-up of device, signals and broker link,
//! its event loop, and its teardown. Reloading means ending the epoch and
//! starting a new one from freshly read configuration.

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::gateway::signals::{SignalAction, SignalMonitor};
use crate::serial::SerialDevice;
use crate::translator::{ControlCommand, Translator};
use crate::transport::{Broker, InboundMessage, MqttLink};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// All resources held between one bring-up and the matching teardown. The
/// signal monitor is deliberately not part of this: it lives for the whole
/// process, so a signal arriving between epochs stays pending instead of
/// being lost with a dropped listener.
pub struct Epoch {
    serial: SerialDevice,
    link: MqttLink,
    inbound_rx: mpsc::Receiver<InboundMessage>,
    translator: Translator,
}

impl Epoch {
    /// Bring everything up in dependency order: device first, then the
    /// broker link. Any failure propagates and the partially constructed
    /// pieces unwind through their Drop impls.
    pub async fn bring_up(config: GatewayConfig) -> GatewayResult<Self> {
        let serial = SerialDevice::open(&config)?;

        let translator = Translator::new(&config.device_topic, &config.sensor_topic);
        let (mut link, inbound_rx) = MqttLink::new(config);
        link.connect(&translator.control_subscriptions()).await?;
        info!("gateway up");

        Ok(Self {
            serial,
            link,
            inbound_rx,
            translator,
        })
    }

    /// Event loop. Returns `true` when a reload was requested, `false` on a
    /// clean quit; device errors and closed channels propagate as fatal.
    pub async fn run(&mut self, signals: &mut SignalMonitor) -> GatewayResult<bool> {
        loop {
            tokio::select! {
                action = signals.recv() => match action? {
                    SignalAction::Quit => return Ok(false),
                    SignalAction::Reload => return Ok(true),
                    SignalAction::Ignore => {}
                },
                line = self.serial.next_line() => {
                    let line = line?;
                    forward_reading(&self.translator, &self.link, &line).await;
                }
                message = self.inbound_rx.recv() => {
                    // The driver task holds the sender for the whole epoch,
                    // so a closed channel only happens during teardown.
                    let Some(message) = message else {
                        debug!("inbound channel closed");
                        continue;
                    };
                    let commands = self
                        .translator
                        .translate_mqtt_message(&message.topic, &message.payload);
                    for command in commands {
                        self.send_command(command).await?;
                    }
                }
            }
        }
    }

    async fn send_command(&mut self, command: ControlCommand) -> GatewayResult<()> {
        debug!(?command, "forwarding control command to device");
        self.serial.write_command(command.to_serial().as_bytes())
    }

    /// Tear down in reverse bring-up order.
    pub async fn tear_down(self) {
        let Self {
            serial,
            mut link,
            inbound_rx,
            ..
        } = self;

        link.disconnect().await;
        drop(inbound_rx);
        serial.close();
        info!("gateway down");
    }
}

/// Translate one device line and publish the result. Broker failures after
/// startup are logged and swallowed so a flaky broker cannot take the
/// gateway down.
pub async fn forward_reading<B: Broker>(translator: &Translator, broker: &B, line: &str) {
    let Some(request) = translator.translate_serial_line(line) else {
        return;
    };

    debug!(topic = %request.topic, "publishing reading");
    if let Err(e) = broker
        .publish(&request.topic, request.payload, request.retain)
        .await
    {
        warn!(topic = %request.topic, error = %e, "publish failed, reading dropped");
    }
}

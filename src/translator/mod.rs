//! Bidirectional protocol translation between serial lines and MQTT messages.
//!
//! Pure mapping logic: this module consumes and produces structured records
//! and never touches a descriptor or a socket. The serial→MQTT direction turns
//! a tab-separated reading into a retained JSON publish on a rendered topic;
//! the MQTT→serial direction turns control payloads into CR-terminated device
//! command strings.

pub mod command;
pub mod reading;
pub mod topics;

pub use command::{decode_mqtt_message, ControlCommand};
pub use reading::{decode_serial_line, MeterReading, SerialLine};
pub use topics::{match_control_topic, ControlTopic};

use thiserror::Error;
use tracing::{debug, warn};

/// Non-fatal translation failures. Consumed where they occur: the offending
/// line or message is dropped, the loops keep running.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("reading has {fields} tab-separated fields, expected 4")]
    MalformedReading { fields: usize },
}

/// One outbound MQTT publish produced from a serial reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Translator bound to one epoch's topic configuration.
#[derive(Debug, Clone)]
pub struct Translator {
    device_topic: String,
    sensor_topic: String,
}

impl Translator {
    pub fn new(device_topic: impl Into<String>, sensor_topic: impl Into<String>) -> Self {
        Self {
            device_topic: device_topic.into(),
            sensor_topic: sensor_topic.into(),
        }
    }

    /// The two control subscriptions this translator answers to.
    pub fn control_subscriptions(&self) -> [String; 2] {
        [
            format!("{}/control", self.device_topic),
            format!("{}/+/control", self.device_topic),
        ]
    }

    /// Serial → MQTT. Acknowledgements and malformed lines produce no publish;
    /// malformed lines are logged with a hex dump at debug level.
    pub fn translate_serial_line(&self, line: &str) -> Option<PublishRequest> {
        match decode_serial_line(line) {
            Ok(SerialLine::Reading(reading)) => Some(PublishRequest {
                topic: topics::publish_topic(&self.device_topic, &self.sensor_topic, &reading),
                payload: reading.to_payload(),
                retain: true,
            }),
            Ok(SerialLine::Ack) => {
                debug!(line, "device acknowledgement ignored");
                None
            }
            Err(e) => {
                warn!(error = %e, "serial line dropped");
                debug!("dropped line:\n{}", crate::util::hex_dump(line.as_bytes()));
                None
            }
        }
    }

    /// MQTT → serial. See [`command::decode_mqtt_message`].
    pub fn translate_mqtt_message(&self, topic: &str, payload: &[u8]) -> Vec<ControlCommand> {
        decode_mqtt_message(&self.device_topic, topic, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> Translator {
        Translator::new("/home/meterDigitizer", "{{sensorId}}")
    }

    #[test]
    fn reading_becomes_retained_publish_on_rendered_topic() {
        let publish = translator()
            .translate_serial_line("2023-01-01T00:00:00\t5\tKitchen\t23.4")
            .expect("reading should publish");

        assert_eq!(publish.topic, "/home/meterDigitizer/5/value");
        assert!(publish.retain);

        let payload: serde_json::Value = serde_json::from_slice(&publish.payload).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "timestamp": "2023-01-01T00:00:00",
                "id": "5",
                "name": "Kitchen",
                "value": "23.4",
            })
        );
    }

    #[test]
    fn acknowledgements_publish_nothing() {
        assert_eq!(translator().translate_serial_line("OK"), None);
        assert_eq!(translator().translate_serial_line("Error"), None);
    }

    #[test]
    fn malformed_line_is_dropped_not_published() {
        assert_eq!(translator().translate_serial_line("only\ttwo"), None);
    }

    #[test]
    fn exactly_two_control_subscriptions() {
        let subs = translator().control_subscriptions();
        assert_eq!(
            subs,
            [
                "/home/meterDigitizer/control".to_string(),
                "/home/meterDigitizer/+/control".to_string(),
            ]
        );
    }

    #[test]
    fn sensor_name_template_resolves_through_double_render() {
        let translator = Translator::new("/home/m", "{{sensorName}}");
        let publish = translator
            .translate_serial_line("t\t9\tfloor-{{sensorId}}\t1.0")
            .unwrap();
        assert_eq!(publish.topic, "/home/m/floor-9/value");
    }
}

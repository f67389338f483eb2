//! Decoding of inbound broker messages into device control commands.

use super::topics::{match_control_topic, ControlTopic};
use serde_json::Value;
use tracing::{debug, warn};

/// A control command bound for the device. Transient; encoded and written,
/// never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetTime(String),
    List,
    SetMeter { id: i32, value: f64 },
}

impl ControlCommand {
    /// Serial wire form, always CR-terminated.
    pub fn to_serial(&self) -> String {
        match self {
            ControlCommand::SetTime(time) => format!("SET TIME {time}\r"),
            ControlCommand::List => "LIST\r".to_string(),
            ControlCommand::SetMeter { id, value } => format!("SET METER {id} {value:.3}\r"),
        }
    }
}

/// Translate one broker message into zero or more device commands.
///
/// A global message may carry `time` and/or `list` and so yield up to two
/// commands; a per-device message yields at most one. Messages on unmatched
/// topics and unparseable payloads yield none.
pub fn decode_mqtt_message(device_topic: &str, topic: &str, payload: &[u8]) -> Vec<ControlCommand> {
    let Some(matched) = match_control_topic(device_topic, topic) else {
        debug!(topic, "message on unsubscribed topic ignored");
        return Vec::new();
    };

    let body: Value = match serde_json::from_slice(payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(topic, error = %e, "unparseable control payload dropped");
            return Vec::new();
        }
    };

    match matched {
        ControlTopic::Global => decode_global(&body),
        ControlTopic::Device(id) => decode_per_device(id, &body),
    }
}

fn decode_global(body: &Value) -> Vec<ControlCommand> {
    let mut commands = Vec::new();
    if let Some(time) = body.get("time").and_then(Value::as_str) {
        commands.push(ControlCommand::SetTime(time.to_string()));
    }
    if body.get("list").map(is_truthy).unwrap_or(false) {
        commands.push(ControlCommand::List);
    }
    commands
}

fn decode_per_device(id: i32, body: &Value) -> Vec<ControlCommand> {
    match body.get("value").and_then(as_numeric) {
        Some(value) => vec![ControlCommand::SetMeter { id, value }],
        None => {
            warn!(id, "per-device command without numeric value dropped");
            Vec::new()
        }
    }
}

/// Numeric-convertible: a JSON number, or a string that parses as one.
fn as_numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_TOPIC: &str = "/home/meterDigitizer";

    fn decode(topic: &str, payload: &str) -> Vec<ControlCommand> {
        decode_mqtt_message(DEVICE_TOPIC, topic, payload.as_bytes())
    }

    #[test]
    fn list_command_encodes_cr_terminated() {
        let commands = decode("/home/meterDigitizer/control", r#"{"list":true}"#);
        assert_eq!(commands, vec![ControlCommand::List]);
        assert_eq!(commands[0].to_serial(), "LIST\r");
    }

    #[test]
    fn time_command_carries_the_value() {
        let commands = decode(
            "/home/meterDigitizer/control",
            r#"{"time":"2023-01-01 12:00:00"}"#,
        );
        assert_eq!(
            commands,
            vec![ControlCommand::SetTime("2023-01-01 12:00:00".to_string())]
        );
        assert_eq!(commands[0].to_serial(), "SET TIME 2023-01-01 12:00:00\r");
    }

    #[test]
    fn global_message_may_yield_both_commands() {
        let commands = decode(
            "/home/meterDigitizer/control",
            r#"{"time":"now","list":1}"#,
        );
        assert_eq!(commands.len(), 2);
        assert!(commands.contains(&ControlCommand::SetTime("now".to_string())));
        assert!(commands.contains(&ControlCommand::List));
    }

    #[test]
    fn global_message_may_yield_none() {
        assert!(decode("/home/meterDigitizer/control", r#"{}"#).is_empty());
        assert!(decode("/home/meterDigitizer/control", r#"{"list":false}"#).is_empty());
    }

    #[test]
    fn per_device_value_formats_three_decimals() {
        let commands = decode("/home/meterDigitizer/42/control", r#"{"value":12.345}"#);
        assert_eq!(
            commands,
            vec![ControlCommand::SetMeter { id: 42, value: 12.345 }]
        );
        assert_eq!(commands[0].to_serial(), "SET METER 42 12.345\r");
    }

    #[test]
    fn per_device_value_pads_to_three_decimals() {
        let commands = decode("/home/meterDigitizer/7/control", r#"{"value":5}"#);
        assert_eq!(commands[0].to_serial(), "SET METER 7 5.000\r");
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let commands = decode("/home/meterDigitizer/7/control", r#"{"value":"1.5"}"#);
        assert_eq!(commands, vec![ControlCommand::SetMeter { id: 7, value: 1.5 }]);
    }

    #[test]
    fn non_numeric_value_is_dropped() {
        assert!(decode("/home/meterDigitizer/7/control", r#"{"value":"x"}"#).is_empty());
        assert!(decode("/home/meterDigitizer/7/control", r#"{}"#).is_empty());
    }

    #[test]
    fn garbage_payload_yields_nothing() {
        assert!(decode("/home/meterDigitizer/control", "not json").is_empty());
    }

    #[test]
    fn foreign_topic_yields_nothing() {
        assert!(decode("/somewhere/else/control", r#"{"list":true}"#).is_empty());
    }
}

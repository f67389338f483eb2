//! Decoding of inbound serial lines.

use super::TranslateError;
use serde_json::json;

/// One meter reading, exactly as the device reported it. All fields stay
/// strings end to end; the gateway forwards, it does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterReading {
    pub timestamp: String,
    pub sensor_id: String,
    pub sensor_name: String,
    pub value: String,
}

/// Classification of one completed serial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialLine {
    /// `OK` / `Error` command acknowledgement, ignored.
    Ack,
    Reading(MeterReading),
}

/// Decode a completed serial line.
///
/// Readings are tab-separated `timestamp\tid\tname\tvalue`. Any other field
/// count is a translation error; the caller drops the line.
pub fn decode_serial_line(line: &str) -> Result<SerialLine, TranslateError> {
    if line == "OK" || line == "Error" {
        return Ok(SerialLine::Ack);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    match fields.as_slice() {
        [timestamp, id, name, value] => Ok(SerialLine::Reading(MeterReading {
            timestamp: timestamp.to_string(),
            sensor_id: id.to_string(),
            sensor_name: name.to_string(),
            value: value.to_string(),
        })),
        _ => Err(TranslateError::MalformedReading {
            fields: fields.len(),
        }),
    }
}

impl MeterReading {
    /// JSON payload published for this reading, all fields string-typed.
    pub fn to_payload(&self) -> Vec<u8> {
        let payload = json!({
            "timestamp": self.timestamp,
            "id": self.sensor_id,
            "name": self.sensor_name,
            "value": self.value,
        });
        payload.to_string().into_bytes()
    }
}

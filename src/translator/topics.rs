//! Topic rendering and control-topic matching.

use super::MeterReading;

/// Substitute `{{name}}` markers in a template.
///
/// Unknown markers are left in place so a second pass can resolve templates
/// that themselves render to templates.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

/// Render the publish topic for a reading.
///
/// The configured sensor-topic template may itself contain one further level
/// of indirection (a sensor name that is again a template), so rendering is
/// applied twice before the `/value` suffix is attached. Given well-formed
/// templates the second pass is idempotent.
pub fn publish_topic(device_topic: &str, sensor_topic: &str, reading: &MeterReading) -> String {
    let vars = [
        ("sensorId", reading.sensor_id.as_str()),
        ("sensorName", reading.sensor_name.as_str()),
    ];
    let rendered = render(&render(sensor_topic, &vars), &vars);
    format!("{device_topic}/{rendered}/value")
}

/// Which control subscription an inbound topic matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTopic {
    /// `<device-topic>/control`
    Global,
    /// `<device-topic>/<id>/control`
    Device(i32),
}

/// Match an inbound topic against the two subscribed control patterns.
pub fn match_control_topic(device_topic: &str, topic: &str) -> Option<ControlTopic> {
    let rest = topic.strip_prefix(device_topic)?.strip_prefix('/')?;
    if rest == "control" {
        return Some(ControlTopic::Global);
    }
    let id = rest.strip_suffix("/control")?;
    if id.contains('/') {
        return None;
    }
    id.parse().ok().map(ControlTopic::Device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: &str, name: &str) -> MeterReading {
        MeterReading {
            timestamp: "2023-01-01T00:00:00".to_string(),
            sensor_id: id.to_string(),
            sensor_name: name.to_string(),
            value: "23.4".to_string(),
        }
    }

    #[test]
    fn renders_sensor_id_marker() {
        let topic = publish_topic("/home/meterDigitizer", "{{sensorId}}", &reading("5", "Kitchen"));
        assert_eq!(topic, "/home/meterDigitizer/5/value");
    }

    #[test]
    fn renders_one_level_of_indirection() {
        // The sensor name is itself a template referring to the sensor id.
        let topic = publish_topic("/home/m", "{{sensorName}}", &reading("7", "room-{{sensorId}}"));
        assert_eq!(topic, "/home/m/room-7/value");
    }

    #[test]
    fn second_pass_is_idempotent() {
        let vars = [("sensorId", "5"), ("sensorName", "Kitchen")];
        let once = render("{{sensorName}}/{{sensorId}}", &vars);
        let twice = render(&once, &vars);
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_markers_are_preserved() {
        assert_eq!(render("{{bogus}}", &[("sensorId", "5")]), "{{bogus}}");
    }

    #[test]
    fn matches_global_control_topic() {
        assert_eq!(
            match_control_topic("/home/m", "/home/m/control"),
            Some(ControlTopic::Global)
        );
    }

    #[test]
    fn matches_per_device_control_topic() {
        assert_eq!(
            match_control_topic("/home/m", "/home/m/42/control"),
            Some(ControlTopic::Device(42))
        );
    }

    #[test]
    fn rejects_foreign_and_malformed_topics() {
        assert_eq!(match_control_topic("/home/m", "/other/42/control"), None);
        assert_eq!(match_control_topic("/home/m", "/home/m/not-a-number/control"), None);
        assert_eq!(match_control_topic("/home/m", "/home/m/1/2/control"), None);
        assert_eq!(match_control_topic("/home/m", "/home/m/42/value"), None);
    }
}

//! meter2mqtt - Serial metering gateway
//!
//! Bridges a line-oriented serial metering device and an MQTT broker.
//!
//! # Overview
//!
//! This crate provides the full gateway daemon, including:
//! - Serial device framing and command writing
//! - MQTT transport with a pure connection state machine
//! - Translation between device readings and retained broker messages
//! - Signal-driven lifecycle with configuration reload
//!
//! # Quick Start
//!
//! ```rust
//! use meter2mqtt::translator::Translator;
//!
//! let translator = Translator::new("/home/meterDigitizer", "{{sensorId}}");
//!
//! // A tab-separated device reading becomes a retained publish request.
//! let request = translator
//!     .translate_serial_line("1471355964\t5\tHeating\t229.4")
//!     .unwrap();
//! assert_eq!(request.topic, "/home/meterDigitizer/5/value");
//!
//! // Command acknowledgements produce nothing.
//! assert!(translator.translate_serial_line("OK").is_none());
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod serial;
pub mod testing;
pub mod translator;
pub mod transport;
pub mod util;

pub use config::{ConfigOverrides, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::Epoch;
pub use translator::Translator;
pub use transport::mqtt::{ConnectionState, MqttLink};

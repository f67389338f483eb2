//! Gateway error taxonomy.
//!
//! Every variant here is fatal: it is surfaced to the top level, printed as a
//! single `Error: <message>` line on stderr and terminates the process with a
//! nonzero exit code. The one recoverable condition in the system (the
//! service-record to direct-host connection fallback) is consumed inside
//! [`crate::transport::mqtt`] and never becomes a `GatewayError`.

use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Top-level error type for gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Can't open device {path}: {source}")]
    DeviceOpen {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Device file error: {0}")]
    Device(#[source] std::io::Error),

    #[error("Can't open signal handler: {0}")]
    SignalOpen(#[source] std::io::Error),

    #[error("Error reading signal handler")]
    SignalRead,

    #[error(transparent)]
    Mqtt(#[from] MqttError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

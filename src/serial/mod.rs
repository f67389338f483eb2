//! Serial device I/O: port ownership and line framing.

pub mod framing;
pub mod port;

pub use framing::{BinaryLine, LineFramer};
pub use port::SerialDevice;

//! Serial device ownership: open, framed reads, command writes.
//!
//! The `serialport` handle blocks, so reads run on a dedicated thread that
//! feeds completed lines into a tokio channel; the async event loop only ever
//! sees whole lines. Writes happen on the caller's context through the second
//! clone of the handle.

use super::framing::{BinaryLine, LineFramer};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::util::hex_dump;
use serialport::SerialPort;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// How long a blocking read may wait before checking the shutdown flag.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// An open serial metering device.
pub struct SerialDevice {
    path: String,
    writer: Box<dyn SerialPort>,
    lines: mpsc::Receiver<std::io::Result<String>>,
    reader: Option<std::thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl SerialDevice {
    /// Open the configured device and start the framed reader thread.
    pub fn open(config: &GatewayConfig) -> GatewayResult<Self> {
        let open_err = |source| GatewayError::DeviceOpen {
            path: config.device.clone(),
            source,
        };

        let reader_port = serialport::new(&config.device, config.baud)
            .timeout(READ_POLL_INTERVAL)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(open_err)?;
        let writer = reader_port.try_clone().map_err(open_err)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, lines) = mpsc::channel(64);
        let reader = std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn({
                let shutdown = shutdown.clone();
                move || read_loop(reader_port, tx, shutdown)
            })
            .map_err(GatewayError::Device)?;

        debug!(device = %config.device, baud = config.baud, "serial device opened");
        Ok(Self {
            path: config.device.clone(),
            writer,
            lines,
            reader: Some(reader),
            shutdown,
        })
    }

    /// Next completed line from the device. A closed channel or a reader I/O
    /// error is a fatal device error.
    pub async fn next_line(&mut self) -> GatewayResult<String> {
        match self.lines.recv().await {
            Some(Ok(line)) => {
                trace!(device = %self.path, line = %line, "serial line received");
                Ok(line)
            }
            Some(Err(e)) => Err(GatewayError::Device(e)),
            None => Err(GatewayError::Device(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "serial reader stopped",
            ))),
        }
    }

    /// Write one control command to the device. A short write is logged and
    /// swallowed (the command is not retried); a write error is fatal.
    pub fn write_command(&mut self, command: &[u8]) -> GatewayResult<()> {
        let written = self
            .writer
            .write(command)
            .map_err(GatewayError::Device)?;
        if written < command.len() {
            error!(
                device = %self.path,
                requested = command.len(),
                written,
                "short write to device, command dropped"
            );
        }
        Ok(())
    }

    /// Stop the reader thread and release the descriptor.
    pub fn close(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        debug!(device = %self.path, "serial device closed");
    }
}

fn read_loop(
    mut port: Box<dyn SerialPort>,
    tx: mpsc::Sender<std::io::Result<String>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 256];

    while !shutdown.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                for line in framer.push_chunk(&buf[..n]) {
                    match line {
                        Ok(line) => {
                            if tx.blocking_send(Ok(line)).is_err() {
                                return; // receiver gone, epoch is tearing down
                            }
                        }
                        Err(BinaryLine(bytes)) => {
                            warn!("undecodable serial line dropped");
                            debug!("dropped line:\n{}", hex_dump(&bytes));
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

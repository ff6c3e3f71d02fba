use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use crate::errors::{DriverError, Result};

/// Line rate the acquisition firmware is built for.
pub const DEFAULT_BAUD_RATE: u32 = 512_000;

/// Read timeout; bounds how long the reader takes to notice a stop request.
const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

const DEFAULT_READ_CHUNK: usize = 4096;

/// Reading half of an open link, handed to the I/O thread.
pub type ByteStream = Box<dyn Read + Send>;

/// A byte link to the device.
///
/// `open` returns the reading half; writes go through the transport itself
/// so the host can serialize them behind a single lock. Reads on the returned
/// stream should time out periodically (`TimedOut`/`WouldBlock`) rather than
/// block forever, so the reader can observe shutdown.
pub trait Transport: Send {
    fn open(&mut self) -> Result<ByteStream>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Human-readable link name for logs.
    fn name(&self) -> String {
        "link".to_string()
    }
}

/// Serial line settings. Framing is always 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub read_chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

impl LinkConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// [`Transport`] over a local serial port.
pub struct SerialTransport {
    config: LinkConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(config: LinkConfig) -> Self {
        Self { config, port: None }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<ByteStream> {
        if self.config.port.is_empty() {
            return Err(DriverError::InvalidState("no serial port configured".into()));
        }

        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout())
            .open()?;
        let reader = port.try_clone()?;

        info!(
            "opened serial port {} at {} baud",
            self.config.port, self.config.baud_rate
        );
        self.port = Some(port);
        Ok(Box::new(reader))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("closed serial port {}", self.config.port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(DriverError::NotConnected)?;
        port.write_all(bytes)?;
        port.flush()?;
        debug!("wrote {} bytes: {:02X?}", bytes.len(), bytes);
        Ok(())
    }

    fn name(&self) -> String {
        self.config.port.clone()
    }
}

/// Serial ports present on this machine, with a short description of each.
pub fn available_ports() -> Result<Vec<(String, String)>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                SerialPortType::UsbPort(usb) => format!(
                    "usb {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.unwrap_or_default()
                ),
                SerialPortType::BluetoothPort => "bluetooth".to_string(),
                SerialPortType::PciPort => "pci".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            (p.port_name, kind)
        })
        .collect())
}

//! Serial port communication implementation
//!
//! Provides low-level serial port operations for direct hardware connection
//! to CNC controllers via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Line-oriented blocking read/write over a [`Transport`]
//! - Opening endpoints through a [`PortOpener`] so the link can be driven
//!   by something other than real hardware

use super::SerialEndpoint;
use grapefruit_core::{ConnectionError, Result};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Description reported for ports the OS driver could not identify
pub const UNKNOWN_DESCRIPTION: &str = "n/a";

/// A machine the operator can connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineDescriptor {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,

    /// Human-readable description (e.g., "USB2.0-Serial")
    pub description: String,

    /// Hardware id (e.g., "USB VID:PID=1A86:7523")
    pub hardware_id: String,
}

impl MachineDescriptor {
    pub fn new(
        port: impl Into<String>,
        description: impl Into<String>,
        hardware_id: impl Into<String>,
    ) -> Self {
        Self {
            port: port.into(),
            description: description.into(),
            hardware_id: hardware_id.into(),
        }
    }

    /// Whether the OS driver could identify this port
    pub fn is_identified(&self) -> bool {
        self.description != UNKNOWN_DESCRIPTION
    }
}

impl std::fmt::Display for MachineDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} [{}]", self.port, self.description, self.hardware_id)
    }
}

/// List the machines attached to this host
///
/// Ports are sorted by name; ports the OS could not identify are left out.
pub fn list_machines() -> Result<Vec<MachineDescriptor>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::Enumeration {
            reason: e.to_string(),
        }
    })?;

    let machines = select_machines(ports.iter().map(describe_port).collect());
    tracing::debug!("Discovered {} machine(s)", machines.len());
    Ok(machines)
}

/// Drop unidentified ports and sort the rest by port name
pub fn select_machines(mut machines: Vec<MachineDescriptor>) -> Vec<MachineDescriptor> {
    machines.retain(MachineDescriptor::is_identified);
    machines.sort_by(|a, b| a.port.cmp(&b.port));
    machines
}

fn describe_port(port: &serialport::SerialPortInfo) -> MachineDescriptor {
    let (description, hardware_id) = match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let mut hwid = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
            if let Some(serial) = &usb.serial_number {
                hwid.push_str(&format!(" SER={}", serial));
            }
            let description = usb
                .product
                .clone()
                .unwrap_or_else(|| "USB Serial Device".to_string());
            (description, hwid)
        }
        serialport::SerialPortType::PciPort => ("PCI Serial Port".to_string(), "PCI".to_string()),
        serialport::SerialPortType::BluetoothPort => {
            ("Bluetooth Serial Port".to_string(), "BLUETOOTH".to_string())
        }
        serialport::SerialPortType::Unknown => (
            UNKNOWN_DESCRIPTION.to_string(),
            UNKNOWN_DESCRIPTION.to_string(),
        ),
    };

    MachineDescriptor::new(&port.port_name, description, hardware_id)
}

/// Line-oriented byte transport to a controller
pub trait Transport: Send {
    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read one line, blocking up to the read timeout.
    ///
    /// The line terminator and surrounding whitespace are removed. A timeout
    /// yields whatever arrived so far, possibly an empty string.
    fn read_line(&mut self) -> io::Result<String>;

    /// Bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Flush pending output
    fn flush(&mut self) -> io::Result<()>;

    /// Close the transport; further use is an error
    fn close(&mut self) -> io::Result<()>;
}

/// Opens a [`Transport`] for an endpoint
pub trait PortOpener: Send {
    fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn Transport>>;
}

/// Opens real serial ports via the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn Transport>> {
        if endpoint.baud_rate == 0 {
            return Err(ConnectionError::InvalidParameters {
                reason: "baud rate must be > 0".to_string(),
            }
            .into());
        }

        let port = serialport::new(&endpoint.port, endpoint.baud_rate)
            .timeout(endpoint.read_timeout)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", endpoint.port, e);
                ConnectionError::FailedToOpen {
                    port: endpoint.port.clone(),
                    reason: e.to_string(),
                }
            })?;

        Ok(Box::new(SerialTransport::new(port, endpoint.read_timeout)))
    }
}

/// [`Transport`] over an open `serialport` handle
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn new(port: Box<dyn serialport::SerialPort>, read_timeout: Duration) -> Self {
        Self {
            port: Some(port),
            pending: Vec::new(),
            read_timeout,
        }
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }

    fn take_line(&mut self, end: usize) -> String {
        let bytes: Vec<u8> = self.pending.drain(..end).collect();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port()?.write_all(data)
    }

    fn read_line(&mut self) -> io::Result<String> {
        let deadline = Instant::now() + self.read_timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                return Ok(self.take_line(pos + 1));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let end = self.pending.len();
                return Ok(self.take_line(end));
            }

            let port = self.port()?;
            port.set_timeout(remaining).map_err(io::Error::from)?;

            match port.read(&mut chunk) {
                Ok(0) => {
                    let end = self.pending.len();
                    return Ok(self.take_line(end));
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    let end = self.pending.len();
                    return Ok(self.take_line(end));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let buffered = self.pending.len();
        let waiting = self
            .port()?
            .bytes_to_read()
            .map_err(io::Error::from)?;
        Ok(buffered + waiting as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.pending.clear();
        match self.port.take() {
            Some(mut port) => port.flush(),
            None => Ok(()),
        }
    }
}

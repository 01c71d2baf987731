//! Serial communication with CNC controllers
//!
//! - [`serial`]: port discovery and the byte transport
//! - [`link`]: the CNC link (connect, handshake, send one line, terminate)
//! - [`streaming`]: batch streaming over a link, inline or on a worker thread

pub mod link;
pub mod serial;
pub mod streaming;

use std::time::Duration;

/// Default read timeout for response lines
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Identifies a serial port and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEndpoint {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound for reading one response line
    pub read_timeout: Duration,
}

impl SerialEndpoint {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl std::fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.port, self.baud_rate)
    }
}

//! CNC link
//!
//! Owns the serial connection to one machine. A link starts disconnected;
//! [`CncLink::connect`] opens the port, lets the controller boot, drains its
//! boot chatter and runs the handshake. [`CncLink::send`] writes one line,
//! waits the pacing interval and reads back one response line.
//! [`CncLink::terminate`] sends the end-of-job command and closes the port.
//!
//! All operations block the calling thread.

use super::serial::{PortOpener, SerialPortOpener, Transport};
use super::SerialEndpoint;
use grapefruit_core::{
    linear_move, prepare, rapid_move, ConnectionError, InlineCommentPolicy, LinkError, MoveTarget,
    Result,
};
use std::time::Duration;

/// Terminator written after every command
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Upper bound on boot lines drained during connect
const MAX_BOOT_LINES: usize = 256;

/// Connection state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Result of a successful [`CncLink::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was transmitted: the line was blank or a comment
    Skipped,
    /// The line was transmitted; holds the response line, empty on read timeout
    Response(String),
}

impl SendOutcome {
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Response(r) => Some(r),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Tuning for a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Time to let the controller boot after opening the port
    pub settle_delay: Duration,
    /// Pause between writing a line and reading its response
    pub pacing_interval: Duration,
    /// Diagnostic command sent right after connecting
    pub handshake_command: String,
    /// End-of-job command sent on terminate
    pub shutdown_command: String,
    /// Treatment of comments trailing a command
    pub inline_comments: InlineCommentPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            pacing_interval: Duration::from_secs(1),
            handshake_command: "$$".to_string(),
            shutdown_command: "M02".to_string(),
            inline_comments: InlineCommentPolicy::Strip,
        }
    }
}

/// Blocking delays used by the link and the streaming loop
pub trait Pacer: Send {
    fn pause(&self, duration: Duration);
}

/// [`Pacer`] that sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Serial command dispatcher for one CNC machine
pub struct CncLink {
    endpoint: SerialEndpoint,
    config: LinkConfig,
    opener: Box<dyn PortOpener>,
    pacer: Box<dyn Pacer>,
    transport: Option<Box<dyn Transport>>,
}

impl CncLink {
    /// Create a disconnected link to a real serial port
    pub fn new(endpoint: SerialEndpoint, config: LinkConfig) -> Self {
        Self::with_opener(endpoint, config, Box::new(SerialPortOpener))
    }

    /// Create a disconnected link that opens its transport through `opener`
    pub fn with_opener(
        endpoint: SerialEndpoint,
        config: LinkConfig,
        opener: Box<dyn PortOpener>,
    ) -> Self {
        Self {
            endpoint,
            config,
            opener,
            pacer: Box::new(ThreadPacer),
            transport: None,
        }
    }

    /// Replace the pacer used for all delays
    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn endpoint(&self) -> &SerialEndpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }

    pub fn state(&self) -> LinkState {
        if self.transport.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// What [`CncLink::send`] would transmit for `command`, if anything
    pub fn prepare(&self, command: &str, run_anyway: bool) -> Option<String> {
        prepare(command, run_anyway, self.config.inline_comments)
    }

    /// Open the endpoint and perform the startup handshake.
    ///
    /// Calling this on a connected link reopens the endpoint. On any
    /// failure the fault is logged, the port is closed and the link stays
    /// disconnected.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.transport.take() {
            tracing::info!("Reopening {}", self.endpoint);
            if let Err(e) = old.close() {
                tracing::warn!("Error closing {}: {}", self.endpoint.port, e);
            }
        }

        let mut transport = self.opener.open(&self.endpoint).map_err(|e| {
            tracing::error!(
                "Error during first-time connection to '{}': {}",
                self.endpoint.port,
                e
            );
            e
        })?;

        self.pacer.pause(self.config.settle_delay);

        if let Err(e) = drain_boot_output(transport.as_mut()).and_then(|_| transport.flush()) {
            tracing::error!(
                "Error during first-time connection to '{}': {}",
                self.endpoint.port,
                e
            );
            let _ = transport.close();
            return Err(ConnectionError::io(&self.endpoint.port, e).into());
        }

        self.transport = Some(transport);

        if let Err(e) = self.handshake() {
            if let Some(mut transport) = self.transport.take() {
                let _ = transport.close();
            }
            return Err(e);
        }

        tracing::info!("Connection established with {}", self.endpoint.port);
        Ok(())
    }

    /// Send the diagnostic handshake command and return its response
    pub fn handshake(&mut self) -> Result<SendOutcome> {
        let command = self.config.handshake_command.clone();
        let outcome = self.send(&command, true, true)?;
        Ok(outcome)
    }

    /// Send one G-code line and read one response line.
    ///
    /// Unless `run_anyway` is set the line is sanitized first; when nothing
    /// is left to send, returns [`SendOutcome::Skipped`] without touching
    /// the port.
    ///
    /// # Errors
    /// [`LinkError::NotConnected`] when the link is disconnected,
    /// [`ConnectionError::Io`] on a transport fault.
    pub fn send(&mut self, command: &str, verbose: bool, run_anyway: bool) -> Result<SendOutcome> {
        let port = &self.endpoint.port;
        let transport = self.transport.as_mut().ok_or_else(|| LinkError::NotConnected {
            port: port.clone(),
        })?;

        let Some(line) = prepare(command, run_anyway, self.config.inline_comments) else {
            if verbose {
                tracing::info!("Skipping command '{}'", command.trim());
            } else {
                tracing::debug!("Skipping command '{}'", command.trim());
            }
            return Ok(SendOutcome::Skipped);
        };

        if verbose {
            tracing::info!("Sending G-code: `{}`", line);
        }

        let mut frame = line.into_bytes();
        frame.extend_from_slice(LINE_TERMINATOR);
        transport
            .write_all(&frame)
            .map_err(|e| transport_fault(port, "writing to", e))?;

        self.pacer.pause(self.config.pacing_interval);

        let response = transport
            .read_line()
            .map_err(|e| transport_fault(port, "reading from", e))?;

        if verbose {
            tracing::info!("Got response: `{}`", response);
        }
        Ok(SendOutcome::Response(response))
    }

    /// Coordinated move to (`x`, `y`, `z`) at `feed_rate`, extruding `extrude`
    pub fn move_to(
        &mut self,
        extrude: f64,
        feed_rate: f64,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<SendOutcome> {
        let line = linear_move(&MoveTarget::new(x, y, z, extrude), feed_rate);
        self.send(&line, true, false)
    }

    /// Fastest move to (`x`, `y`, `z`), extruding `extrude`
    pub fn move_to_rapid(&mut self, extrude: f64, x: f64, y: f64, z: f64) -> Result<SendOutcome> {
        let line = rapid_move(&MoveTarget::new(x, y, z, extrude));
        self.send(&line, true, false)
    }

    /// Send the end-of-job command and close the port.
    ///
    /// Does nothing on a disconnected link. Failures are logged, never
    /// returned; the link always ends up disconnected.
    pub fn terminate(&mut self) {
        if self.transport.is_none() {
            tracing::debug!("{} already disconnected", self.endpoint.port);
            return;
        }

        let command = self.config.shutdown_command.clone();
        if let Err(e) = self.send(&command, false, true) {
            tracing::warn!(
                "Failed to send '{}' to {}: {}",
                command,
                self.endpoint.port,
                e
            );
        }

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                tracing::warn!("Error closing {}: {}", self.endpoint.port, e);
            }
        }
        tracing::info!("Connection to {} terminated", self.endpoint.port);
    }
}

impl Drop for CncLink {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for CncLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CncLink")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn drain_boot_output(transport: &mut dyn Transport) -> std::io::Result<()> {
    if transport.bytes_available()? == 0 {
        tracing::info!("No data received from controller on connect");
        return Ok(());
    }

    let mut lines = 0;
    while lines < MAX_BOOT_LINES && transport.bytes_available()? > 0 {
        let line = transport.read_line()?;
        if !line.is_empty() {
            tracing::info!("Startup message: {}", line);
        }
        lines += 1;
    }
    Ok(())
}

fn transport_fault(port: &str, action: &str, err: std::io::Error) -> grapefruit_core::Error {
    tracing::error!("Unexpected error {} '{}': {}", action, port, err);
    ConnectionError::io(port, err).into()
}

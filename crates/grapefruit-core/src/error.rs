//! Error handling for Grapefruit
//!
//! Provides error types for all layers of the application:
//! - Connection errors (serial transport faults)
//! - Link errors (CNC link preconditions)
//! - G-Code errors (file input)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents faults in the serial transport: the port could not be
/// opened, enumerated, written to, or read from.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Serial subsystem enumeration failed
    #[error("Failed to enumerate serial ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },

    /// I/O fault on an open port
    #[error("I/O error on {port}: {reason}")]
    Io {
        /// The port the fault occurred on.
        port: String,
        /// The reason for the I/O error.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

impl ConnectionError {
    /// Build an I/O fault for `port` from an underlying error
    pub fn io(port: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConnectionError::Io {
            port: port.into(),
            reason: err.to_string(),
        }
    }
}

/// CNC link error type
///
/// Represents violations of the link's state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A command was issued while the link is disconnected
    #[error("CNC link on {port} is not connected")]
    NotConnected {
        /// The port the link is bound to.
        port: String,
    },
}

/// G-Code error type
///
/// Represents errors loading G-code sources.
#[derive(Error, Debug, Clone)]
pub enum GcodeError {
    /// File extension is not one of the accepted G-code types
    #[error("Unsupported file type '{extension}' for {path}")]
    UnsupportedFileType {
        /// The file path.
        path: String,
        /// The rejected extension (empty when there is none).
        extension: String,
    },

    /// File could not be read
    #[error("File error: {reason}")]
    FileError {
        /// The reason for the file error.
        reason: String,
    },
}

/// Main error type for Grapefruit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a "link not connected" error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::Link(LinkError::NotConnected { .. }))
    }

    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

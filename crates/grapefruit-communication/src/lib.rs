//! # Grapefruit Communication
//!
//! Talks to serial-attached CNC controllers: discovers ports, connects a
//! [`CncLink`] with a startup handshake, sends G-code one line at a time,
//! and streams whole batches with optional cancellation.

pub mod communication;

pub use communication::{
    link::{CncLink, LinkConfig, LinkState, Pacer, SendOutcome, ThreadPacer, LINE_TERMINATOR},
    serial::{
        list_machines, select_machines, MachineDescriptor, PortOpener, SerialPortOpener,
        SerialTransport, Transport, UNKNOWN_DESCRIPTION,
    },
    streaming::{
        stream, stream_with, CancelToken, StreamEvent, StreamHandle, StreamOptions, StreamSummary,
        StreamWorker,
    },
    SerialEndpoint, DEFAULT_READ_TIMEOUT,
};

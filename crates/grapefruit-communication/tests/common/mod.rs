//! Mock transport, opener and pacers shared by the link and streaming tests

#![allow(dead_code)]

use grapefruit_communication::{
    CncLink, LinkConfig, Pacer, PortOpener, SerialEndpoint, Transport,
};
use grapefruit_core::{ConnectionError, InlineCommentPolicy, Result};
use std::collections::VecDeque;
use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub const SETTLE: Duration = Duration::from_millis(7);
pub const PACING: Duration = Duration::from_millis(3);
pub const INTER_COMMAND: Duration = Duration::from_millis(5);

/// What the mock controller has seen and will answer
#[derive(Debug, Default)]
pub struct Wire {
    /// Every frame written, terminator included
    pub written: Vec<String>,
    /// Unsolicited lines present right after opening
    pub boot: VecDeque<String>,
    /// Response lines, one per read; an empty queue behaves like a read timeout
    pub responses: VecDeque<String>,
    pub flushes: usize,
    pub closes: usize,
    pub fail_writes: bool,
}

impl Wire {
    pub fn shared() -> Arc<Mutex<Wire>> {
        Arc::new(Mutex::new(Wire::default()))
    }

    /// Frames written after the handshake
    pub fn commands(&self) -> Vec<String> {
        self.written.iter().skip(1).cloned().collect()
    }
}

pub struct MockTransport {
    wire: Arc<Mutex<Wire>>,
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        if wire.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device removed"));
        }
        wire.written.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut wire = self.wire.lock().unwrap();
        if let Some(line) = wire.boot.pop_front() {
            return Ok(line);
        }
        Ok(wire.responses.pop_front().unwrap_or_default())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let wire = self.wire.lock().unwrap();
        Ok(wire.boot.iter().map(|l| l.len() + 2).sum())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.wire.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.wire.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub struct MockOpener {
    pub wire: Arc<Mutex<Wire>>,
    pub fail: bool,
}

impl PortOpener for MockOpener {
    fn open(&self, endpoint: &SerialEndpoint) -> Result<Box<dyn Transport>> {
        if self.fail {
            return Err(ConnectionError::FailedToOpen {
                port: endpoint.port.clone(),
                reason: "Permission denied".to_string(),
            }
            .into());
        }
        Ok(Box::new(MockTransport {
            wire: self.wire.clone(),
        }))
    }
}

/// Records every pause instead of sleeping
#[derive(Clone, Default)]
pub struct RecordingPacer {
    pub pauses: Arc<Mutex<Vec<Duration>>>,
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Blocks on inter-command pauses until the test hands out a permit
pub struct GatePacer {
    pub permits: mpsc::Receiver<()>,
}

impl Pacer for GatePacer {
    fn pause(&self, duration: Duration) {
        if duration == INTER_COMMAND {
            let _ = self.permits.recv();
        }
    }
}

pub fn test_config(inline_comments: InlineCommentPolicy) -> LinkConfig {
    LinkConfig {
        settle_delay: SETTLE,
        pacing_interval: PACING,
        inline_comments,
        ..LinkConfig::default()
    }
}

pub fn endpoint() -> SerialEndpoint {
    SerialEndpoint::new("/dev/ttyMOCK0", 115200)
}

/// A disconnected link over `wire` whose pauses are recorded
pub fn mock_link(wire: &Arc<Mutex<Wire>>) -> (CncLink, RecordingPacer) {
    let pacer = RecordingPacer::default();
    let link = CncLink::with_opener(
        endpoint(),
        test_config(InlineCommentPolicy::Strip),
        Box::new(MockOpener {
            wire: wire.clone(),
            fail: false,
        }),
    )
    .with_pacer(Box::new(pacer.clone()));
    (link, pacer)
}

/// A connected link over `wire`
pub fn connected_link(wire: &Arc<Mutex<Wire>>) -> (CncLink, RecordingPacer) {
    let (mut link, pacer) = mock_link(wire);
    link.connect().unwrap();
    (link, pacer)
}

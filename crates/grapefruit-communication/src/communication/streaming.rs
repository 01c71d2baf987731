//! Batch streaming over a CNC link
//!
//! Sends a sequence of raw lines one at a time, pausing a fixed
//! inter-command delay between transmitted lines. There is no
//! acknowledgement-based flow control: every line is attempted and a
//! failed line does not stop the batch.
//!
//! [`stream`] runs on the calling thread. [`StreamWorker::spawn`] moves the
//! link onto a dedicated thread, reports progress as [`StreamEvent`]s over a
//! channel and stops between lines when its [`CancelToken`] fires.

use super::link::{CncLink, SendOutcome};
use grapefruit_core::{Error, LinkError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Options for one streaming run
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Pause between two transmitted lines
    pub inter_command_delay: Duration,
    /// Log every line and response at info level
    pub verbose: bool,
    /// Bypass the sanitizer and forward lines verbatim
    pub run_anyway: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            inter_command_delay: Duration::from_millis(100),
            verbose: true,
            run_anyway: false,
        }
    }
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub transmitted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The run stopped early on request
    pub cancelled: bool,
}

/// Progress of a streaming run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Started {
        total: usize,
    },
    Sent {
        index: usize,
        command: String,
        response: String,
    },
    Skipped {
        index: usize,
    },
    Failed {
        index: usize,
        command: String,
        error: String,
    },
    /// Stopped before line `index`
    Cancelled {
        index: usize,
    },
    Finished(StreamSummary),
}

/// Cooperative cancellation flag shared between a worker and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stream `lines` over `link` on the calling thread
pub fn stream<S: AsRef<str>>(
    link: &mut CncLink,
    lines: &[S],
    options: &StreamOptions,
) -> Result<StreamSummary> {
    stream_with(link, lines, options, &CancelToken::new(), |_| {})
}

/// Stream `lines`, reporting each step to `on_event`.
///
/// `cancel` is checked before every line and again after each
/// inter-command pause.
///
/// # Errors
/// [`LinkError::NotConnected`] when the link is disconnected; nothing is sent.
pub fn stream_with<S, F>(
    link: &mut CncLink,
    lines: &[S],
    options: &StreamOptions,
    cancel: &CancelToken,
    mut on_event: F,
) -> Result<StreamSummary>
where
    S: AsRef<str>,
    F: FnMut(StreamEvent),
{
    if !link.is_connected() {
        return Err(LinkError::NotConnected {
            port: link.endpoint().port.clone(),
        }
        .into());
    }

    on_event(StreamEvent::Started { total: lines.len() });
    tracing::info!("Streaming {} line(s) to {}", lines.len(), link.endpoint());

    let mut summary = StreamSummary::default();
    let mut attempted = false;

    for (index, raw) in lines.iter().enumerate() {
        if cancel.is_cancelled() {
            mark_cancelled(index, &mut summary, &mut on_event);
            break;
        }

        let raw = raw.as_ref();
        let Some(command) = link.prepare(raw, options.run_anyway) else {
            summary.skipped += 1;
            on_event(StreamEvent::Skipped { index });
            continue;
        };

        if attempted {
            link.pacer().pause(options.inter_command_delay);
            if cancel.is_cancelled() {
                mark_cancelled(index, &mut summary, &mut on_event);
                break;
            }
        }
        attempted = true;

        match link.send(raw, options.verbose, options.run_anyway) {
            Ok(SendOutcome::Response(response)) => {
                summary.transmitted += 1;
                on_event(StreamEvent::Sent {
                    index,
                    command,
                    response,
                });
            }
            Ok(SendOutcome::Skipped) => {
                summary.skipped += 1;
                on_event(StreamEvent::Skipped { index });
            }
            Err(e) => {
                tracing::warn!("Line {} ('{}') failed: {}", index + 1, command, e);
                summary.failed += 1;
                on_event(StreamEvent::Failed {
                    index,
                    command,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Streaming finished: {} sent, {} skipped, {} failed",
        summary.transmitted,
        summary.skipped,
        summary.failed
    );
    on_event(StreamEvent::Finished(summary.clone()));
    Ok(summary)
}

fn mark_cancelled<F>(index: usize, summary: &mut StreamSummary, on_event: &mut F)
where
    F: FnMut(StreamEvent),
{
    tracing::info!("Streaming cancelled before line {}", index + 1);
    summary.cancelled = true;
    on_event(StreamEvent::Cancelled { index });
}

/// Runs a streaming batch on its own thread
pub struct StreamWorker;

impl StreamWorker {
    /// Move `link` onto a worker thread and stream `lines` there
    pub fn spawn(
        link: CncLink,
        lines: Vec<String>,
        options: StreamOptions,
    ) -> Result<StreamHandle> {
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("grapefruit-stream".to_string())
            .spawn(move || {
                let mut link = link;
                let result = stream_with(&mut link, &lines, &options, &worker_cancel, |event| {
                    // The owner may stop listening; the run still completes.
                    let _ = tx.send(event);
                });
                (link, result)
            })
            .map_err(Error::Io)?;

        Ok(StreamHandle {
            cancel,
            events: rx,
            thread,
        })
    }
}

/// Owner side of a running [`StreamWorker`]
pub struct StreamHandle {
    cancel: CancelToken,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    thread: JoinHandle<(CncLink, Result<StreamSummary>)>,
}

impl StreamHandle {
    /// Ask the worker to stop before its next line
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next progress event; `None` once the worker is done
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Wait for the worker and take the link back
    pub fn join(self) -> (CncLink, Result<StreamSummary>) {
        match self.thread.join() {
            Ok(done) => done,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

mod common;

use common::*;
use grapefruit_communication::{
    stream, stream_with, CancelToken, CncLink, StreamEvent, StreamOptions, StreamSummary,
    StreamWorker,
};
use grapefruit_core::InlineCommentPolicy;
use std::sync::mpsc;

fn options() -> StreamOptions {
    StreamOptions {
        inter_command_delay: INTER_COMMAND,
        verbose: false,
        run_anyway: false,
    }
}

#[test]
fn test_batch_skips_blank_and_comment_lines() {
    let wire = Wire::shared();
    let (mut link, pacer) = connected_link(&wire);
    let lines = ["G1 X1", "", "(comment)", "G1 X2"];

    let summary = stream(&mut link, &lines, &options()).unwrap();

    assert_eq!(
        summary,
        StreamSummary {
            transmitted: 2,
            skipped: 2,
            failed: 0,
            cancelled: false,
        }
    );
    assert_eq!(
        wire.lock().unwrap().commands(),
        vec!["G1 X1\r\n", "G1 X2\r\n"]
    );
    // settle + handshake, then: send, inter-command pause, send
    assert_eq!(
        *pacer.pauses.lock().unwrap(),
        vec![SETTLE, PACING, PACING, INTER_COMMAND, PACING]
    );
}

#[test]
fn test_no_pause_after_skipped_lines_only() {
    let wire = Wire::shared();
    let (mut link, pacer) = connected_link(&wire);

    stream(&mut link, &["(a)", "G0 X0", "(b)", "", ":c"], &options()).unwrap();

    let pauses = pacer.pauses.lock().unwrap();
    assert!(!pauses.contains(&INTER_COMMAND));
}

#[test]
fn test_stream_requires_connection() {
    let wire = Wire::shared();
    let (mut link, _) = mock_link(&wire);

    let err = stream(&mut link, &["G1 X1"], &options()).unwrap_err();

    assert!(err.is_not_connected());
    assert!(wire.lock().unwrap().written.is_empty());
}

#[test]
fn test_failed_lines_do_not_stop_the_batch() {
    let wire = Wire::shared();
    let (mut link, _) = connected_link(&wire);
    wire.lock().unwrap().fail_writes = true;

    let mut events = Vec::new();
    let summary = stream_with(
        &mut link,
        &["G1 X1", "G1 X2"],
        &options(),
        &CancelToken::new(),
        |e| events.push(e),
    )
    .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.transmitted, 0);
    let failed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Failed { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![0, 1]);
}

#[test]
fn test_events_report_responses_in_order() {
    let wire = Wire::shared();
    let (mut link, _) = connected_link(&wire);
    {
        let mut w = wire.lock().unwrap();
        w.responses.push_back("ok".to_string());
        w.responses.push_back("error:20".to_string());
    }

    let mut events = Vec::new();
    stream_with(
        &mut link,
        &["G0 X1 (first)", "(note)", "G5.1"],
        &options(),
        &CancelToken::new(),
        |e| events.push(e),
    )
    .unwrap();

    assert_eq!(
        events,
        vec![
            StreamEvent::Started { total: 3 },
            StreamEvent::Sent {
                index: 0,
                command: "G0 X1".to_string(),
                response: "ok".to_string(),
            },
            StreamEvent::Skipped { index: 1 },
            StreamEvent::Sent {
                index: 2,
                command: "G5.1".to_string(),
                response: "error:20".to_string(),
            },
            StreamEvent::Finished(StreamSummary {
                transmitted: 2,
                skipped: 1,
                failed: 0,
                cancelled: false,
            }),
        ]
    );
}

#[test]
fn test_run_anyway_streams_comments() {
    let wire = Wire::shared();
    let (mut link, _) = connected_link(&wire);
    let options = StreamOptions {
        run_anyway: true,
        ..options()
    };

    let summary = stream(&mut link, &["(raw)", "", "$X"], &options).unwrap();

    assert_eq!(summary.transmitted, 2);
    assert_eq!(
        wire.lock().unwrap().commands(),
        vec!["(raw)\r\n", "$X\r\n"]
    );
}

#[test]
fn test_cancel_stops_before_next_line() {
    let wire = Wire::shared();
    let (mut link, _) = connected_link(&wire);
    let cancel = CancelToken::new();

    let summary = stream_with(
        &mut link,
        &["G1 X1", "G1 X2", "G1 X3"],
        &options(),
        &cancel,
        |e| {
            if matches!(e, StreamEvent::Sent { index: 0, .. }) {
                cancel.cancel();
            }
        },
    )
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.transmitted, 1);
    assert_eq!(wire.lock().unwrap().commands(), vec!["G1 X1\r\n"]);
}

#[tokio::test]
async fn test_worker_streams_and_returns_link() {
    let wire = Wire::shared();
    let (link, _) = connected_link(&wire);
    let lines = vec!["G1 X1".to_string(), "(c)".to_string(), "G1 X2".to_string()];

    let mut handle = StreamWorker::spawn(link, lines, options()).unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let (mut link, result) = handle.join();

    assert_eq!(result.unwrap().transmitted, 2);
    assert!(matches!(events.first(), Some(StreamEvent::Started { total: 3 })));
    assert!(matches!(events.last(), Some(StreamEvent::Finished(_))));
    assert!(link.is_connected());

    link.terminate();
    assert_eq!(
        wire.lock().unwrap().commands(),
        vec!["G1 X1\r\n", "G1 X2\r\n", "M02\r\n"]
    );
}

#[tokio::test]
async fn test_worker_cancellation() {
    let wire = Wire::shared();
    let (gate, permits) = mpsc::channel();
    let mut link = CncLink::with_opener(
        endpoint(),
        test_config(InlineCommentPolicy::Strip),
        Box::new(MockOpener {
            wire: wire.clone(),
            fail: false,
        }),
    )
    .with_pacer(Box::new(GatePacer { permits }));
    link.connect().unwrap();

    let lines = vec!["G1 X1".to_string(), "G1 X2".to_string(), "G1 X3".to_string()];
    let mut handle = StreamWorker::spawn(link, lines, options()).unwrap();

    let mut cancelled_at = None;
    while let Some(event) = handle.next_event().await {
        match event {
            StreamEvent::Sent { index: 0, .. } => {
                handle.cancel();
                gate.send(()).unwrap();
            }
            StreamEvent::Cancelled { index } => cancelled_at = Some(index),
            _ => {}
        }
    }
    let (_link, result) = handle.join();

    let summary = result.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.transmitted, 1);
    assert_eq!(cancelled_at, Some(1));
    assert_eq!(wire.lock().unwrap().commands(), vec!["G1 X1\r\n"]);
}

#[test]
fn test_worker_rejects_disconnected_link() {
    let wire = Wire::shared();
    let (link, _) = mock_link(&wire);

    let handle = StreamWorker::spawn(link, vec!["G1 X1".to_string()], options()).unwrap();
    let (_link, result) = handle.join();

    assert!(result.unwrap_err().is_not_connected());
}

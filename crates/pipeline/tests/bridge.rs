use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use blackroad_pipeline::source::from_fn;
use blackroad_pipeline::{
    BridgeConfig, RelayMessage, RelayReceiver, SourceError, SourceExit, StreamBridge,
    StreamOutcome,
};

/// Drain the channel to its end, splitting lines from sentinels.
async fn drain(mut rx: RelayReceiver) -> (Vec<String>, Vec<StreamOutcome>, bool) {
    let mut lines = Vec::new();
    let mut dones = Vec::new();
    let mut line_after_done = false;
    while let Some(message) = rx.recv().await {
        match message {
            RelayMessage::Line(line) => {
                line_after_done |= !dones.is_empty();
                lines.push(line);
            }
            RelayMessage::Done(outcome) => dones.push(outcome),
        }
    }
    (lines, dones, line_after_done)
}

fn bridge_with_grace(grace: Duration) -> StreamBridge {
    StreamBridge::new(BridgeConfig {
        cancel_grace: grace,
        thread_name: "test-worker".into(),
    })
}

// ---------------------------------------------------------------------------
// Test: happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lines_arrive_in_order_then_one_sentinel() {
    let bridge = StreamBridge::default();
    let (handle, rx) = bridge
        .start(from_fn(|emitter| {
            for i in 0..1000 {
                emitter.emit(format!("line {i}"));
            }
            Ok(SourceExit::ok())
        }))
        .unwrap();

    let (lines, dones, line_after_done) = drain(rx).await;
    let expected: Vec<String> = (0..1000).map(|i| format!("line {i}")).collect();
    assert_eq!(lines, expected);
    assert_eq!(dones, [StreamOutcome::Succeeded { exit_code: Some(0) }]);
    assert!(!line_after_done);

    assert_eq!(
        handle.join().await,
        StreamOutcome::Succeeded { exit_code: Some(0) }
    );
}

#[tokio::test]
async fn flash_progress_scenario() {
    let (_handle, rx) = StreamBridge::default()
        .start(from_fn(|emitter| {
            emitter.emit("10%");
            emitter.emit("55%");
            Ok(SourceExit::ok())
        }))
        .unwrap();

    let (lines, dones, _) = drain(rx).await;
    assert_eq!(lines, ["10%", "55%"]);
    assert_eq!(dones.len(), 1);
}

#[tokio::test]
async fn diagnostic_precedes_sentinel_on_failure() {
    let (_handle, rx) = StreamBridge::default()
        .start(from_fn(|emitter| {
            emitter.emit("working");
            Ok(SourceExit::failed(Some(3)).with_diagnostic("[error] exited with status 3"))
        }))
        .unwrap();

    let (lines, dones, _) = drain(rx).await;
    assert_eq!(lines, ["working", "[error] exited with status 3"]);
    assert_eq!(dones, [StreamOutcome::Failed { exit_code: Some(3) }]);
}

// ---------------------------------------------------------------------------
// Test: faults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn source_error_becomes_diagnostic_and_fault() {
    let (_handle, rx) = StreamBridge::default()
        .start(from_fn(|_| {
            Err(SourceError::NotFound("whisper.cpp binary not found".into()))
        }))
        .unwrap();

    let (lines, dones, _) = drain(rx).await;
    assert_eq!(lines, ["[error] whisper.cpp binary not found"]);
    assert_matches!(&dones[..], [StreamOutcome::Faulted { error }] if error == "whisper.cpp binary not found");
}

#[tokio::test]
async fn panic_is_contained() {
    let (handle, rx) = StreamBridge::default()
        .start(from_fn(|emitter| {
            emitter.emit("before");
            panic!("boom");
        }))
        .unwrap();

    let (lines, dones, _) = drain(rx).await;
    assert_eq!(lines, ["before", "[error] worker panicked: boom"]);
    assert_eq!(
        dones,
        [StreamOutcome::Faulted {
            error: "boom".into()
        }]
    );
    assert_matches!(handle.join().await, StreamOutcome::Faulted { .. });
}

// ---------------------------------------------------------------------------
// Test: cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_returns_after_worker_exits() {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);

    let (handle, rx) = StreamBridge::default()
        .start(from_fn(move |emitter| {
            while emitter.emit("tick") {
                thread::sleep(Duration::from_millis(5));
            }
            flag.store(true, Ordering::SeqCst);
            Ok(SourceExit::ok())
        }))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let outcome = handle.cancel().await;
    assert!(exited.load(Ordering::SeqCst));
    assert_eq!(outcome, StreamOutcome::Cancelled { exit_code: Some(0) });

    let (lines, dones, line_after_done) = drain(rx).await;
    assert!(!lines.is_empty());
    assert_eq!(dones.len(), 1);
    assert!(!line_after_done);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (handle, rx) = StreamBridge::default()
        .start(from_fn(|emitter| {
            while !emitter.is_cancelled() {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(SourceExit::failed(None))
        }))
        .unwrap();

    let other = handle.clone();
    let (a, b) = tokio::join!(handle.cancel(), other.cancel());
    assert_eq!(a, b);
    assert_eq!(handle.cancel().await, a);
    assert_eq!(a, StreamOutcome::Cancelled { exit_code: None });

    let (_, dones, _) = drain(rx).await;
    assert_eq!(dones.len(), 1);
}

#[tokio::test]
async fn exactly_one_sentinel_when_cancel_races_completion() {
    for round in 0..40u64 {
        let (handle, rx) = StreamBridge::default()
            .start(from_fn(move |emitter| {
                for i in 0..(round * 5) {
                    if !emitter.emit(i.to_string()) {
                        break;
                    }
                }
                Ok(SourceExit::ok())
            }))
            .unwrap();

        if round % 2 == 0 {
            tokio::task::yield_now().await;
        }
        handle.cancel().await;

        let (_, dones, line_after_done) = drain(rx).await;
        assert_eq!(dones.len(), 1, "round {round}");
        assert!(!line_after_done, "round {round}");
        assert_matches!(
            dones[0],
            StreamOutcome::Succeeded { .. } | StreamOutcome::Cancelled { .. }
        );
    }
}

#[tokio::test]
async fn abort_hook_fires_after_grace() {
    let aborted = Arc::new(AtomicBool::new(false));
    let hooks = Arc::new(AtomicUsize::new(0));
    let (seen_abort, hook_calls) = (Arc::clone(&aborted), Arc::clone(&hooks));

    let bridge = bridge_with_grace(Duration::from_millis(100));
    let (handle, rx) = bridge
        .start(from_fn(move |emitter| {
            let flag = Arc::clone(&seen_abort);
            emitter.on_abort(move || {
                hook_calls.fetch_add(1, Ordering::SeqCst);
                flag.store(true, Ordering::SeqCst);
            });
            // Ignores the cooperative signal entirely.
            while !seen_abort.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(SourceExit::failed(Some(137)))
        }))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let outcome = handle.cancel().await;
    assert!(aborted.load(Ordering::SeqCst));
    assert_eq!(hooks.load(Ordering::SeqCst), 1);
    assert_eq!(outcome, StreamOutcome::Cancelled { exit_code: Some(137) });

    let (_, dones, _) = drain(rx).await;
    assert_eq!(dones.len(), 1);
}

#[tokio::test]
async fn abandoned_cancel_leaves_worker_joinable() {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);

    let bridge = bridge_with_grace(Duration::from_secs(5));
    let (handle, rx) = bridge
        .start(from_fn(move |_emitter| {
            // Slow to notice cancellation and has no abort hook.
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok(SourceExit::ok())
        }))
        .unwrap();

    // The first waiter gives up while the join is in flight.
    let abandoned = tokio::time::timeout(Duration::from_millis(20), handle.cancel()).await;
    assert!(abandoned.is_err());
    assert!(!exited.load(Ordering::SeqCst));

    let outcome = handle.cancel().await;
    assert!(exited.load(Ordering::SeqCst));
    assert_eq!(outcome, StreamOutcome::Cancelled { exit_code: Some(0) });
    assert_eq!(handle.join().await, outcome);

    let (_, dones, _) = drain(rx).await;
    assert_eq!(dones.len(), 1);
}

#[tokio::test]
async fn dropping_every_handle_cancels() {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);

    let (handle, rx) = StreamBridge::default()
        .start(from_fn(move |emitter| {
            while !emitter.is_cancelled() {
                thread::sleep(Duration::from_millis(2));
            }
            flag.store(true, Ordering::SeqCst);
            Ok(SourceExit::ok())
        }))
        .unwrap();
    drop(handle);

    let (_, dones, _) = drain(rx).await;
    assert!(exited.load(Ordering::SeqCst));
    assert_eq!(dones, [StreamOutcome::Cancelled { exit_code: Some(0) }]);
}

// ---------------------------------------------------------------------------
// Test: consumer gone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_receiver_does_not_crash_worker() {
    let (handle, rx) = StreamBridge::default()
        .start(from_fn(|emitter| {
            for i in 0..100 {
                assert!(emitter.emit(i.to_string()));
            }
            Ok(SourceExit::ok())
        }))
        .unwrap();
    drop(rx);

    assert_eq!(
        handle.join().await,
        StreamOutcome::Succeeded { exit_code: Some(0) }
    );
    assert!(handle.is_finished());
    assert_eq!(
        handle.outcome(),
        Some(StreamOutcome::Succeeded { exit_code: Some(0) })
    );
}

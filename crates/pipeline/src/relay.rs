//! Async-side delivery of a stream to its consumers.

use async_trait::async_trait;
use blackroad_db::LedgerError;

use crate::handle::StreamHandle;
use crate::message::{RelayMessage, RelayReceiver, StreamOutcome};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The consumer behind this sink is gone for good.
    #[error("consumer disconnected")]
    Disconnected,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// One consumer of a stream.
#[async_trait]
pub trait RelaySink: Send {
    /// Short name for log fields.
    fn name(&self) -> &'static str;

    async fn line(&mut self, line: &str) -> Result<(), SinkError>;

    async fn done(&mut self, outcome: &StreamOutcome) -> Result<(), SinkError>;

    /// Whether this sink's disconnect should cancel the stream. Only the
    /// client that started a stream owns it.
    fn owns_stream(&self) -> bool {
        false
    }
}

/// Drain `rx` into every sink until the terminal sentinel arrives, then join
/// the worker and return the outcome.
///
/// A sink that reports [`SinkError::Disconnected`] is dropped; if it owned the
/// stream, cancellation is requested. Other sink errors are logged and the
/// sink stays attached. Draining always continues so the remaining sinks
/// (ledger recorders in particular) still see every line and the sentinel.
pub async fn relay(
    mut rx: RelayReceiver,
    handle: &StreamHandle,
    mut sinks: Vec<Box<dyn RelaySink>>,
) -> StreamOutcome {
    let mut lines: u64 = 0;

    while let Some(message) = rx.recv().await {
        match message {
            RelayMessage::Line(line) => {
                lines += 1;
                let mut i = 0;
                while i < sinks.len() {
                    match sinks[i].line(&line).await {
                        Ok(()) => i += 1,
                        Err(err) => {
                            if detach_on_error(sinks[i].as_ref(), handle, err) {
                                sinks.remove(i);
                            } else {
                                i += 1;
                            }
                        }
                    }
                }
            }
            RelayMessage::Done(outcome) => {
                for sink in sinks.iter_mut() {
                    if let Err(err) = sink.done(&outcome).await {
                        tracing::debug!(
                            stream = %handle.name(),
                            sink = sink.name(),
                            error = %err,
                            "Sink failed to record stream end",
                        );
                    }
                }
                handle.join().await;
                tracing::info!(
                    stream = %handle.name(),
                    lines,
                    outcome = outcome.label(),
                    "Stream finished",
                );
                return outcome;
            }
        }
    }

    // The worker always sends `Done` before exiting, so a closed channel
    // without one means the worker thread itself died.
    let outcome = handle.join().await;
    tracing::error!(stream = %handle.name(), lines, "Relay channel closed without a terminal outcome");
    outcome
}

/// Returns `true` when the sink should be removed.
fn detach_on_error(sink: &dyn RelaySink, handle: &StreamHandle, err: SinkError) -> bool {
    match err {
        SinkError::Disconnected => {
            if sink.owns_stream() {
                tracing::info!(
                    stream = %handle.name(),
                    sink = sink.name(),
                    "Stream owner disconnected; cancelling",
                );
                handle.request_cancel();
            } else {
                tracing::debug!(stream = %handle.name(), sink = sink.name(), "Sink detached");
            }
            true
        }
        SinkError::Ledger(err) => {
            tracing::warn!(
                stream = %handle.name(),
                sink = sink.name(),
                error = %err,
                "Ledger write failed; continuing stream",
            );
            false
        }
    }
}

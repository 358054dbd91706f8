//! Starts a [`LineSource`] on its own thread and wires up the relay channel.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use blackroad_core::stream_events::diagnostic_line;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::emitter::{AbortSlot, LineEmitter};
use crate::handle::StreamHandle;
use crate::message::{RelayReceiver, StreamOutcome};
use crate::source::LineSource;

/// How long a cancelled worker may keep running before its abort hook fires.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub cancel_grace: Duration,
    /// OS thread name for the worker; also used in log fields.
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cancel_grace: DEFAULT_CANCEL_GRACE,
            thread_name: "stream-worker".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamBridge {
    config: BridgeConfig,
}

impl StreamBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Same bridge, different worker thread name.
    pub fn named(&self, thread_name: impl Into<String>) -> Self {
        Self {
            config: BridgeConfig {
                thread_name: thread_name.into(),
                ..self.config.clone()
            },
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Start `source` on a new worker thread.
    ///
    /// Returns immediately. Lines arrive on the receiver in production order,
    /// followed by exactly one `RelayMessage::Done`.
    pub fn start(
        &self,
        source: impl LineSource + 'static,
    ) -> io::Result<(StreamHandle, RelayReceiver)> {
        self.start_boxed(Box::new(source))
    }

    pub fn start_boxed(
        &self,
        source: Box<dyn LineSource>,
    ) -> io::Result<(StreamHandle, RelayReceiver)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let abort = Arc::new(AbortSlot::new());
        let outcome = Arc::new(OnceLock::new());

        let emitter = LineEmitter::new(tx, token.clone(), Arc::clone(&abort));
        let worker_outcome = Arc::clone(&outcome);
        let name = self.config.thread_name.clone();

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(source, emitter, &worker_outcome))?;

        tracing::debug!(stream = %name, "Stream worker started");
        let handle = StreamHandle::new(name, token, worker, outcome, abort, self.config.cancel_grace);
        Ok((handle, rx))
    }
}

/// Worker thread body. The only place a `Done` is ever sent.
fn run_worker(
    source: Box<dyn LineSource>,
    mut emitter: LineEmitter,
    outcome_slot: &OnceLock<StreamOutcome>,
) {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| source.run(&mut emitter)));
    let cancelled = emitter.is_cancelled();

    let outcome = match result {
        Ok(Ok(exit)) => {
            if let Some(diagnostic) = exit.diagnostic {
                emitter.emit_final(diagnostic);
            }
            if cancelled {
                StreamOutcome::Cancelled {
                    exit_code: exit.exit_code,
                }
            } else if exit.success {
                StreamOutcome::Succeeded {
                    exit_code: exit.exit_code,
                }
            } else {
                StreamOutcome::Failed {
                    exit_code: exit.exit_code,
                }
            }
        }
        Ok(Err(err)) if cancelled => {
            tracing::debug!(error = %err, "Source errored after cancellation");
            StreamOutcome::Cancelled { exit_code: None }
        }
        Ok(Err(err)) => {
            emitter.emit_final(diagnostic_line(&err));
            StreamOutcome::Faulted {
                error: err.to_string(),
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            emitter.emit_final(diagnostic_line(format_args!("worker panicked: {message}")));
            StreamOutcome::Faulted { error: message }
        }
    };

    tracing::debug!(
        outcome = outcome.label(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Stream worker finished",
    );
    let _ = outcome_slot.set(outcome.clone());
    emitter.finish(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

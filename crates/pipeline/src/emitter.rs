//! Worker-side handle for pushing lines into the relay channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::message::{RelayMessage, RelaySender, StreamOutcome};

type AbortHook = Box<dyn FnOnce() + Send>;

enum AbortState {
    Empty,
    Armed(AbortHook),
    Fired,
}

/// Slot for the hard-abort hook a source registers.
///
/// Shared between the worker (which arms it) and the [`StreamHandle`]
/// (which fires it once the cancel grace period runs out).
///
/// [`StreamHandle`]: crate::handle::StreamHandle
pub(crate) struct AbortSlot {
    state: Mutex<AbortState>,
}

impl AbortSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(AbortState::Empty),
        }
    }

    fn arm(&self, hook: AbortHook) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(*state, AbortState::Fired) {
            drop(state);
            hook();
            return;
        }
        *state = AbortState::Armed(hook);
    }

    /// Run the armed hook, if any. Later registrations run immediately.
    pub(crate) fn fire(&self) -> bool {
        let previous = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::replace(&mut *state, AbortState::Fired)
        };
        match previous {
            AbortState::Armed(hook) => {
                hook();
                true
            }
            AbortState::Empty | AbortState::Fired => false,
        }
    }
}

/// Pushes lines from the worker thread to the async side.
///
/// Cloneable so a source can hand copies to helper threads (for example a
/// stderr reader). Sending never blocks.
#[derive(Clone)]
pub struct LineEmitter {
    tx: RelaySender,
    token: CancellationToken,
    abort: Arc<AbortSlot>,
    consumer_gone: Arc<AtomicBool>,
}

impl LineEmitter {
    pub(crate) fn new(tx: RelaySender, token: CancellationToken, abort: Arc<AbortSlot>) -> Self {
        Self {
            tx,
            token,
            abort,
            consumer_gone: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Relay one line. Returns `false` once cancellation has been requested;
    /// the source should stop producing.
    ///
    /// If the consumer has gone away the line is discarded but `true` is
    /// still returned: losing the audience is not a reason to abandon the
    /// operation.
    pub fn emit(&self, line: impl Into<String>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.push(RelayMessage::Line(line.into()));
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Register the hook that forcibly stops this source (e.g. kills a child
    /// process). It runs at most once, on the async side, when cancellation
    /// has been requested and the source has not returned within the grace
    /// period. Registering again replaces the previous hook.
    pub fn on_abort(&self, hook: impl FnOnce() + Send + 'static) {
        self.abort.arm(Box::new(hook));
    }

    /// Relay a line even after cancellation. Used for the final diagnostic.
    pub(crate) fn emit_final(&self, line: String) {
        self.push(RelayMessage::Line(line));
    }

    pub(crate) fn finish(&self, outcome: StreamOutcome) {
        self.push(RelayMessage::Done(outcome));
    }

    fn push(&self, message: RelayMessage) {
        if self.tx.send(message).is_err() && !self.consumer_gone.swap(true, Ordering::Relaxed) {
            tracing::debug!("Relay receiver dropped; discarding further lines");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

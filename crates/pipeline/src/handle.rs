//! Async-side control of a running stream.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::emitter::AbortSlot;
use crate::message::StreamOutcome;

type Joined = Result<thread::Result<()>, JoinError>;

/// Cancel, join and inspect a stream started by
/// [`StreamBridge`](crate::bridge::StreamBridge).
///
/// Cheap to clone; all clones refer to the same stream. When the last clone
/// is dropped the stream is asked to cancel.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    token: CancellationToken,
    worker: tokio::sync::Mutex<Worker>,
    outcome: Arc<OnceLock<StreamOutcome>>,
    abort: Arc<AbortSlot>,
    grace: Duration,
}

/// Join state of the worker thread. A join in progress survives the
/// cancellation of the future that started it.
enum Worker {
    Running(thread::JoinHandle<()>),
    Joining(JoinHandle<thread::Result<()>>),
    Joined,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if self.outcome.get().is_none() {
            self.token.cancel();
        }
    }
}

impl StreamHandle {
    pub(crate) fn new(
        name: String,
        token: CancellationToken,
        worker: thread::JoinHandle<()>,
        outcome: Arc<OnceLock<StreamOutcome>>,
        abort: Arc<AbortSlot>,
        grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name,
                token,
                worker: tokio::sync::Mutex::new(Worker::Running(worker)),
                outcome,
                abort,
                grace,
            }),
        }
    }

    /// Signal cancellation without waiting. Safe from any context.
    pub fn request_cancel(&self) {
        if !self.inner.token.is_cancelled() {
            tracing::debug!(stream = %self.inner.name, "Stream cancellation requested");
            self.inner.token.cancel();
        }
    }

    /// Cancel the stream and wait for its worker thread to exit.
    ///
    /// Idempotent. If the worker has not returned within the grace period the
    /// source's abort hook is fired before waiting further.
    pub async fn cancel(&self) -> StreamOutcome {
        self.request_cancel();
        self.join().await
    }

    /// Wait for the worker thread to exit and return the stream's outcome.
    ///
    /// Blocking joins run on the blocking pool, never on the event loop. If
    /// cancellation is requested while waiting, the grace period applies.
    pub async fn join(&self) -> StreamOutcome {
        let mut worker = self.inner.worker.lock().await;
        if let Worker::Running(_) = &*worker {
            if let Worker::Running(thread) = std::mem::replace(&mut *worker, Worker::Joined) {
                *worker = Worker::Joining(tokio::task::spawn_blocking(move || thread.join()));
            }
        }
        if let Worker::Joining(joining) = &mut *worker {
            let joined = tokio::select! {
                joined = &mut *joining => joined,
                () = self.inner.token.cancelled() => self.join_within_grace(joining).await,
            };
            *worker = Worker::Joined;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::error!(stream = %self.inner.name, "Stream worker panicked outside its source");
                }
                Err(err) => {
                    tracing::error!(stream = %self.inner.name, error = %err, "Failed to join stream worker");
                }
            }
        }
        drop(worker);

        self.outcome().unwrap_or_else(|| StreamOutcome::Faulted {
            error: "stream worker exited without an outcome".into(),
        })
    }

    async fn join_within_grace(&self, joining: &mut JoinHandle<thread::Result<()>>) -> Joined {
        match tokio::time::timeout(self.inner.grace, &mut *joining).await {
            Ok(joined) => joined,
            Err(_) => {
                let fired = self.inner.abort.fire();
                tracing::warn!(
                    stream = %self.inner.name,
                    grace_ms = self.inner.grace.as_millis() as u64,
                    fired,
                    "Stream worker ignored cancellation; aborting",
                );
                joining.await
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// `true` once the worker has produced its outcome.
    pub fn is_finished(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    /// The terminal outcome, once known. Recorded even if nobody consumed the
    /// relay channel.
    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.inner.outcome.get().cloned()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .field("outcome", &self.outcome())
            .finish()
    }
}

//! What travels through the relay channel.

use serde::Serialize;
use tokio::sync::mpsc;

/// Receiving end of a stream's relay channel.
pub type RelayReceiver = mpsc::UnboundedReceiver<RelayMessage>;

pub(crate) type RelaySender = mpsc::UnboundedSender<RelayMessage>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// One line of output, without its trailing newline.
    Line(String),
    /// Terminal sentinel. Sent once, after every line.
    Done(StreamOutcome),
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StreamOutcome {
    /// The source returned and reported success.
    Succeeded { exit_code: Option<i32> },
    /// The source returned and reported failure (e.g. non-zero exit).
    Failed { exit_code: Option<i32> },
    /// The source raised an error or panicked.
    Faulted { error: String },
    /// Cancellation was requested before the source returned.
    Cancelled { exit_code: Option<i32> },
}

impl StreamOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Succeeded { exit_code }
            | Self::Failed { exit_code }
            | Self::Cancelled { exit_code } => *exit_code,
            Self::Faulted { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Short label used in logs and broadcast events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Faulted { .. } => "faulted",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

//! The blocking producer side of a stream.

use std::process::ExitStatus;

use blackroad_core::error::CoreError;

use crate::emitter::LineEmitter;

/// A blocking producer of text lines.
///
/// `run` is called exactly once, on a dedicated worker thread. It pushes
/// lines through `emitter` and should return promptly once
/// [`LineEmitter::emit`] reports `false` or [`LineEmitter::is_cancelled`]
/// turns true. Sources that can block indefinitely (child processes, network
/// reads) should register an abort hook with [`LineEmitter::on_abort`].
pub trait LineSource: Send {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError>;
}

/// Normal completion report from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExit {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// A last line relayed before the terminal sentinel.
    pub diagnostic: Option<String>,
}

impl SourceExit {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            diagnostic: None,
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
            diagnostic: None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A required program or input is absent.
    #[error("{0}")]
    NotFound(String),

    /// The request was rejected before anything ran.
    #[error("{0}")]
    Invalid(String),

    /// The source failed while producing output.
    #[error("{0}")]
    Fault(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for CoreError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(msg) => CoreError::SourceNotFound(msg),
            SourceError::Invalid(msg) => CoreError::InvalidArgument(msg),
            other => CoreError::SourceFault(other.to_string()),
        }
    }
}

/// A closure acting as a source. Built with [`from_fn`].
pub struct FnSource<F>(F);

/// Wrap a closure as a [`LineSource`].
pub fn from_fn<F>(f: F) -> FnSource<F>
where
    F: FnOnce(&mut LineEmitter) -> Result<SourceExit, SourceError> + Send,
{
    FnSource(f)
}

impl<F> LineSource for FnSource<F>
where
    F: FnOnce(&mut LineEmitter) -> Result<SourceExit, SourceError> + Send,
{
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        (self.0)(emitter)
    }
}

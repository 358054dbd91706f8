//! Durable operation and transcript ledgers.
//!
//! Both ledgers share one async writer lock: every mutation (including the
//! read-modify-write of a capped append) runs inside a transaction while the
//! lock is held, so writes are serialized across the whole store. Reads go
//! straight to the pool and see the last committed snapshot.

use std::sync::Arc;

use blackroad_core::error::CoreError;
use tokio::sync::Mutex;

use crate::DbPool;

pub mod operations;
pub mod transcripts;

pub use operations::OperationLedger;
pub use transcripts::TranscriptLedger;

/// Single-writer lock shared by every ledger over the same pool.
pub(crate) type WriteLock = Arc<Mutex<()>>;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Caller error; nothing was written.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store rejected the operation; the record is unchanged.
    #[error("Ledger unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// A domain error raised while preparing the write, kept as raised.
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            other @ (CoreError::NotFound { .. }
            | CoreError::Conflict(_)
            | CoreError::SourceNotFound(_)
            | CoreError::SourceFault(_)
            | CoreError::LedgerUnavailable(_)
            | CoreError::Internal(_)) => Self::Core(other),
        }
    }
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidArgument(msg) => CoreError::InvalidArgument(msg),
            LedgerError::Unavailable(e) => CoreError::LedgerUnavailable(e.to_string()),
            LedgerError::Core(core) => core,
        }
    }
}

/// Both ledgers over one pool and one writer lock.
#[derive(Clone)]
pub struct Ledgers {
    pub operations: OperationLedger,
    pub transcripts: TranscriptLedger,
}

impl Ledgers {
    /// Ledgers with the default byte caps.
    pub fn new(pool: DbPool) -> Self {
        Self::with_caps(
            pool,
            operations::DEFAULT_OUTPUT_CAP,
            transcripts::DEFAULT_TRANSCRIPT_CAP,
        )
    }

    pub fn with_caps(pool: DbPool, output_cap: usize, transcript_cap: usize) -> Self {
        let writer: WriteLock = Arc::new(Mutex::new(()));
        Self {
            operations: OperationLedger::with_writer(pool.clone(), writer.clone(), output_cap),
            transcripts: TranscriptLedger::with_writer(pool, writer, transcript_cap),
        }
    }
}

//! The operation ledger: one record per streamed or remote operation.

use std::sync::Arc;

use blackroad_core::text::append_capped;
use blackroad_core::types::DbId;
use blackroad_core::validation::validate_command;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{LedgerError, LedgerResult, WriteLock};
use crate::models::job::{Job, JobStatus};
use crate::repositories::JobRepo;
use crate::DbPool;

/// Default output cap: 256 KiB.
pub const DEFAULT_OUTPUT_CAP: usize = 256 * 1024;

/// Default page size for [`OperationLedger::list`].
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Maximum page size for [`OperationLedger::list`].
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct OperationLedger {
    pool: DbPool,
    writer: WriteLock,
    output_cap: usize,
}

impl OperationLedger {
    /// A standalone ledger with its own writer lock and the default cap.
    ///
    /// Prefer [`Ledgers::new`](super::Ledgers::new) when a transcript ledger
    /// shares the same pool.
    pub fn new(pool: DbPool) -> Self {
        Self::with_writer(pool, Arc::new(Mutex::new(())), DEFAULT_OUTPUT_CAP)
    }

    pub(crate) fn with_writer(pool: DbPool, writer: WriteLock, output_cap: usize) -> Self {
        Self {
            pool,
            writer,
            output_cap,
        }
    }

    pub fn with_output_cap(mut self, output_cap: usize) -> Self {
        self.output_cap = output_cap;
        self
    }

    pub fn output_cap(&self) -> usize {
        self.output_cap
    }

    /// Record a new running operation and return its id.
    pub async fn create(&self, command: &str) -> LedgerResult<DbId> {
        validate_command(command)?;

        let _guard = self.writer.lock().await;
        let id = JobRepo::insert(&self.pool, command, Utc::now()).await?;
        tracing::debug!(job_id = id, command, "Job created");
        Ok(id)
    }

    /// Append `chunk` to the job's output, keeping only the newest
    /// `output_cap` bytes.
    ///
    /// Unknown ids and empty chunks are silently ignored.
    pub async fn append_output(&self, id: DbId, chunk: &str) -> LedgerResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let _guard = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        let Some(current) = JobRepo::find_output(&mut *tx, id).await? else {
            return Ok(());
        };
        let updated = append_capped(&current, chunk, self.output_cap);
        JobRepo::set_output(&mut *tx, id, &updated).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Move the job to a terminal status and stamp its end time.
    ///
    /// Repeated calls overwrite the previous terminal state. Returns `false`
    /// when the id is unknown.
    pub async fn finish(
        &self,
        id: DbId,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> LedgerResult<bool> {
        if !status.is_terminal() {
            return Err(LedgerError::InvalidArgument(
                "finish requires a terminal status".into(),
            ));
        }

        let _guard = self.writer.lock().await;
        let found = JobRepo::finish(&self.pool, id, status, exit_code, Utc::now()).await?;
        if found {
            tracing::info!(job_id = id, %status, ?exit_code, "Job finished");
        }
        Ok(found)
    }

    pub async fn get(&self, id: DbId) -> LedgerResult<Option<Job>> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    /// Most recent jobs first. `limit` is clamped to `1..=MAX_LIST_LIMIT`.
    pub async fn list(&self, limit: i64) -> LedgerResult<Vec<Job>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        Ok(JobRepo::list_recent(&self.pool, limit).await?)
    }
}

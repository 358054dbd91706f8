//! The transcript ledger: rolling text buffers keyed by session id.

use std::sync::Arc;

use blackroad_core::text::append_capped;
use blackroad_core::validation::validate_session;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{LedgerResult, WriteLock};
use crate::models::transcript::Transcript;
use crate::repositories::TranscriptRepo;
use crate::DbPool;

/// Default transcript cap: 512 KiB.
pub const DEFAULT_TRANSCRIPT_CAP: usize = 512 * 1024;

#[derive(Clone)]
pub struct TranscriptLedger {
    pool: DbPool,
    writer: WriteLock,
    cap: usize,
}

impl TranscriptLedger {
    pub fn new(pool: DbPool) -> Self {
        Self::with_writer(pool, Arc::new(Mutex::new(())), DEFAULT_TRANSCRIPT_CAP)
    }

    pub(crate) fn with_writer(pool: DbPool, writer: WriteLock, cap: usize) -> Self {
        Self { pool, writer, cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Begin (or restart) a session with an empty buffer.
    pub async fn start(&self, session: &str) -> LedgerResult<()> {
        validate_session(session)?;

        let _guard = self.writer.lock().await;
        TranscriptRepo::reset(&self.pool, session, Utc::now()).await?;
        tracing::debug!(session, "Transcript started");
        Ok(())
    }

    /// Append with the ledger's configured cap.
    pub async fn append(&self, session: &str, chunk: &str) -> LedgerResult<()> {
        self.append_capped(session, chunk, self.cap).await
    }

    /// Append `chunk`, trimming the oldest bytes so the buffer stays within
    /// `max_bytes`. A cap of zero disables trimming. The session is created
    /// if it does not exist yet.
    pub async fn append_capped(
        &self,
        session: &str,
        chunk: &str,
        max_bytes: usize,
    ) -> LedgerResult<()> {
        validate_session(session)?;
        if chunk.is_empty() {
            return Ok(());
        }

        let _guard = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        TranscriptRepo::insert_if_missing(&mut *tx, session, Utc::now()).await?;
        let current = TranscriptRepo::find_text(&mut *tx, session)
            .await?
            .unwrap_or_default();
        let updated = append_capped(&current, chunk, max_bytes);
        TranscriptRepo::set_text(&mut *tx, session, &updated).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Stamp the session's end time. Unknown sessions are a no-op.
    pub async fn finish(&self, session: &str) -> LedgerResult<bool> {
        validate_session(session)?;

        let _guard = self.writer.lock().await;
        let found = TranscriptRepo::mark_ended(&self.pool, session, Utc::now()).await?;
        if found {
            tracing::debug!(session, "Transcript finished");
        }
        Ok(found)
    }

    pub async fn get(&self, session: &str) -> LedgerResult<Option<Transcript>> {
        validate_session(session)?;
        Ok(TranscriptRepo::find_by_session(&self.pool, session).await?)
    }
}

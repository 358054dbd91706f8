//! Repository for the `transcripts` table.

use blackroad_core::types::Timestamp;
use sqlx::SqliteExecutor;

use crate::models::transcript::Transcript;

/// Column list for `transcripts` queries.
const COLUMNS: &str = "session, started_at, ended_at, text";

pub struct TranscriptRepo;

impl TranscriptRepo {
    /// Create the session, or restart it with an empty buffer if it exists.
    ///
    /// A single upsert, so no reader ever observes the old text under the
    /// new start time.
    pub async fn reset(
        exec: impl SqliteExecutor<'_>,
        session: &str,
        started_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO transcripts (session, started_at, ended_at, text) \
             VALUES (?, ?, NULL, '') \
             ON CONFLICT(session) DO UPDATE SET \
                 started_at = excluded.started_at, \
                 ended_at = NULL, \
                 text = ''",
        )
        .bind(session)
        .bind(started_at)
        .execute(exec)
        .await?;
        Ok(())
    }

    /// Create an empty live session unless one already exists.
    pub async fn insert_if_missing(
        exec: impl SqliteExecutor<'_>,
        session: &str,
        started_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO transcripts (session, started_at, text) VALUES (?, ?, '') \
             ON CONFLICT(session) DO NOTHING",
        )
        .bind(session)
        .bind(started_at)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn find_text(
        exec: impl SqliteExecutor<'_>,
        session: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT text FROM transcripts WHERE session = ?")
            .bind(session)
            .fetch_optional(exec)
            .await
    }

    pub async fn set_text(
        exec: impl SqliteExecutor<'_>,
        session: &str,
        text: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE transcripts SET text = ? WHERE session = ?")
            .bind(text)
            .bind(session)
            .execute(exec)
            .await?;
        Ok(())
    }

    /// Stamp `ended_at`. Returns `false` when the session does not exist.
    pub async fn mark_ended(
        exec: impl SqliteExecutor<'_>,
        session: &str,
        ended_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE transcripts SET ended_at = ? WHERE session = ?")
            .bind(ended_at)
            .bind(session)
            .execute(exec)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_session(
        exec: impl SqliteExecutor<'_>,
        session: &str,
    ) -> Result<Option<Transcript>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transcripts WHERE session = ?");
        sqlx::query_as::<_, Transcript>(&query)
            .bind(session)
            .fetch_optional(exec)
            .await
    }
}

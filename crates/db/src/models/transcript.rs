//! Rolling transcript buffer keyed by a caller-supplied session id.

use blackroad_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `transcripts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transcript {
    pub session: String,
    pub started_at: Timestamp,
    /// `None` while the session is live.
    pub ended_at: Option<Timestamp>,
    pub text: String,
}

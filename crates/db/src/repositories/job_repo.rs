//! Repository for the `jobs` table.

use blackroad_core::types::{DbId, Timestamp};
use sqlx::SqliteExecutor;

use crate::models::job::{Job, JobStatus};

/// Column list for `jobs` queries.
const COLUMNS: &str = "id, command, started_at, ended_at, status, output, exit_code";

/// Raw row access for operation records.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new running job with empty output. Returns its id.
    pub async fn insert(
        exec: impl SqliteExecutor<'_>,
        command: &str,
        started_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO jobs (command, started_at, status, output) VALUES (?, ?, ?, '')",
        )
        .bind(command)
        .bind(started_at)
        .bind(JobStatus::Running.as_str())
        .execute(exec)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Current output buffer, or `None` when the job does not exist.
    pub async fn find_output(
        exec: impl SqliteExecutor<'_>,
        id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT output FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    /// Replace the output buffer.
    pub async fn set_output(
        exec: impl SqliteExecutor<'_>,
        id: DbId,
        output: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET output = ? WHERE id = ?")
            .bind(output)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    /// Write the terminal status, end time and exit code in one statement.
    ///
    /// Returns `false` when no row matched.
    pub async fn finish(
        exec: impl SqliteExecutor<'_>,
        id: DbId,
        status: JobStatus,
        exit_code: Option<i32>,
        ended_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE jobs SET status = ?, ended_at = ?, exit_code = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(ended_at)
                .bind(exit_code)
                .bind(id)
                .execute(exec)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(
        exec: impl SqliteExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    /// Most recent jobs first.
    pub async fn list_recent(
        exec: impl SqliteExecutor<'_>,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs ORDER BY id DESC LIMIT ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .fetch_all(exec)
            .await
    }
}

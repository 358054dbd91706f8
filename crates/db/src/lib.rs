//! SQLite persistence for the operation and transcript ledgers.
//!
//! [`create_pool`] opens (or creates) the database file in WAL mode so that
//! readers never wait on the single writer; [`run_migrations`] applies the
//! embedded schema under `migrations/`.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

pub mod ledger;
pub mod models;
pub mod repositories;

pub use ledger::{LedgerError, LedgerResult, Ledgers, OperationLedger, TranscriptLedger};

pub type DbPool = sqlx::SqlitePool;

/// How long a connection waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool from a `sqlite://` database URL.
///
/// The file is created when missing.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
}

/// Create a pool over a private in-memory database.
///
/// An in-memory database lives only as long as its connection, so the pool
/// holds exactly one connection and never recycles it.
pub async fn create_memory_pool() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations embedded at compile time.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Close every pooled connection, flushing the WAL.
pub async fn close(pool: &DbPool) {
    pool.close().await;
    tracing::info!("Database pool closed");
}

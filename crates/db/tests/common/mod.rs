use blackroad_db::{create_pool, run_migrations, DbPool};
use tempfile::TempDir;

/// A migrated database in a throwaway directory. Keep the `TempDir` alive
/// for as long as the pool is used.
pub async fn test_pool() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let pool = create_pool(&url).await.expect("open database");
    run_migrations(&pool).await.expect("run migrations");
    (pool, dir)
}

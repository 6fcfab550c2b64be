//! Connection pool management for SQLite via r2d2.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use recordstore_common::{Error, Result, StoreConfig};
use tempfile::TempDir;

use crate::error::map_pool;

const SCRATCH_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a database pool backed by the file named in `config`.
///
/// Creates the SQLite file if it does not exist. Every new connection gets
/// the configured busy timeout and journal mode, and enforces foreign keys.
///
/// r2d2 has no upper bound on idle connections, only a floor. `max_idle`
/// becomes that floor (capped at `max_open`): the pool opens that many
/// connections up front and keeps them, and idle connections above it are
/// closed once `idle_timeout` passes. With `idle_timeout_secs = 0` they are
/// kept until `max_lifetime`.
pub fn init_pool(config: &StoreConfig) -> Result<DbPool> {
    let busy_timeout = config.database.busy_timeout_ms;
    let journal_mode = config.database.journal_mode.clone();

    let manager = SqliteConnectionManager::file(&config.database.path).with_init(move |conn| {
        conn.busy_timeout(Duration::from_millis(busy_timeout))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.pragma_update_and_check(None, "journal_mode", journal_mode.as_str(), |_| Ok(()))
    });

    let pool_cfg = &config.pool;
    let max_size = pool_cfg.max_open.max(1);
    // r2d2 rejects zero durations; zero means "no limit" here.
    let non_zero = |d: Duration| (!d.is_zero()).then_some(d);

    Pool::builder()
        .max_size(max_size)
        .min_idle(Some(pool_cfg.max_idle.min(max_size)))
        .max_lifetime(non_zero(pool_cfg.max_lifetime()))
        .idle_timeout(non_zero(pool_cfg.idle_timeout()))
        .connection_timeout(non_zero(pool_cfg.connection_timeout()).unwrap_or(Duration::from_secs(30)))
        .build(manager)
        .map_err(|e| Error::ConnectionFailure(format!("Failed to create connection pool: {e}")))
}

/// Initialize a pool over a throwaway database (useful for tests).
///
/// The database is a WAL-mode file inside a fresh temporary directory, one
/// per call. Readers on other connections see the last committed state while
/// one connection holds a write transaction. The directory is removed when
/// the returned [`TempDir`] drops.
pub fn init_scratch_pool() -> Result<(DbPool, TempDir)> {
    let dir = tempfile::Builder::new().prefix("recordstore-").tempdir()?;
    let manager = SqliteConnectionManager::file(dir.path().join("scratch.db")).with_init(|conn| {
        conn.busy_timeout(Duration::from_millis(SCRATCH_BUSY_TIMEOUT_MS))?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = OFF;")?;
        conn.pragma_update_and_check(None, "journal_mode", "wal", |_| Ok(()))
    });

    let pool = Pool::builder()
        .max_size(4)
        .min_idle(Some(1))
        .build(manager)
        .map_err(|e| Error::ConnectionFailure(format!("Failed to create scratch pool: {e}")))?;
    Ok((pool, dir))
}

/// Convenience helper to get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get().map_err(map_pool)
}

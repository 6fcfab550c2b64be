//! Explicit transactions on a pinned pool connection.

use std::cell::Cell;

use crate::cancel::CancelToken;
use crate::error::map_sqlite;
use crate::pool::PooledConnection;
use crate::session::Session;
use crate::store::Db;
use recordstore_common::{Error, Result};

/// Lifecycle of a [`Tx`]. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// A transaction holding one pooled connection until it ends.
///
/// Every [`Db`] operation issued through a `Tx` runs on that connection. A
/// `Tx` dropped while still active rolls back, so an early return or a panic
/// never leaves work half-applied. `rollback` after `commit` is a no-op;
/// any other operation on an ended transaction fails with
/// [`Error::TransactionClosed`].
pub struct Tx {
    conn: PooledConnection,
    state: Cell<TxState>,
    cancel: Option<CancelToken>,
}

impl Tx {
    pub(crate) fn begin(conn: PooledConnection, cancel: Option<CancelToken>) -> Result<Self> {
        conn.execute_batch("BEGIN DEFERRED").map_err(map_sqlite)?;
        tracing::debug!("Transaction started");
        Ok(Self {
            conn,
            state: Cell::new(TxState::Active),
            cancel,
        })
    }

    pub fn state(&self) -> TxState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == TxState::Active
    }

    /// Make every write visible. Fails on an ended transaction; a failed
    /// commit leaves the transaction active so it can be rolled back.
    pub fn commit(&self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::TransactionClosed);
        }
        self.conn.execute_batch("COMMIT").map_err(map_sqlite)?;
        self.state.set(TxState::Committed);
        tracing::debug!("Transaction committed");
        Ok(())
    }

    /// Discard every write. Idempotent once the transaction has ended.
    pub fn rollback(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.state.set(TxState::RolledBack);
        // SQLite may already have rolled back on its own (e.g. after a
        // constraint failure with ON CONFLICT ROLLBACK).
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK").map_err(map_sqlite)?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

impl Db for Tx {
    fn session<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        if !self.is_active() {
            return Err(Error::TransactionClosed);
        }
        let session = Session::new(&self.conn, true, self.cancel.as_ref())?;
        f(&session)
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.rollback() {
                tracing::warn!("Failed to roll back abandoned transaction: {e}");
            }
        }
    }
}

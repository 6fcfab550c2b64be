//! The store handle and the operations every handle offers.

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::Row;
use tempfile::TempDir;

use crate::association::Association;
use crate::cancel::CancelToken;
use crate::filter::Changes;
use crate::pool::{self, get_conn, DbPool};
use crate::query::Query;
use crate::relation::{PreloadStep, Relation, SaveAssociation};
use crate::schema::{Entity, TableSchema};
use crate::session::{OnConflict, Session};
use crate::tx::Tx;
use recordstore_common::{Error, Result, StoreConfig};

/// Record store operations, shared by the pool-backed [`Store`] and by a
/// pinned [`Tx`].
///
/// Implementors provide [`Db::session`]; everything else runs on the session
/// it yields. See [`Session`] for the semantics of each operation.
pub trait Db {
    /// Run `f` on a session over this handle's connection.
    fn session<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T>;

    fn exec(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.session(|s| s.exec(sql, params))
    }

    fn raw<T>(
        &self,
        sql: &str,
        params: &[Value],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.session(|s| s.raw(sql, params, map))
    }

    fn raw_one<T>(
        &self,
        sql: &str,
        params: &[Value],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.session(|s| s.raw_one(sql, params, map))
    }

    fn insert<E: Entity>(&self, entity: &mut E) -> Result<usize> {
        self.session(|s| s.insert(entity))
    }

    fn insert_with<E: Entity>(&self, entity: &mut E, on_conflict: OnConflict) -> Result<usize> {
        self.session(|s| s.insert_with(entity, on_conflict))
    }

    fn insert_batch<E: Entity>(&self, entities: &mut [E]) -> Result<usize> {
        self.session(|s| s.insert_batch(entities))
    }

    fn insert_batch_with<E: Entity>(&self, entities: &mut [E], on_conflict: OnConflict) -> Result<usize> {
        self.session(|s| s.insert_batch_with(entities, on_conflict))
    }

    fn save<E: Entity>(&self, entity: &mut E) -> Result<usize> {
        self.session(|s| s.save(entity))
    }

    fn create_with<E: Entity>(&self, entity: &mut E, associations: &[&dyn SaveAssociation<E>]) -> Result<()> {
        self.session(|s| s.create_with(entity, associations))
    }

    fn find_all<E: Entity + 'static>(&self, query: &Query<E>) -> Result<Vec<E>> {
        self.session(|s| s.find_all(query))
    }

    fn find_one<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        self.session(|s| s.find_one(query))
    }

    fn first<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        self.session(|s| s.first(query))
    }

    fn last<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        self.session(|s| s.last(query))
    }

    fn find_columns<E: Entity + 'static, T>(
        &self,
        query: &Query<E>,
        columns: &[&str],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.session(|s| s.find_columns(query, columns, map))
    }

    fn count<E: Entity + 'static>(&self, query: &Query<E>) -> Result<i64> {
        self.session(|s| s.count(query))
    }

    fn aggregate<E: Entity + 'static, T>(
        &self,
        query: &Query<E>,
        expressions: &[&str],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.session(|s| s.aggregate(query, expressions, map))
    }

    fn update<E: Entity + 'static>(&self, query: &Query<E>, changes: &Changes) -> Result<usize> {
        self.session(|s| s.update(query, changes))
    }

    fn update_struct<E: Entity + 'static>(&self, query: &Query<E>, entity: &E) -> Result<usize> {
        self.session(|s| s.update_struct(query, entity))
    }

    fn update_entity<E: Entity + 'static>(&self, entity: &mut E, changes: &Changes) -> Result<usize> {
        self.session(|s| s.update_entity(entity, changes))
    }

    fn delete<E: Entity + 'static>(&self, query: &Query<E>) -> Result<usize> {
        self.session(|s| s.delete(query))
    }

    fn delete_entity<E: Entity + 'static>(&self, entity: &mut E) -> Result<usize> {
        self.session(|s| s.delete_entity(entity))
    }

    fn load<E: Entity + 'static>(&self, rows: &mut [E], step: &dyn PreloadStep<E>) -> Result<()> {
        self.session(|s| s.load(rows, step))
    }

    fn migrate(&self, schemas: &[&TableSchema]) -> Result<()> {
        self.session(|s| s.migrate(schemas))
    }

    /// Mutations on the link between `owner` and its `relation` children.
    fn association<P: Entity, C: Entity + 'static>(
        &self,
        owner: &P,
        relation: &'static Relation<P, C>,
    ) -> Association<'_, Self, P, C>
    where
        Self: Sized,
    {
        Association::new(self, owner, relation)
    }
}

/// A pool-backed store handle. Cloning shares the pool.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
    cancel: Option<CancelToken>,
    // Keeps a scratch database's directory alive while any clone exists.
    scratch: Option<Arc<TempDir>>,
}

impl Store {
    /// Open (creating if needed) the database named in `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        for warning in config.validate() {
            tracing::warn!("{warning}");
        }
        let store = Self::from_pool(pool::init_pool(config)?);
        tracing::info!(
            path = %config.database.path.display(),
            max_open = config.pool.max_open,
            "Record store opened"
        );
        Ok(store)
    }

    /// A private throwaway database shared by this handle's connections and
    /// removed when the last clone drops. See [`pool::init_scratch_pool`].
    pub fn open_temporary() -> Result<Self> {
        let (pool, dir) = pool::init_scratch_pool()?;
        Ok(Self {
            scratch: Some(Arc::new(dir)),
            ..Self::from_pool(pool)
        })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            pool,
            cancel: None,
            scratch: None,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// A handle whose operations observe `token`: once it is cancelled or its
    /// deadline passes, running statements are interrupted and new ones fail
    /// with [`Error::Cancelled`].
    pub fn with_cancel(&self, token: CancelToken) -> Self {
        Self {
            pool: self.pool.clone(),
            cancel: Some(token),
            scratch: self.scratch.clone(),
        }
    }

    /// Start a transaction on a dedicated connection.
    pub fn begin(&self) -> Result<Tx> {
        self.check_cancel()?;
        Tx::begin(get_conn(&self.pool)?, self.cancel.clone())
    }

    /// Run `f` in a transaction: committed when `f` returns `Ok`, rolled back
    /// when it returns `Err` or panics.
    pub fn transaction<T>(&self, f: impl FnOnce(&Tx) -> Result<T>) -> Result<T> {
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed after {e}: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Release this handle. Connections close once the last clone is gone.
    pub fn close(self) {
        let state = self.pool.state();
        tracing::debug!(
            connections = state.connections,
            idle = state.idle_connections,
            "Record store closed"
        );
    }

    fn check_cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

impl Db for Store {
    fn session<T>(&self, f: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        self.check_cancel()?;
        let conn = get_conn(&self.pool)?;
        let result = Session::new(&conn, false, self.cancel.as_ref()).and_then(|s| f(&s));
        if !conn.is_autocommit() {
            // Never hand a connection with an open transaction back to the pool.
            tracing::warn!("Connection returned with an open transaction; rolling back");
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback failed: {e}");
            }
        }
        result
    }
}

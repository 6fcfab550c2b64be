//! Statement execution on one borrowed connection.
//!
//! A [`Session`] is what every store operation runs against: the pool-backed
//! [`Store`](crate::Store) opens one per call on a freshly checked-out
//! connection, a [`Tx`](crate::Tx) opens one per call on its pinned
//! connection. Multi-statement operations run inside an atomic unit (a
//! savepoint) so they are all-or-nothing with or without an enclosing
//! transaction.

use std::time::Instant;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

use crate::cancel::CancelToken;
use crate::error::map_sqlite;
use crate::filter::{placeholders, qualify, Changes};
use crate::migrations;
use crate::query::Query;
use crate::relation::{PreloadStep, SaveAssociation};
use crate::schema::{is_zero, ColumnRole, Entity, TableSchema};
use recordstore_common::{Error, Result};

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
const MAX_PARAMS: usize = 32_766;

/// VM instructions between cancellation polls.
const PROGRESS_OPS: i32 = 1_000;

const SAVEPOINT: &str = "recordstore_atomic";

/// Conflict policy for inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Surface the constraint violation.
    #[default]
    Fail,
    /// Skip rows that conflict (`ON CONFLICT DO NOTHING`).
    Ignore,
    /// Overwrite every non-key column of the existing row.
    UpdateAll,
}

pub struct Session<'c> {
    conn: &'c Connection,
    in_tx: bool,
    cancel: Option<CancelToken>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(conn: &'c Connection, in_tx: bool, cancel: Option<&CancelToken>) -> Result<Self> {
        let session = Self {
            conn,
            in_tx,
            cancel: cancel.cloned(),
        };
        session.check_cancel()?;
        session.install_interrupt();
        Ok(session)
    }

    /// Whether this session runs inside an explicit transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn check_cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn install_interrupt(&self) {
        if let Some(token) = &self.cancel {
            let token = token.clone();
            self.conn
                .progress_handler(PROGRESS_OPS, Some(move || token.is_cancelled()));
        }
    }

    fn remove_interrupt(&self) {
        if self.cancel.is_some() {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }

    // -----------------------------------------------------------------------
    // Raw execution
    // -----------------------------------------------------------------------

    /// Execute one statement and return the number of rows it changed.
    pub fn exec(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.check_cancel()?;
        let started = Instant::now();
        match self.conn.execute(sql, params_from_iter(params)) {
            Ok(affected) => {
                log_statement(sql, started, affected);
                Ok(affected)
            }
            Err(e) => Err(self.fail(sql, started, e)),
        }
    }

    /// Run a query and map every row.
    pub fn raw<T>(
        &self,
        sql: &str,
        params: &[Value],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.check_cancel()?;
        let started = Instant::now();
        let result = self
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| {
                let rows = stmt
                    .query_map(params_from_iter(params), map)?
                    .collect::<rusqlite::Result<Vec<T>>>();
                rows
            });
        match result {
            Ok(rows) => {
                log_statement(sql, started, rows.len());
                Ok(rows)
            }
            Err(e) => Err(self.fail(sql, started, e)),
        }
    }

    /// Run a query expected to produce at least one row and map the first.
    pub fn raw_one<T>(
        &self,
        sql: &str,
        params: &[Value],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.raw(sql, params, map)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("row", sql))
    }

    fn exec_batch(&self, sql: &str) -> Result<()> {
        let started = Instant::now();
        self.conn
            .execute_batch(sql)
            .map_err(|e| self.fail(sql, started, e))?;
        log_statement(sql, started, 0);
        Ok(())
    }

    fn fail(&self, sql: &str, started: Instant, err: rusqlite::Error) -> Error {
        tracing::debug!(
            target: "recordstore::sql",
            elapsed_us = started.elapsed().as_micros() as u64,
            error = %err,
            "{sql}"
        );
        map_sqlite(err)
    }

    // -----------------------------------------------------------------------
    // Atomic units
    // -----------------------------------------------------------------------

    /// Run `f` inside a savepoint: released when `f` succeeds, rolled back
    /// when it fails or panics. Nests freely.
    pub fn atomic<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.exec_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
        let guard = Savepoint {
            session: self,
            done: false,
        };
        match f(self) {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            Err(e) => {
                guard.rollback();
                Err(e)
            }
        }
    }

    fn abandon_savepoint(&self) {
        // A cancelled token would interrupt the rollback itself.
        self.remove_interrupt();
        if let Err(e) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
        {
            tracing::warn!("Failed to roll back savepoint: {e}");
        }
        self.install_interrupt();
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert one entity with its create hooks. A zero auto-increment key is
    /// left to SQLite and written back.
    pub fn insert<E: Entity>(&self, entity: &mut E) -> Result<usize> {
        self.insert_with(entity, OnConflict::Fail)
    }

    pub fn insert_with<E: Entity>(&self, entity: &mut E, on_conflict: OnConflict) -> Result<usize> {
        self.atomic(|s| {
            entity.before_create()?;
            stamp(entity, now_millis());
            let affected = s.insert_row(entity, on_conflict)?;
            entity.after_create()?;
            Ok(affected)
        })
    }

    /// Insert every entity or none, in multi-row `VALUES` statements. When
    /// every key of an auto-keyed batch is zero the generated keys come back
    /// through `RETURNING`; a batch mixing given and generated keys, or one
    /// with a conflict policy, inserts row by row.
    pub fn insert_batch<E: Entity>(&self, entities: &mut [E]) -> Result<usize> {
        self.insert_batch_with(entities, OnConflict::Fail)
    }

    pub fn insert_batch_with<E: Entity>(
        &self,
        entities: &mut [E],
        on_conflict: OnConflict,
    ) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        self.atomic(|s| {
            let now = now_millis();
            for entity in entities.iter_mut() {
                entity.before_create()?;
                stamp(entity, now);
            }

            let schema = E::schema();
            let affected = if !schema.auto_key() {
                s.insert_values(entities, on_conflict)?
            } else if on_conflict == OnConflict::Fail
                && entities.iter().all(|e| is_zero(&e.key_value()))
            {
                s.insert_generated(entities)?
            } else {
                let mut affected = 0;
                for entity in entities.iter_mut() {
                    affected += s.insert_row(entity, on_conflict)?;
                }
                affected
            };

            for entity in entities.iter_mut() {
                entity.after_create()?;
            }
            Ok(affected)
        })
    }

    /// Upsert: insert, or overwrite every non-key column of the row with the
    /// same key. An auto-keyed entity with a zero key is always inserted.
    pub fn save<E: Entity>(&self, entity: &mut E) -> Result<usize> {
        self.atomic(|s| {
            entity.before_save()?;
            stamp(entity, now_millis());
            let on_conflict = if E::schema().auto_key() && is_zero(&entity.key_value()) {
                OnConflict::Fail
            } else {
                OnConflict::UpdateAll
            };
            let affected = s.insert_row(entity, on_conflict)?;
            entity.after_save()?;
            Ok(affected)
        })
    }

    /// Insert `entity`, then persist each listed association of it, all in
    /// one atomic unit.
    pub fn create_with<E: Entity>(
        &self,
        entity: &mut E,
        associations: &[&dyn SaveAssociation<E>],
    ) -> Result<()> {
        self.atomic(|s| {
            s.insert(entity)?;
            for association in associations {
                association.save_children(s, entity)?;
            }
            Ok(())
        })
    }

    fn insert_row<E: Entity>(&self, entity: &mut E, on_conflict: OnConflict) -> Result<usize> {
        let schema = E::schema();
        let key_index = schema.key_index();
        let generated = schema.auto_key() && is_zero(&entity.key_value());

        let mut columns = Vec::with_capacity(schema.columns.len());
        let mut params = Vec::with_capacity(schema.columns.len());
        for (i, (column, value)) in schema.columns.iter().zip(entity.values()).enumerate() {
            if generated && i == key_index {
                continue;
            }
            columns.push(column.name);
            params.push(value);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", schema.table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}){}",
                schema.table,
                columns.join(", "),
                placeholders(columns.len()),
                conflict_clause(schema, on_conflict)
            )
        };

        let affected = self.exec(&sql, &params)?;
        if generated && affected > 0 {
            let key = Value::Integer(self.conn.last_insert_rowid());
            entity.assign(schema.key_column(), &key);
        }
        Ok(affected)
    }

    /// Multi-row insert leaving every key to SQLite, writing the generated
    /// keys back in input order.
    fn insert_generated<E: Entity>(&self, entities: &mut [E]) -> Result<usize> {
        let schema = E::schema();
        let key_index = schema.key_index();
        let columns: Vec<&str> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_index)
            .map(|(_, c)| c.name)
            .collect();
        if columns.is_empty() {
            let mut affected = 0;
            for entity in entities.iter_mut() {
                affected += self.insert_row(entity, OnConflict::Fail)?;
            }
            return Ok(affected);
        }

        let per_statement = (MAX_PARAMS / columns.len()).max(1);
        let row = format!("({})", placeholders(columns.len()));
        let mut affected = 0;
        for chunk in entities.chunks_mut(per_statement) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {} RETURNING {}",
                schema.table,
                columns.join(", "),
                vec![row.as_str(); chunk.len()].join(", "),
                schema.key_column()
            );
            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|e| {
                    let mut values = e.values();
                    values.remove(key_index);
                    values
                })
                .collect();
            // Keys grow in VALUES order; RETURNING order is unspecified.
            let mut keys = self.raw(&sql, &params, |row| row.get::<_, i64>(0))?;
            keys.sort_unstable();
            for (entity, key) in chunk.iter_mut().zip(&keys) {
                entity.assign(schema.key_column(), &Value::Integer(*key));
            }
            affected += keys.len();
        }
        Ok(affected)
    }

    fn insert_values<E: Entity>(&self, entities: &[E], on_conflict: OnConflict) -> Result<usize> {
        let schema = E::schema();
        let width = schema.columns.len().max(1);
        let per_statement = (MAX_PARAMS / width).max(1);
        let columns = schema
            .columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ");
        let row = format!("({})", placeholders(width));

        let mut affected = 0;
        for chunk in entities.chunks(per_statement) {
            let sql = format!(
                "INSERT INTO {} ({columns}) VALUES {}{}",
                schema.table,
                vec![row.as_str(); chunk.len()].join(", "),
                conflict_clause(schema, on_conflict)
            );
            let params: Vec<Value> = chunk.iter().flat_map(|e| e.values()).collect();
            affected += self.exec(&sql, &params)?;
        }
        Ok(affected)
    }

    /// Set explicit columns on every row matching `query`. Zero values in
    /// `changes` are written as given.
    pub fn update<E: Entity + 'static>(&self, query: &Query<E>, changes: &Changes) -> Result<usize> {
        check_bulk_write(query, "update")?;
        if changes.is_empty() {
            return Err(Error::invalid("update with no columns to set"));
        }
        let schema = E::schema();
        if let Some((column, _)) = changes
            .iter()
            .find(|(column, _)| schema.primary_key.contains(column))
        {
            return Err(Error::invalid(format!(
                "primary key column {column} of {} cannot be updated",
                schema.table
            )));
        }
        let pairs = with_updated_at::<E>(changes.clone(), now_millis()).into_pairs();

        let sets = pairs
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = pairs.into_iter().map(|(_, v)| v).collect();
        let mut sql = format!("UPDATE {} SET {sets}", schema.table);
        query.render_where(&mut sql, &mut params);
        self.exec(&sql, &params)
    }

    /// Struct-shaped update: writes the non-zero columns of `entity` (key
    /// excluded) to every row matching `query`. Zero-valued fields are
    /// skipped, so they cannot be used to clear a column; use
    /// [`Session::update`] with [`Changes`] for that.
    pub fn update_struct<E: Entity + 'static>(&self, query: &Query<E>, entity: &E) -> Result<usize> {
        check_bulk_write(query, "update")?;
        let changes = Changes::from_entity(entity);
        if changes.is_empty() {
            return Ok(0);
        }
        self.update(query, &changes)
    }

    /// Update one loaded entity by key with its save hooks, and apply the
    /// changes to it in memory.
    pub fn update_entity<E: Entity + 'static>(&self, entity: &mut E, changes: &Changes) -> Result<usize> {
        let key = entity.key_value();
        if is_zero(&key) {
            return Err(Error::invalid(format!(
                "cannot update a {} without a primary key",
                E::schema().table
            )));
        }
        self.atomic(|s| {
            entity.before_save()?;
            let changes = with_updated_at::<E>(changes.clone(), now_millis());
            let affected = s.update(&Query::<E>::by_key(key), &changes)?;
            for (column, value) in changes.iter() {
                entity.assign(column, value);
            }
            entity.after_save()?;
            Ok(affected)
        })
    }

    /// Delete every row matching `query`: a tombstone update when the schema
    /// declares one, a physical delete otherwise or when `query` is unscoped.
    pub fn delete<E: Entity + 'static>(&self, query: &Query<E>) -> Result<usize> {
        self.delete_rows(query, now_millis())
    }

    /// Delete one loaded entity with its delete hooks. A tombstoned entity
    /// gets its marker set in memory.
    pub fn delete_entity<E: Entity + 'static>(&self, entity: &mut E) -> Result<usize> {
        let key = entity.key_value();
        if is_zero(&key) {
            return Err(Error::invalid(format!(
                "cannot delete a {} without a primary key",
                E::schema().table
            )));
        }
        self.atomic(|s| {
            entity.before_delete()?;
            let now = now_millis();
            let affected = s.delete_rows(&Query::<E>::by_key(key), now)?;
            if affected > 0 {
                if let Some(tombstone) = E::schema().tombstone() {
                    entity.assign(tombstone, &Value::Integer(now));
                }
            }
            entity.after_delete()?;
            Ok(affected)
        })
    }

    fn delete_rows<E: Entity + 'static>(&self, query: &Query<E>, now: i64) -> Result<usize> {
        check_bulk_write(query, "delete")?;
        let schema = E::schema();
        let mut params = Vec::new();
        let mut sql = match schema.tombstone() {
            Some(tombstone) if !query.is_unscoped() => {
                params.push(Value::Integer(now));
                format!("UPDATE {} SET {tombstone} = ?", schema.table)
            }
            _ => format!("DELETE FROM {}", schema.table),
        };
        query.render_where(&mut sql, &mut params);
        self.exec(&sql, &params)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All matching rows, with joins mapped and preloads resolved.
    pub fn find_all<E: Entity + 'static>(&self, query: &Query<E>) -> Result<Vec<E>> {
        self.fetch(query, None, None)
    }

    /// The first matching row in query order.
    pub fn find_one<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        self.fetch_single(query, None)
    }

    /// The matching row with the lowest key.
    pub fn first<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        let schema = E::schema();
        let order = format!("{}.{} ASC", schema.table, schema.key_column());
        self.fetch_single(query, Some(&order))
    }

    /// The matching row with the highest key.
    pub fn last<E: Entity + 'static>(&self, query: &Query<E>) -> Result<E> {
        let schema = E::schema();
        let order = format!("{}.{} DESC", schema.table, schema.key_column());
        self.fetch_single(query, Some(&order))
    }

    /// Selected columns only, mapped into any type. Bare column names are
    /// qualified with the entity's table.
    pub fn find_columns<E: Entity + 'static, T>(
        &self,
        query: &Query<E>,
        columns: &[&str],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        if query.lock {
            self.lock_rows(query)?;
        }
        let table = E::schema().table;
        let select = columns
            .iter()
            .map(|c| qualify(table, c))
            .collect::<Vec<_>>()
            .join(", ");
        let (sql, params) = query.select_sql(&select, None, None)?;
        self.raw(&sql, &params, map)
    }

    /// Number of rows (or groups) matching `query`; ordering and paging are
    /// ignored.
    pub fn count<E: Entity + 'static>(&self, query: &Query<E>) -> Result<i64> {
        let mut inner = String::from("SELECT 1");
        let mut params = Vec::new();
        query.render_from(&mut inner, &mut params)?;
        query.render_where(&mut inner, &mut params);
        query.render_grouping(&mut inner, &mut params);
        let sql = format!("SELECT COUNT(*) FROM ({inner})");
        self.raw_one(&sql, &params, |row| row.get(0))
    }

    /// Computed select expressions (`sum(balance)`, `max(...)`) over
    /// `query`, including its grouping and having clause.
    pub fn aggregate<E: Entity + 'static, T>(
        &self,
        query: &Query<E>,
        expressions: &[&str],
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        if expressions.is_empty() {
            return Err(Error::invalid("aggregate with no select expressions"));
        }
        let (sql, params) = query.select_sql(&expressions.join(", "), None, None)?;
        self.raw(&sql, &params, map)
    }

    /// Resolve a relation for rows that are already loaded.
    pub fn load<E: Entity + 'static>(&self, rows: &mut [E], step: &dyn PreloadStep<E>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut parents: Vec<&mut E> = rows.iter_mut().collect();
        step.load(self, &mut parents)
    }

    fn fetch_single<E: Entity + 'static>(&self, query: &Query<E>, order: Option<&str>) -> Result<E> {
        self.fetch(query, order, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(E::schema().table, query.describe()))
    }

    fn fetch<E: Entity + 'static>(
        &self,
        query: &Query<E>,
        order: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<E>> {
        if query.lock {
            self.lock_rows(query)?;
        }
        let (sql, params) = query.select_sql(&query.entity_select_list(), order, limit)?;
        let width = E::schema().columns.len();
        let mut rows = self.raw(&sql, &params, |row| {
            let mut entity = E::from_row(row, 0)?;
            let mut base = width;
            for join in &query.joins {
                join.attach_row(&mut entity, row, base)?;
                base += join.width();
            }
            Ok(entity)
        })?;

        if !rows.is_empty() {
            let mut parents: Vec<&mut E> = rows.iter_mut().collect();
            for step in &query.preloads {
                step.load(self, &mut parents)?;
            }
        }
        Ok(rows)
    }

    /// Take the write lock on the rows `query` selects by touching them. SQLite
    /// locks the whole database, so the lock is held until the enclosing
    /// transaction ends.
    fn lock_rows<E: Entity + 'static>(&self, query: &Query<E>) -> Result<()> {
        if !self.in_tx {
            return Err(Error::invalid("for_update requires a transaction"));
        }
        let schema = E::schema();
        let key = schema.key_column();
        let touch = schema
            .columns
            .iter()
            .find(|c| !schema.primary_key.contains(&c.name))
            .map_or(key, |c| c.name);
        let (select, params) = query.select_sql(&format!("{}.{key}", schema.table), None, None)?;
        let sql = format!(
            "UPDATE {} SET {touch} = {touch} WHERE {key} IN ({select})",
            schema.table
        );
        self.exec(&sql, &params)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Create missing tables and columns; see [`migrations::auto_migrate`].
    pub fn migrate(&self, schemas: &[&TableSchema]) -> Result<()> {
        self.atomic(|s| migrations::auto_migrate(s.conn, schemas))?;
        tracing::debug!(tables = schemas.len(), "Schema migrated");
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.remove_interrupt();
    }
}

/// Rolls the savepoint back unless it was released.
struct Savepoint<'s, 'c> {
    session: &'s Session<'c>,
    done: bool,
}

impl Savepoint<'_, '_> {
    fn release(mut self) -> Result<()> {
        let result = self.session.exec_batch(&format!("RELEASE {SAVEPOINT}"));
        self.done = result.is_ok();
        result
    }

    fn rollback(mut self) {
        self.done = true;
        self.session.abandon_savepoint();
    }
}

impl Drop for Savepoint<'_, '_> {
    fn drop(&mut self) {
        if !self.done {
            self.session.abandon_savepoint();
        }
    }
}

fn log_statement(sql: &str, started: Instant, rows: usize) {
    tracing::debug!(
        target: "recordstore::sql",
        elapsed_us = started.elapsed().as_micros() as u64,
        rows,
        "{sql}"
    );
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fill the timestamp columns the store manages.
fn stamp<E: Entity>(entity: &mut E, now: i64) {
    let schema = E::schema();
    let values = entity.values();
    let now = Value::Integer(now);
    for (column, value) in schema.columns.iter().zip(&values) {
        match column.role {
            ColumnRole::CreatedAt if is_zero(value) => entity.assign(column.name, &now),
            ColumnRole::UpdatedAt => entity.assign(column.name, &now),
            _ => {}
        }
    }
}

fn with_updated_at<E: Entity>(changes: Changes, now: i64) -> Changes {
    match E::schema()
        .columns
        .iter()
        .find(|c| c.role == ColumnRole::UpdatedAt)
    {
        Some(column) if !changes.contains(column.name) => changes.set(column.name, now),
        _ => changes,
    }
}

fn conflict_clause(schema: &TableSchema, on_conflict: OnConflict) -> String {
    match on_conflict {
        OnConflict::Fail => String::new(),
        OnConflict::Ignore => " ON CONFLICT DO NOTHING".to_string(),
        OnConflict::UpdateAll => {
            let sets: Vec<String> = schema
                .columns
                .iter()
                .filter(|c| !schema.primary_key.contains(&c.name) && c.role != ColumnRole::CreatedAt)
                .map(|c| format!("{0} = excluded.{0}", c.name))
                .collect();
            if sets.is_empty() {
                " ON CONFLICT DO NOTHING".to_string()
            } else {
                format!(
                    " ON CONFLICT({}) DO UPDATE SET {}",
                    schema.primary_key.join(", "),
                    sets.join(", ")
                )
            }
        }
    }
}

/// Bulk update/delete must name its rows and cannot go through joins.
fn check_bulk_write<E: Entity + 'static>(query: &Query<E>, op: &str) -> Result<()> {
    if query.has_joins() {
        return Err(Error::invalid(format!("{op} does not support joins")));
    }
    if !query.has_filters() && !query.allow_global {
        return Err(Error::invalid(format!(
            "{op} on {} without a filter; call allow_global() to affect every row",
            E::schema().table
        )));
    }
    Ok(())
}

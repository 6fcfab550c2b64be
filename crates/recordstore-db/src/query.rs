//! Query builder.
//!
//! A [`Query`] is a plain value describing what to read (or which rows to
//! update/delete). It holds no connection; any [`Db`](crate::Db) handle
//! executes it.

use rusqlite::types::Value;

use crate::filter::{Filter, IntoValue};
use crate::relation::{JoinStep, PreloadStep, Relation};
use crate::schema::Entity;
use recordstore_common::Result;

/// Filters, ordering, paging, joins and preloads for entity `E`.
pub struct Query<E: 'static> {
    pub(crate) filters: Vec<Filter>,
    pub(crate) order: Vec<String>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Option<Filter>,
    pub(crate) joins: Vec<Box<dyn JoinStep<E>>>,
    pub(crate) raw_joins: Vec<(String, Vec<Value>)>,
    pub(crate) preloads: Vec<Box<dyn PreloadStep<E>>>,
    pub(crate) unscoped: bool,
    pub(crate) lock: bool,
    pub(crate) allow_global: bool,
}

impl<E: Entity + 'static> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity + 'static> Query<E> {
    /// Every (non-tombstoned) row.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            group_by: Vec::new(),
            having: None,
            joins: Vec::new(),
            raw_joins: Vec::new(),
            preloads: Vec::new(),
            unscoped: false,
            lock: false,
            allow_global: false,
        }
    }

    /// Rows whose primary key equals `key`.
    pub fn by_key(key: impl IntoValue) -> Self {
        Self::new().filter(Filter::eq(E::schema().key_column(), key))
    }

    /// Rows matching `filter`; repeated calls are AND-ed.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Shorthand for `filter(Filter::raw(clause, params))`.
    pub fn where_raw(self, clause: impl Into<String>, params: Vec<Value>) -> Self {
        self.filter(Filter::raw(clause, params))
    }

    /// Everything filtered so far, OR `filter`.
    pub fn or(mut self, filter: Filter) -> Self {
        if self.filters.is_empty() {
            self.filters.push(filter);
        } else {
            let current = Filter::And(std::mem::take(&mut self.filters));
            self.filters.push(current.or(filter));
        }
        self
    }

    /// AND NOT `filter`.
    pub fn not(self, filter: Filter) -> Self {
        self.filter(filter.not())
    }

    /// Raw `ORDER BY` term such as `"id asc, first_name desc"`.
    pub fn order_by(mut self, term: impl Into<String>) -> Self {
        self.order.push(term.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn group_by(mut self, term: impl Into<String>) -> Self {
        self.group_by.push(term.into());
        self
    }

    pub fn having(mut self, filter: Filter) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// LEFT JOIN a singular relation aliased by its name and map the joined
    /// columns onto each row. Unmatched children come back absent; a
    /// has-many join yields one parent row per child.
    pub fn join<C: Entity + 'static>(mut self, relation: &'static Relation<E, C>) -> Self {
        self.joins.push(Box::new(relation));
        self
    }

    /// Caller-written join clause, e.g.
    /// `"JOIN wallets ON wallets.user_id = users.id AND wallets.balance > ?"`.
    /// Joined columns are not mapped.
    pub fn join_raw(mut self, clause: impl Into<String>, params: Vec<Value>) -> Self {
        self.raw_joins.push((clause.into(), params));
        self
    }

    /// Load a relation with a secondary batched query after the main read.
    pub fn preload(mut self, step: impl PreloadStep<E> + 'static) -> Self {
        self.preloads.push(Box::new(step));
        self
    }

    /// Preload every relation in [`Entity::relations`], one level deep.
    pub fn preload_all(mut self) -> Self {
        self.preloads.extend(E::relations());
        self
    }

    /// Include tombstoned rows; `delete` becomes a physical delete.
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    /// Hold a write lock on the selected rows until the enclosing
    /// transaction ends. Only valid inside a transaction.
    pub fn for_update(mut self) -> Self {
        self.lock = true;
        self
    }

    /// Permit `update`/`delete` with no filter at all.
    pub fn allow_global(mut self) -> Self {
        self.allow_global = true;
        self
    }

    /// Apply a reusable query fragment.
    pub fn scope(self, scope: impl FnOnce(Self) -> Self) -> Self {
        scope(self)
    }

    pub fn is_unscoped(&self) -> bool {
        self.unscoped
    }

    pub(crate) fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub(crate) fn has_joins(&self) -> bool {
        !self.joins.is_empty() || !self.raw_joins.is_empty()
    }

    /// Entity columns followed by every joined relation's columns.
    pub(crate) fn entity_select_list(&self) -> String {
        let schema = E::schema();
        let mut list = schema.select_list(schema.table);
        for join in &self.joins {
            list.push_str(", ");
            list.push_str(&join.select_list());
        }
        list
    }

    /// ` FROM table [joins]`.
    pub(crate) fn render_from(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<()> {
        let schema = E::schema();
        sql.push_str(" FROM ");
        sql.push_str(schema.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.clause(schema, self.unscoped)?);
        }
        for (clause, join_params) in &self.raw_joins {
            sql.push(' ');
            sql.push_str(clause);
            params.extend(join_params.iter().cloned());
        }
        Ok(())
    }

    /// ` WHERE ...` including the tombstone scope, or nothing.
    pub(crate) fn render_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        let schema = E::schema();
        let mut parts = self.filters.clone();
        if !self.unscoped {
            if let Some(tombstone) = schema.tombstone() {
                parts.push(Filter::Eq(vec![(tombstone.to_string(), Value::Null)]));
            }
        }
        if parts.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        Filter::And(parts).render(schema.table, sql, params);
    }

    /// ` GROUP BY ... HAVING ...`, or nothing.
    pub(crate) fn render_grouping(&self, sql: &mut String, params: &mut Vec<Value>) {
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            having.render(E::schema().table, sql, params);
        }
    }

    /// Grouping followed by ` ORDER BY ... LIMIT ... OFFSET ...`.
    pub(crate) fn render_tail(
        &self,
        sql: &mut String,
        params: &mut Vec<Value>,
        extra_order: Option<&str>,
        limit: Option<i64>,
    ) {
        self.render_grouping(sql, params);
        let mut order: Vec<&str> = self.order.iter().map(String::as_str).collect();
        if let Some(extra) = extra_order {
            order.push(extra);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        match (limit.or(self.limit), self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
    }

    /// A full `SELECT` with the given select list.
    pub(crate) fn select_sql(
        &self,
        select: &str,
        extra_order: Option<&str>,
        limit: Option<i64>,
    ) -> Result<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {select}");
        let mut params = Vec::new();
        self.render_from(&mut sql, &mut params)?;
        self.render_where(&mut sql, &mut params);
        self.render_tail(&mut sql, &mut params, extra_order, limit);
        Ok((sql, params))
    }

    /// Human-readable filter description for `NotFound` errors.
    pub(crate) fn describe(&self) -> String {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_where(&mut sql, &mut params);
        if sql.is_empty() {
            return "any row".to_string();
        }
        format!("{} {params:?}", sql.trim_start().trim_start_matches("WHERE "))
    }
}

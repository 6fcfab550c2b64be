//! Typed relation descriptors and the strategies that load and persist them.
//!
//! A [`Relation`] names the link between a parent and a child entity and
//! carries two plain functions: one that attaches loaded children to a
//! parent, one that hands out the children a parent currently holds. Loading
//! goes through [`PreloadStep`] (a batched secondary query) or [`JoinStep`]
//! (a left join on the primary query); persisting goes through
//! [`SaveAssociation`].

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::Row;

use crate::filter::Filter;
use crate::query::Query;
use crate::schema::{distinct_keys, is_zero, Entity, KeyValue, TableSchema};
use crate::session::{OnConflict, Session};
use recordstore_common::{Error, Result};

/// Parent keys per preload query.
const KEY_BATCH: usize = 500;

/// How parent and child rows are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `child.foreign_key = parent.key`, at most one child.
    HasOne { foreign_key: &'static str },
    /// `child.foreign_key = parent.key`.
    HasMany { foreign_key: &'static str },
    /// `parent.foreign_key = child.key`.
    BelongsTo { foreign_key: &'static str },
    /// Rows of `join_table` pair `owner_key = parent.key` with
    /// `related_key = child.key`.
    ManyToMany {
        join_table: &'static str,
        owner_key: &'static str,
        related_key: &'static str,
    },
}

/// A declared relation from `P` to `C`.
pub struct Relation<P: 'static, C: 'static> {
    /// Join alias and display name, e.g. `"Wallet"`.
    pub name: &'static str,
    pub kind: RelationKind,
    /// Store loaded children on the parent. Singular relations keep the
    /// first child; an empty vector means "none".
    pub attach: fn(&mut P, Vec<C>),
    /// Children the parent currently holds in memory.
    pub loaded: fn(&mut P) -> Vec<&mut C>,
}

impl<P: Entity, C: Entity + 'static> Relation<P, C> {
    /// Value on the parent that child rows are matched against.
    pub(crate) fn parent_link(&self, parent: &P) -> Value {
        match self.kind {
            RelationKind::BelongsTo { foreign_key } => {
                parent.column_value(foreign_key).unwrap_or(Value::Null)
            }
            _ => parent.key_value(),
        }
    }

    /// Children linked to any of `links`, plus the expression that yields
    /// each child's link value.
    pub(crate) fn related_query(&self, links: Vec<Value>) -> (Query<C>, String) {
        let child = C::schema();
        let mut query = Query::<C>::new();
        let link = match self.kind {
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                format!("{}.{foreign_key}", child.table)
            }
            RelationKind::BelongsTo { .. } => format!("{}.{}", child.table, child.key_column()),
            RelationKind::ManyToMany {
                join_table,
                owner_key,
                related_key,
            } => {
                query = query.join_raw(
                    format!(
                        "JOIN {join_table} ON {join_table}.{related_key} = {}.{}",
                        child.table,
                        child.key_column()
                    ),
                    Vec::new(),
                );
                format!("{join_table}.{owner_key}")
            }
        };
        (query.filter(Filter::is_in(link.clone(), links)), link)
    }

    /// Fetch `(link value, child)` pairs for the given link values.
    pub(crate) fn fetch(
        &self,
        session: &Session<'_>,
        links: &[Value],
        condition: Option<&Filter>,
    ) -> Result<Vec<(Value, C)>> {
        let child = C::schema();
        let order = format!("{}.{}", child.table, child.key_column());
        let mut out = Vec::new();
        for chunk in links.chunks(KEY_BATCH) {
            let (mut query, link) = self.related_query(chunk.to_vec());
            if let Some(condition) = condition {
                query = query.filter(condition.clone());
            }
            let select = format!("{link}, {}", child.select_list(child.table));
            let (sql, params) = query.select_sql(&select, Some(&order), None)?;
            out.extend(session.raw(&sql, &params, |row| {
                Ok((row.get::<_, Value>(0)?, C::from_row(row, 1)?))
            })?);
        }
        Ok(out)
    }

    /// Batched load of this relation for every parent, resolving `nested`
    /// steps on the fetched children before they are attached.
    fn preload(
        &self,
        session: &Session<'_>,
        parents: &mut [&mut P],
        condition: Option<&Filter>,
        nested: &[Box<dyn PreloadStep<C>>],
    ) -> Result<()> {
        let links: Vec<Value> = parents.iter().map(|p| self.parent_link(p)).collect();
        let keys = distinct_keys(links.iter().cloned());
        let mut fetched = if keys.is_empty() {
            Vec::new()
        } else {
            self.fetch(session, &keys, condition)?
        };

        if !fetched.is_empty() {
            let mut children: Vec<&mut C> = fetched.iter_mut().map(|(_, c)| c).collect();
            for step in nested {
                step.load(session, &mut children)?;
            }
        }

        let mut grouped: HashMap<KeyValue, Vec<C>> = HashMap::new();
        for (link, child) in fetched {
            if let Some(key) = KeyValue::of(&link) {
                grouped.entry(key).or_default().push(child);
            }
        }
        for (parent, link) in parents.iter_mut().zip(&links) {
            let children = KeyValue::of(link)
                .and_then(|k| grouped.get(&k))
                .cloned()
                .unwrap_or_default();
            (self.attach)(&mut **parent, children);
        }
        tracing::debug!(relation = self.name, parents = parents.len(), "Preloaded relation");
        Ok(())
    }

    fn quoted_alias(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

// ---------------------------------------------------------------------------
// Preload
// ---------------------------------------------------------------------------

/// One relation load over a set of already-fetched parents.
pub trait PreloadStep<P> {
    fn load(&self, session: &Session<'_>, parents: &mut [&mut P]) -> Result<()>;
}

impl<P: Entity, C: Entity + 'static> PreloadStep<P> for &'static Relation<P, C> {
    fn load(&self, session: &Session<'_>, parents: &mut [&mut P]) -> Result<()> {
        self.preload(session, parents, None, &[])
    }
}

/// A relation preload with an optional condition on the children and
/// further steps to run on them.
///
/// ```no_run
/// # use recordstore_db::models::{WALLET_USER, USER_ADDRESSES};
/// # use recordstore_db::Preload;
/// // wallet -> user -> addresses
/// let step = Preload::new(&WALLET_USER).then(&USER_ADDRESSES);
/// ```
pub struct Preload<P: 'static, C: 'static> {
    relation: &'static Relation<P, C>,
    condition: Option<Filter>,
    nested: Vec<Box<dyn PreloadStep<C>>>,
}

impl<P: Entity, C: Entity + 'static> Preload<P, C> {
    pub fn new(relation: &'static Relation<P, C>) -> Self {
        Self {
            relation,
            condition: None,
            nested: Vec::new(),
        }
    }

    /// Only attach children matching `condition`.
    pub fn filter(mut self, condition: Filter) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Load `step` on the children of this relation.
    pub fn then(mut self, step: impl PreloadStep<C> + 'static) -> Self {
        self.nested.push(Box::new(step));
        self
    }
}

impl<P: Entity, C: Entity + 'static> PreloadStep<P> for Preload<P, C> {
    fn load(&self, session: &Session<'_>, parents: &mut [&mut P]) -> Result<()> {
        self.relation
            .preload(session, parents, self.condition.as_ref(), &self.nested)
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// A relation loaded through a `LEFT JOIN` on the primary query.
pub trait JoinStep<P> {
    fn alias(&self) -> &'static str;

    /// The join clause against `parent`.
    fn clause(&self, parent: &TableSchema, unscoped: bool) -> Result<String>;

    /// Child columns, aliased.
    fn select_list(&self) -> String;

    /// Number of columns `select_list` contributes.
    fn width(&self) -> usize;

    /// Map the child columns starting at `base` and attach them. A NULL
    /// child key (no match) attaches nothing.
    fn attach_row(&self, parent: &mut P, row: &Row<'_>, base: usize) -> rusqlite::Result<()>;
}

impl<P: Entity, C: Entity + 'static> JoinStep<P> for &'static Relation<P, C> {
    fn alias(&self) -> &'static str {
        self.name
    }

    fn clause(&self, parent: &TableSchema, unscoped: bool) -> Result<String> {
        let child = C::schema();
        let alias = self.quoted_alias();
        let on = match self.kind {
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                format!("{alias}.{foreign_key} = {}.{}", parent.table, parent.key_column())
            }
            RelationKind::BelongsTo { foreign_key } => {
                format!("{alias}.{} = {}.{foreign_key}", child.key_column(), parent.table)
            }
            RelationKind::ManyToMany { .. } => {
                return Err(Error::invalid(format!(
                    "many-to-many relation {} cannot be joined; preload it instead",
                    self.name
                )));
            }
        };
        let mut clause = format!("LEFT JOIN {} AS {alias} ON {on}", child.table);
        if !unscoped {
            if let Some(tombstone) = child.tombstone() {
                clause.push_str(&format!(" AND {alias}.{tombstone} IS NULL"));
            }
        }
        Ok(clause)
    }

    fn select_list(&self) -> String {
        C::schema().select_list(&self.quoted_alias())
    }

    fn width(&self) -> usize {
        C::schema().columns.len()
    }

    fn attach_row(&self, parent: &mut P, row: &Row<'_>, base: usize) -> rusqlite::Result<()> {
        let key: Value = row.get(base + C::schema().key_index())?;
        let children = if matches!(key, Value::Null) {
            Vec::new()
        } else {
            vec![C::from_row(row, base)?]
        };
        (self.attach)(parent, children);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Persist the in-memory children of a freshly saved parent.
pub trait SaveAssociation<P> {
    fn save_children(&self, session: &Session<'_>, parent: &mut P) -> Result<()>;
}

impl<P: Entity, C: Entity + 'static> SaveAssociation<P> for Relation<P, C> {
    fn save_children(&self, session: &Session<'_>, parent: &mut P) -> Result<()> {
        let parent_key = parent.key_value();
        if is_zero(&parent_key) {
            return Err(Error::invalid(format!(
                "cannot save {} for a parent without a key",
                self.name
            )));
        }
        match self.kind {
            RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                for child in (self.loaded)(parent) {
                    child.assign(foreign_key, &parent_key);
                    session.save(child)?;
                }
            }
            RelationKind::ManyToMany { .. } => {
                for child in (self.loaded)(parent) {
                    session.insert_with(child, OnConflict::Ignore)?;
                    self.link(session, &parent_key, &child.key_value())?;
                }
            }
            RelationKind::BelongsTo { .. } => {
                return Err(Error::invalid(format!(
                    "belongs-to relation {} is saved before its owner, not after",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl<P: Entity, C: Entity + 'static> Relation<P, C> {
    /// Insert one join-table row; an existing pair is left alone.
    pub(crate) fn link(&self, session: &Session<'_>, owner: &Value, related: &Value) -> Result<usize> {
        let RelationKind::ManyToMany {
            join_table,
            owner_key,
            related_key,
        } = self.kind
        else {
            return Err(Error::invalid(format!("{} has no join table", self.name)));
        };
        session.exec(
            &format!("INSERT OR IGNORE INTO {join_table} ({owner_key}, {related_key}) VALUES (?, ?)"),
            &[owner.clone(), related.clone()],
        )
    }

    /// Delete join-table rows of `owner`: all of them, only those pointing at
    /// `related`, or all except those.
    pub(crate) fn unlink(
        &self,
        session: &Session<'_>,
        owner: &Value,
        related: Option<&[Value]>,
        keep: bool,
    ) -> Result<usize> {
        let RelationKind::ManyToMany {
            join_table,
            owner_key,
            related_key,
        } = self.kind
        else {
            return Err(Error::invalid(format!("{} has no join table", self.name)));
        };
        let mut filter = Filter::eq(owner_key, owner);
        if let Some(related) = related {
            let listed = Filter::is_in(related_key, related.iter().cloned());
            filter = filter.and(if keep { listed.not() } else { listed });
        }
        let mut sql = format!("DELETE FROM {join_table} WHERE ");
        let mut params = Vec::new();
        filter.render(join_table, &mut sql, &mut params);
        session.exec(&sql, &params)
    }
}

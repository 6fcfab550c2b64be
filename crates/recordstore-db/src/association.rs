//! Mutations on the link between one owner and a relation's children.
//!
//! Has-one and has-many links live in the child's foreign key, many-to-many
//! links in the join table, belongs-to links in the owner's own foreign key.
//! Every mutation runs in one atomic unit. Detaching a child whose foreign
//! key is `NOT NULL` is refused with a not-null constraint violation before
//! anything is written.

use rusqlite::types::Value;

use crate::filter::{Changes, Filter};
use crate::query::Query;
use crate::relation::{Relation, RelationKind};
use crate::schema::{distinct_keys, is_zero, Entity};
use crate::session::{OnConflict, Session};
use crate::store::Db;
use recordstore_common::{ConstraintKind, Error, Result};

/// Which linked children a detach applies to.
#[derive(Clone, Copy)]
enum Scope<'k> {
    All,
    Only(&'k [Value]),
    AllExcept(&'k [Value]),
}

pub struct Association<'a, D, P: 'static, C: 'static> {
    db: &'a D,
    relation: &'static Relation<P, C>,
    owner_key: Value,
    owner_link: Value,
}

impl<'a, D: Db, P: Entity, C: Entity + 'static> Association<'a, D, P, C> {
    pub(crate) fn new(db: &'a D, owner: &P, relation: &'static Relation<P, C>) -> Self {
        Self {
            db,
            relation,
            owner_key: owner.key_value(),
            owner_link: relation.parent_link(owner),
        }
    }

    /// Children currently linked to the owner, optionally filtered.
    pub fn find(&self, condition: Option<Filter>) -> Result<Vec<C>> {
        if is_zero(&self.owner_link) {
            return Ok(Vec::new());
        }
        let links = [self.owner_link.clone()];
        self.db.session(|s| {
            let rows = self.relation.fetch(s, &links, condition.as_ref())?;
            Ok(rows.into_iter().map(|(_, child)| child).collect())
        })
    }

    pub fn count(&self) -> Result<i64> {
        if is_zero(&self.owner_link) {
            return Ok(0);
        }
        let (query, _) = self.relation.related_query(vec![self.owner_link.clone()]);
        self.db.count(&query)
    }

    /// Link `children` to the owner, saving them first. A has-one or
    /// belongs-to relation holds a single child, so appending replaces it.
    pub fn append(&self, children: &mut [C]) -> Result<()> {
        let owner = self.owner()?;
        self.db.session(|s| {
            s.atomic(|s| match self.relation.kind {
                RelationKind::HasOne { foreign_key } => {
                    self.relink(s, foreign_key, &owner, children, true)
                }
                RelationKind::HasMany { foreign_key } => {
                    self.relink(s, foreign_key, &owner, children, false)
                }
                RelationKind::ManyToMany { .. } => {
                    for child in children.iter_mut() {
                        s.insert_with(child, OnConflict::Ignore)?;
                        self.relation.link(s, &owner, &child.key_value())?;
                    }
                    Ok(())
                }
                RelationKind::BelongsTo { foreign_key } => {
                    self.set_owner_link(s, foreign_key, &owner, children)
                }
            })
        })
    }

    /// Make `children` the complete set linked to the owner; every other
    /// linked child is detached.
    pub fn replace(&self, children: &mut [C]) -> Result<()> {
        let owner = self.owner()?;
        self.db.session(|s| {
            s.atomic(|s| match self.relation.kind {
                RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                    self.relink(s, foreign_key, &owner, children, true)
                }
                RelationKind::ManyToMany { .. } => {
                    for child in children.iter_mut() {
                        s.insert_with(child, OnConflict::Ignore)?;
                    }
                    let keep = child_keys(children);
                    self.relation.unlink(s, &owner, Some(&keep), true)?;
                    for key in &keep {
                        self.relation.link(s, &owner, key)?;
                    }
                    Ok(())
                }
                RelationKind::BelongsTo { foreign_key } => {
                    self.set_owner_link(s, foreign_key, &owner, children)
                }
            })
        })
    }

    /// Unlink `children` from the owner. The children themselves stay.
    pub fn delete(&self, children: &[C]) -> Result<usize> {
        let keys = child_keys(children);
        if keys.is_empty() {
            return Ok(0);
        }
        self.unlink_scoped(Scope::Only(&keys))
    }

    /// Unlink every child from the owner. The children themselves stay.
    pub fn clear(&self) -> Result<usize> {
        self.unlink_scoped(Scope::All)
    }

    fn owner(&self) -> Result<Value> {
        if is_zero(&self.owner_key) {
            return Err(Error::invalid(format!(
                "association {} needs an owner with a primary key",
                self.relation.name
            )));
        }
        Ok(self.owner_key.clone())
    }

    fn unlink_scoped(&self, scope: Scope<'_>) -> Result<usize> {
        let owner = self.owner()?;
        self.db.session(|s| {
            s.atomic(|s| match self.relation.kind {
                RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                    self.detach(s, foreign_key, &owner, scope)
                }
                RelationKind::ManyToMany { .. } => match scope {
                    Scope::All => self.relation.unlink(s, &owner, None, false),
                    Scope::Only(keys) => self.relation.unlink(s, &owner, Some(keys), false),
                    Scope::AllExcept(keys) => self.relation.unlink(s, &owner, Some(keys), true),
                },
                RelationKind::BelongsTo { foreign_key } => {
                    self.clear_owner_link(s, foreign_key, &owner, scope)
                }
            })
        })
    }

    /// Save `children` with their foreign key pointing at the owner. With
    /// `exclusive`, every other child is detached first.
    fn relink(
        &self,
        s: &Session<'_>,
        foreign_key: &str,
        owner: &Value,
        children: &mut [C],
        exclusive: bool,
    ) -> Result<()> {
        if exclusive {
            let keep = child_keys(children);
            self.detach(s, foreign_key, owner, Scope::AllExcept(&keep))?;
        }
        for child in children.iter_mut() {
            child.assign(foreign_key, owner);
            s.save(child)?;
        }
        Ok(())
    }

    /// Null the foreign key of linked children in `scope`.
    fn detach(&self, s: &Session<'_>, foreign_key: &str, owner: &Value, scope: Scope<'_>) -> Result<usize> {
        let schema = C::schema();
        let key = schema.key_column();
        let mut filter = Filter::eq(foreign_key, owner);
        match scope {
            Scope::All => {}
            Scope::Only(keys) => filter = filter.and(Filter::is_in(key, keys.iter().cloned())),
            Scope::AllExcept(keys) if keys.is_empty() => {}
            Scope::AllExcept(keys) => {
                filter = filter.and(Filter::is_in(key, keys.iter().cloned()).not());
            }
        }
        let query = Query::<C>::new().filter(filter);

        if schema.column(foreign_key).is_some_and(|c| c.not_null) {
            let linked = s.count(&query)?;
            if linked > 0 {
                return Err(Error::constraint(
                    ConstraintKind::NotNull,
                    format!(
                        "{}.{foreign_key} is NOT NULL; {linked} row(s) cannot be detached from {}",
                        schema.table, self.relation.name
                    ),
                ));
            }
            return Ok(0);
        }
        s.update(&query, &Changes::new().set_null(foreign_key))
    }

    /// Point the owner's foreign key at the single child, saving it first.
    fn set_owner_link(
        &self,
        s: &Session<'_>,
        foreign_key: &str,
        owner: &Value,
        children: &mut [C],
    ) -> Result<()> {
        let [child] = children else {
            return Err(Error::invalid(format!(
                "belongs-to relation {} takes exactly one child, got {}",
                self.relation.name,
                children.len()
            )));
        };
        s.save(child)?;
        let changes = Changes::new().set(foreign_key, child.key_value());
        s.update(&Query::<P>::by_key(owner), &changes)?;
        Ok(())
    }

    fn clear_owner_link(
        &self,
        s: &Session<'_>,
        foreign_key: &str,
        owner: &Value,
        scope: Scope<'_>,
    ) -> Result<usize> {
        let schema = P::schema();
        let mut query = Query::<P>::by_key(owner);
        match scope {
            Scope::All => {}
            Scope::Only(keys) => query = query.filter(Filter::is_in(foreign_key, keys.iter().cloned())),
            Scope::AllExcept(keys) => {
                query = query.filter(Filter::is_in(foreign_key, keys.iter().cloned()).not());
            }
        }
        if schema.column(foreign_key).is_some_and(|c| c.not_null) {
            return Err(Error::constraint(
                ConstraintKind::NotNull,
                format!("{}.{foreign_key} is NOT NULL and cannot be cleared", schema.table),
            ));
        }
        s.update(&query, &Changes::new().set_null(foreign_key))
    }
}

fn child_keys<C: Entity>(children: &[C]) -> Vec<Value> {
    distinct_keys(children.iter().map(Entity::key_value))
}

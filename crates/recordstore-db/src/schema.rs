//! Static table descriptors and the [`Entity`] mapping trait.
//!
//! A [`TableSchema`] is an ordered list of [`Column`]s. An entity exposes its
//! column values in exactly that order through [`Entity::values`] and is
//! rebuilt from a row in the same order through [`Entity::from_row`]. The
//! store never discovers fields on its own.

use std::collections::HashMap;

use recordstore_common::Result;
use rusqlite::types::Value;
use rusqlite::Row;

use crate::relation::PreloadStep;

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    /// Literal used as the default when a NOT NULL column is added to an
    /// existing table.
    fn zero_literal(self) -> &'static str {
        match self {
            SqlType::Text => "''",
            SqlType::Integer => "0",
            SqlType::Real => "0.0",
            SqlType::Blob => "x''",
        }
    }
}

/// How a zero value (`0`, `""`, `NULL`) is treated by struct-shaped
/// conditions and updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPolicy {
    /// Zero means "not provided" and the column is left out.
    Skip,
    /// Zero is a real value and is always written or matched.
    Keep,
}

/// Columns the store fills in itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Data,
    /// Set on insert when zero.
    CreatedAt,
    /// Set on every insert, save and update.
    UpdatedAt,
    /// Soft-delete marker; rows with a non-NULL value are hidden.
    Tombstone,
}

/// One column of a table.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<&'static str>,
    pub references: Option<(&'static str, &'static str)>,
    pub zero: ZeroPolicy,
    pub role: ColumnRole,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            auto_increment: false,
            not_null: false,
            unique: false,
            default: None,
            references: None,
            zero: ZeroPolicy::Skip,
            role: ColumnRole::Data,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, SqlType::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, SqlType::Integer)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::new(name, SqlType::Real)
    }

    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            not_null: true,
            ..self
        }
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`; a zero key is left for SQLite
    /// to assign.
    pub const fn auto_increment(self) -> Self {
        Self {
            primary_key: true,
            auto_increment: true,
            not_null: true,
            ..self
        }
    }

    pub const fn not_null(self) -> Self {
        Self {
            not_null: true,
            ..self
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn default_sql(self, literal: &'static str) -> Self {
        Self {
            default: Some(literal),
            ..self
        }
    }

    pub const fn references(self, table: &'static str, column: &'static str) -> Self {
        Self {
            references: Some((table, column)),
            ..self
        }
    }

    pub const fn keep_zero(self) -> Self {
        Self {
            zero: ZeroPolicy::Keep,
            ..self
        }
    }

    pub const fn role(self, role: ColumnRole) -> Self {
        Self { role, ..self }
    }

    /// Column definition as used inside `CREATE TABLE`.
    pub(crate) fn ddl(&self, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if inline_primary_key && self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            } else {
                // SQLite accepts NULL in a non-integer primary key otherwise.
                sql.push_str(" NOT NULL");
            }
        } else if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some((table, column)) = self.references {
            sql.push_str(&format!(" REFERENCES {table}({column})"));
        }
        sql
    }

    /// Column definition for `ALTER TABLE ... ADD COLUMN`, which SQLite
    /// restricts: no key or unique constraint, NOT NULL only with a default,
    /// and a REFERENCES column must default to NULL.
    pub(crate) fn add_column_ddl(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if let Some((table, column)) = self.references {
            sql.push_str(&format!(" REFERENCES {table}({column})"));
            return sql;
        }
        if self.not_null {
            sql.push_str(" NOT NULL DEFAULT ");
            sql.push_str(self.default.unwrap_or(self.sql_type.zero_literal()));
        } else if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// A table: its name, ordered columns and primary key.
#[derive(Debug)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: &'static [Column],
    /// Primary key column names. Entities use a single-column key; join
    /// tables may declare a composite one.
    pub primary_key: &'static [&'static str],
}

impl TableSchema {
    /// The (first) primary key column.
    pub fn key_column(&self) -> &'static str {
        self.primary_key.first().copied().unwrap_or("rowid")
    }

    pub fn key_index(&self) -> usize {
        self.column_index(self.key_column()).unwrap_or(0)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the key is assigned by SQLite.
    pub fn auto_key(&self) -> bool {
        self.column(self.key_column())
            .is_some_and(|c| c.auto_increment)
    }

    pub fn tombstone(&self) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::Tombstone)
            .map(|c| c.name)
    }

    /// `alias.col1, alias.col2, ...` in schema order.
    pub fn select_list(&self, alias: &str) -> String {
        self.columns
            .iter()
            .map(|c| format!("{alias}.{}", c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A Rust type stored as one row of a [`TableSchema`].
///
/// Lifecycle hooks run inside the same atomic unit as the statement they
/// surround; returning an error aborts and rolls back that unit.
pub trait Entity: Sized + Clone + 'static {
    fn schema() -> &'static TableSchema;

    /// Column values in `schema().columns` order.
    fn values(&self) -> Vec<Value>;

    /// Rebuild from a row whose schema columns start at `base`.
    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self>;

    /// Write back a value the store assigned: a generated key, a timestamp,
    /// a tombstone, or a foreign key linked by an association.
    fn assign(&mut self, _column: &str, _value: &Value) {}

    /// Every relation declared on this entity, loaded by
    /// [`Query::preload_all`](crate::Query::preload_all).
    fn relations() -> Vec<Box<dyn PreloadStep<Self>>> {
        Vec::new()
    }

    fn key_value(&self) -> Value {
        let idx = Self::schema().key_index();
        let mut values = self.values();
        if idx < values.len() {
            values.swap_remove(idx)
        } else {
            Value::Null
        }
    }

    /// Value of a named column, if the schema has it.
    fn column_value(&self, column: &str) -> Option<Value> {
        let idx = Self::schema().column_index(column)?;
        let mut values = self.values();
        (idx < values.len()).then(|| values.swap_remove(idx))
    }

    fn before_create(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_create(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_save(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_save(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_delete(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_delete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `0`, `0.0`, `""`, empty blob and `NULL` are zero values.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(i) => *i == 0,
        Value::Real(r) => *r == 0.0,
        Value::Text(s) => s.is_empty(),
        Value::Blob(b) => b.is_empty(),
    }
}

/// Hashable form of a key value used to group related rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyValue {
    Int(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl KeyValue {
    /// `NULL` and reals never act as keys.
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(KeyValue::Int(*i)),
            Value::Text(s) => Some(KeyValue::Text(s.clone())),
            Value::Blob(b) => Some(KeyValue::Blob(b.clone())),
            Value::Null | Value::Real(_) => None,
        }
    }
}

/// Distinct key values in first-seen order, dropping NULLs.
pub(crate) fn distinct_keys(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for v in values {
        if let Some(k) = KeyValue::of(&v) {
            if seen.insert(k, ()).is_none() {
                out.push(v);
            }
        }
    }
    out
}

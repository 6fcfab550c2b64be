//! Structured predicates and explicit column changes.
//!
//! A [`Filter`] is an equality map, an `IN` list, a free-form clause with
//! positional `?` parameters, or an AND/OR/NOT tree of those. Filters
//! render to SQL text plus an ordered parameter list; values are never
//! interpolated into the text.

use recordstore_common::{ProductId, UserId, WalletId};
use rusqlite::types::Value;

use crate::schema::{is_zero, ColumnRole, Entity, ZeroPolicy};

/// Conversion into a SQLite parameter value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Value {
        self.clone()
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

macro_rules! int_into_value {
    ($($t:ty),+) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )+
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! key_into_value {
    ($($t:ty),+) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::Text(self.into())
                }
            }

            impl IntoValue for &$t {
                fn into_value(self) -> Value {
                    Value::Text(self.as_str().to_string())
                }
            }
        )+
    };
}

key_into_value!(UserId, WalletId, ProductId);

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

/// A predicate over one table (and whatever it is joined with).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every pair must match; `NULL` renders as `IS NULL`.
    Eq(Vec<(String, Value)>),
    /// `column IN (...)`; an empty list matches nothing.
    In { column: String, values: Vec<Value> },
    /// Caller-written clause with `?` placeholders.
    Raw { clause: String, params: Vec<Value> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl IntoValue) -> Self {
        Filter::Eq(vec![(column.into(), value.into_value())])
    }

    /// Equality map; zero values are matched literally.
    pub fn eq_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: IntoValue,
    {
        Filter::Eq(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into_value()))
                .collect(),
        )
    }

    pub fn is_in<V: IntoValue>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(IntoValue::into_value).collect(),
        }
    }

    pub fn raw(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Filter::Raw {
            clause: clause.into(),
            params,
        }
    }

    /// Struct-shaped condition: equality on every non-zero column of
    /// `entity`. Columns with [`ZeroPolicy::Skip`] and a zero value are
    /// left out, so an empty `last_name` cannot be matched this way; use
    /// [`Filter::eq_map`] for that.
    pub fn matching<E: Entity>(entity: &E) -> Self {
        let schema = E::schema();
        let pairs = schema
            .columns
            .iter()
            .zip(entity.values())
            .filter(|(col, v)| col.role != ColumnRole::Tombstone && (col.zero == ZeroPolicy::Keep || !is_zero(v)))
            .map(|(col, v)| (col.name.to_string(), v))
            .collect();
        Filter::Eq(pairs)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Append SQL for this filter. Bare column names in `Eq`/`In` are
    /// qualified with `table`.
    pub(crate) fn render(&self, table: &str, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Filter::Eq(pairs) if pairs.is_empty() => sql.push_str("1 = 1"),
            Filter::Eq(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(col, v)| {
                        let col = qualify(table, col);
                        if matches!(v, Value::Null) {
                            format!("{col} IS NULL")
                        } else {
                            params.push(v.clone());
                            format!("{col} = ?")
                        }
                    })
                    .collect();
                sql.push('(');
                sql.push_str(&parts.join(" AND "));
                sql.push(')');
            }
            Filter::In { values, .. } if values.is_empty() => sql.push_str("1 = 0"),
            Filter::In { column, values } => {
                sql.push_str(&format!(
                    "{} IN ({})",
                    qualify(table, column),
                    placeholders(values.len())
                ));
                params.extend(values.iter().cloned());
            }
            Filter::Raw { clause, params: p } => {
                sql.push('(');
                sql.push_str(clause);
                sql.push(')');
                params.extend(p.iter().cloned());
            }
            Filter::And(parts) => render_group(parts, " AND ", "1 = 1", table, sql, params),
            Filter::Or(parts) => render_group(parts, " OR ", "1 = 0", table, sql, params),
            Filter::Not(inner) => {
                sql.push_str("NOT ");
                sql.push('(');
                inner.render(table, sql, params);
                sql.push(')');
            }
        }
    }
}

fn render_group(
    parts: &[Filter],
    sep: &str,
    empty: &str,
    table: &str,
    sql: &mut String,
    params: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        part.render(table, sql, params);
    }
    sql.push(')');
}

/// Qualify a bare column name; anything with a dot, quote or parenthesis is
/// taken as written.
pub(crate) fn qualify(table: &str, column: &str) -> String {
    if column.contains(['.', '"', '(']) {
        column.to_string()
    } else {
        format!("{table}.{column}")
    }
}

/// `?, ?, ?` for `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Explicit column assignments for an update.
///
/// Every column set here is written, zero values included. [`Changes::maybe`]
/// takes an `Option` so "not provided" (`None`) and "set to zero"
/// (`Some(0)`, `Some("")`) stay distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    columns: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl IntoValue) -> Self {
        let column = column.into();
        let value = value.into_value();
        if let Some(existing) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            existing.1 = value;
        } else {
            self.columns.push((column, value));
        }
        self
    }

    /// Set the column only when a value is present.
    pub fn maybe<V: IntoValue>(self, column: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn set_null(self, column: impl Into<String>) -> Self {
        self.set(column, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(c, _)| c == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Non-zero columns of `entity` except its key and the timestamp and
    /// tombstone columns the store manages.
    pub fn from_entity<E: Entity>(entity: &E) -> Self {
        let schema = E::schema();
        let columns = schema
            .columns
            .iter()
            .zip(entity.values())
            .filter(|(col, v)| {
                !col.primary_key
                    && !matches!(
                        col.role,
                        ColumnRole::CreatedAt | ColumnRole::UpdatedAt | ColumnRole::Tombstone
                    )
                    && (col.zero == ZeroPolicy::Keep || !is_zero(v))
            })
            .map(|(col, v)| (col.name.to_string(), v))
            .collect();
        Self { columns }
    }

    pub(crate) fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: &Filter) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        f.render("users", &mut sql, &mut params);
        (sql, params)
    }

    #[test]
    fn eq_map_qualifies_and_handles_null() {
        let f = Filter::eq_map([("middle_name", Value::Text(String::new())), ("deleted_at", Value::Null)]);
        let (sql, params) = render(&f);
        assert_eq!(sql, "(users.middle_name = ? AND users.deleted_at IS NULL)");
        assert_eq!(params, vec![Value::Text(String::new())]);
    }

    #[test]
    fn raw_keeps_text_and_params() {
        let f = Filter::raw("first_name like ?", crate::values!["%User%"]);
        let (sql, params) = render(&f);
        assert_eq!(sql, "(first_name like ?)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn or_and_not_tree() {
        let f = Filter::raw("a = ?", crate::values![1])
            .or(Filter::eq("b", 2))
            .and(Filter::raw("c = ?", crate::values![3]).not());
        let (sql, params) = render(&f);
        assert_eq!(sql, "(((a = ?) OR (users.b = ?)) AND NOT ((c = ?)))");
        assert_eq!(
            params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn empty_in_matches_nothing() {
        let f = Filter::is_in("id", Vec::<i64>::new());
        assert_eq!(render(&f).0, "1 = 0");
        let f = Filter::is_in("Wallet.id", ["1", "2"]);
        assert_eq!(render(&f).0, "Wallet.id IN (?, ?)");
    }

    #[test]
    fn changes_keep_explicit_zero_values() {
        let changes = Changes::new()
            .set("middle_name", "")
            .set("last_name", "Morro")
            .maybe("password", None::<&str>)
            .maybe("first_name", Some("Lingga"));
        assert_eq!(changes.len(), 3);
        assert!(changes.contains("middle_name"));
        assert!(!changes.contains("password"));
    }

    #[test]
    fn changes_set_overwrites() {
        let changes = Changes::new().set("a", 1).set("a", 2);
        let pairs = changes.into_pairs();
        assert_eq!(pairs, vec![("a".to_string(), Value::Integer(2))]);
    }
}

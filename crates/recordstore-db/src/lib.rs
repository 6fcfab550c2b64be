//! recordstore-db: a SQLite-backed record store.
//!
//! The store offers typed CRUD over [`Entity`] types described by static
//! [`TableSchema`] descriptors, transactional execution, structured
//! [`Filter`] predicates, relation loading through typed [`Relation`]
//! descriptors, and idempotent schema creation.
//!
//! # Modules
//!
//! - `pool` - r2d2 connection pool setup
//! - `schema` - column/table descriptors and the `Entity` trait
//! - `filter` - predicates and explicit column changes
//! - `query` - the query builder
//! - `relation` - relation descriptors, preload and join strategies
//! - `session` - statement execution on one borrowed connection
//! - `store` / `tx` - pool-backed and transaction-pinned handles
//! - `association` - mutations on a relation's link representation
//! - `migrations` - create-if-absent schema migration
//! - `models` - the demo entities
//!
//! # Example
//!
//! ```no_run
//! use recordstore_db::models::{self, Sample};
//! use recordstore_db::{Db, Query, Store};
//!
//! let store = Store::open_temporary().unwrap();
//! store.migrate(models::ALL_SCHEMAS).unwrap();
//!
//! let mut rows = vec![Sample::new("1", "Lingga"), Sample::new("2", "Budi")];
//! store.insert_batch(&mut rows).unwrap();
//!
//! let first = store.find_one(&Query::<Sample>::by_key("1")).unwrap();
//! assert_eq!(first.name, "Lingga");
//! ```

pub mod association;
pub mod cancel;
mod error;
pub mod filter;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod query;
pub mod relation;
pub mod schema;
pub mod session;
pub mod store;
pub mod tx;

pub use association::Association;
pub use cancel::CancelToken;
pub use filter::{Changes, Filter, IntoValue};
pub use query::Query;
pub use relation::{JoinStep, Preload, PreloadStep, Relation, RelationKind, SaveAssociation};
pub use schema::{Column, ColumnRole, Entity, SqlType, TableSchema, ZeroPolicy};
pub use session::{OnConflict, Session};
pub use store::{Db, Store};
pub use tx::{Tx, TxState};

pub use recordstore_common::{ConstraintKind, Error, Result};
pub use rusqlite::types::Value;

/// Build a `Vec<Value>` of statement parameters.
///
/// ```
/// let params = recordstore_db::values!["1", "Lingga", 42];
/// assert_eq!(params.len(), 3);
/// ```
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoValue::into_value($v)),+]
    };
}

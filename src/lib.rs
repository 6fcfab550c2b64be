//! recordstore - a SQLite record store with a demo command-line tool.
//!
//! The store itself lives in `recordstore-db`; this crate adds the demo
//! dataset and the reports the CLI prints.

pub mod demo;

pub use recordstore_common as common;
pub use recordstore_db as db;

//! Create-if-absent schema migration.
//!
//! Each [`TableSchema`] becomes a `CREATE TABLE IF NOT EXISTS`; columns the
//! schema declares but the live table lacks are added with
//! `ALTER TABLE ... ADD COLUMN`. Nothing is ever dropped or altered in place.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::map_sqlite;
use crate::schema::TableSchema;
use recordstore_common::Result;

/// `CREATE TABLE IF NOT EXISTS` for `schema`. A single-column key is declared
/// inline, a composite key as a table constraint.
pub fn create_table_sql(schema: &TableSchema) -> String {
    let inline = schema.primary_key.len() <= 1;
    let mut defs: Vec<String> = schema.columns.iter().map(|c| c.ddl(inline)).collect();
    if !inline {
        defs.push(format!("PRIMARY KEY ({})", schema.primary_key.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        schema.table,
        defs.join(",\n    ")
    )
}

/// Bring every table in `schemas` up to its declared shape.
///
/// Safe to run repeatedly. Tables are handled in the given order, so parents
/// must precede the tables that reference them.
pub fn auto_migrate(conn: &Connection, schemas: &[&TableSchema]) -> Result<()> {
    for schema in schemas {
        conn.execute_batch(&create_table_sql(schema))
            .map_err(map_sqlite)?;

        let existing = table_columns(conn, schema.table)?;
        for column in schema.columns {
            if existing.contains(column.name) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                schema.table,
                column.add_column_ddl()
            );
            conn.execute_batch(&sql).map_err(map_sqlite)?;
            tracing::info!(table = schema.table, column = column.name, "Added missing column");
        }
    }
    Ok(())
}

/// Whether `table` exists in the main database.
pub fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )
    .map_err(map_sqlite)
}

/// Column names of `table`; empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(map_sqlite)?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .map_err(map_sqlite)?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(map_sqlite)?;
    Ok(names)
}

//! Classification of driver and pool errors into the store's taxonomy.

use std::os::raw::c_int;

use recordstore_common::{ConstraintKind, Error};
use rusqlite::{ffi, ErrorCode};

/// Map a rusqlite error onto [`Error`] using the SQLite (extended) result code.
pub(crate) fn map_sqlite(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        let text = message.clone().unwrap_or_else(|| failure.to_string());
        match failure.code {
            ErrorCode::ConstraintViolation => {
                return Error::constraint(constraint_kind(failure.extended_code), text);
            }
            ErrorCode::OperationInterrupted => return Error::Cancelled,
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::OutOfMemory => return Error::ConnectionFailure(text),
            _ => {}
        }
    }
    Error::database(err)
}

/// Map a pool checkout failure. r2d2 only fails on timeout or a connection
/// that could not be established, both of which are transient.
pub(crate) fn map_pool(err: r2d2::Error) -> Error {
    Error::ConnectionFailure(format!("Failed to get connection from pool: {err}"))
}

fn constraint_kind(extended_code: c_int) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::PrimaryKey,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        _ => ConstraintKind::Other,
    }
}

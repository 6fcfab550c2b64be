//! Unified error type for the recordstore workspace.
//!
//! Every store operation returns [`Error`]. The variants are coarse enough
//! for callers to tell a transient connection problem from a constraint
//! breach, a missing row, or a hook that rejected the operation.

use std::fmt;

/// Which constraint a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::PrimaryKey => "primary key",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
            ConstraintKind::Other => "constraint",
        };
        f.write_str(s)
    }
}

/// Unified error type covering all failure modes of the record store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single-row fetch matched nothing.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// The table or entity that was queried.
        entity: String,
        /// Description of the lookup (key or filter).
        key: String,
    },

    /// A unique, foreign-key, not-null or check constraint was breached.
    #[error("{kind} constraint violated: {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        message: String,
    },

    /// The backend could not be reached or is temporarily unavailable.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// A lifecycle hook rejected the operation.
    #[error("Validation aborted: {0}")]
    ValidationAbort(String),

    /// The caller's cancellation token fired or its deadline passed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The transaction has already been committed or rolled back.
    #[error("Transaction is no longer active")]
    TransactionClosed,

    /// The request cannot be expressed (e.g. global delete, lock outside a
    /// transaction).
    #[error("Invalid operation: {0}")]
    Invalid(String),

    /// Any other database failure.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ConnectionFailure(_))
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, key: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Convenience constructor for [`Error::ConstraintViolation`].
    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Error::ConstraintViolation {
            kind,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ValidationAbort`].
    pub fn validation_abort(message: impl Into<String>) -> Self {
        Error::ValidationAbort(message.into())
    }

    /// Convenience constructor for [`Error::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("users", "id = 7");
        assert_eq!(err.to_string(), "users not found: id = 7");
        assert!(!err.is_transient());
    }

    #[test]
    fn constraint_display() {
        let err = Error::constraint(ConstraintKind::ForeignKey, "wallets.user_id");
        assert_eq!(
            err.to_string(),
            "foreign key constraint violated: wallets.user_id"
        );
    }

    #[test]
    fn connection_failure_is_transient() {
        let err = Error::ConnectionFailure("database is locked".into());
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Connection failure: database is locked");
    }

    #[test]
    fn validation_abort_display() {
        let err = Error::validation_abort("password too short");
        assert_eq!(err.to_string(), "Validation aborted: password too short");
    }

    #[test]
    fn database_display() {
        let err = Error::database("disk image is malformed");
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn terminal_states() {
        assert_eq!(
            Error::TransactionClosed.to_string(),
            "Transaction is no longer active"
        );
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }
}

use std::fmt;

use thiserror::Error;

use crate::materialize::ResultSet;

/// Boxed error coming from a driver (connection or cursor).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which kind of SQL identifier failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Database,
    Table,
}

impl fmt::Display for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentKind::Database => f.write_str("database"),
            IdentKind::Table => f.write_str("table"),
        }
    }
}

/// Errors returned by etude-sql operations.
#[derive(Debug, Error)]
pub enum SqlError {
    /// Operation attempted without a live connection.
    #[error("not connected")]
    NotConnected,

    /// An identifier that must be interpolated into SQL text was empty.
    #[error("{0} name cannot be blank")]
    BlankIdentifier(IdentKind),

    /// An identifier that must be interpolated into SQL text is malformed.
    #[error("invalid {kind} name: {name:?}")]
    InvalidIdentifier { kind: IdentKind, name: String },

    /// The cursor could not report its column types.
    #[error("column metadata unavailable: {0}")]
    Metadata(#[source] BoxError),

    /// A row failed to scan. Rows materialized before the failure are kept
    /// in `partial` for inspection; callers should normally discard them.
    #[error("scan failed at row {row}: {source}")]
    Scan {
        row: usize,
        partial: ResultSet,
        #[source]
        source: BoxError,
    },

    /// Any other failure reported by the driver.
    #[error("database error: {0}")]
    Driver(#[source] BoxError),
}

impl SqlError {
    /// Wrap a driver error.
    pub fn driver(err: impl Into<BoxError>) -> Self {
        SqlError::Driver(err.into())
    }

    /// Wrap a metadata-access error.
    pub fn metadata(err: impl Into<BoxError>) -> Self {
        SqlError::Metadata(err.into())
    }

    /// Rows materialized before a scan failure, if this is one.
    pub fn partial(&self) -> Option<&ResultSet> {
        match self {
            SqlError::Scan { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Take ownership of the partially materialized rows.
    pub fn into_partial(self) -> Option<ResultSet> {
        match self {
            SqlError::Scan { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// A scanned row does not have one value per reported column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("row has {found} values but the cursor reports {expected} columns")]
pub struct RowWidthMismatch {
    pub expected: usize,
    pub found: usize,
}

pub type SqlResult<T> = Result<T, SqlError>;

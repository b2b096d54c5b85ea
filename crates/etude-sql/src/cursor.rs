//! Capabilities the core consumes from a database driver.
//!
//! A driver provides a [`Connection`] that hands out [`Cursor`]s. The core
//! never opens sockets, retries or pools; it only reads what a cursor yields.
use std::collections::VecDeque;

use thiserror::Error;

use crate::error::{SqlError, SqlResult};
use crate::value::{RawValue, Value};

/// Column metadata as reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub name: String,
    /// Database-reported type name, e.g. `INT4` or `VARCHAR`.
    pub database_type: String,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, database_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database_type: database_type.into(),
        }
    }
}

/// A single-pass handle over the rows of an executed query.
///
/// Rows come out in fetch order and cannot be rewound. A cursor has exactly
/// one consumer at a time.
pub trait Cursor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Column names and reported types, in physical column order.
    fn column_types(&self) -> Result<Vec<ColumnType>, Self::Error>;

    /// Column names in physical column order.
    fn column_names(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .column_types()?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Advance and scan the next row. `Ok(None)` once the rows are exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<RawValue>>, Self::Error>;

    /// Release the cursor. Calling it more than once is harmless.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// A live connection able to run SQL text.
pub trait Connection {
    type Error: std::error::Error + Send + Sync + 'static;
    type Cursor: Cursor;

    /// Run a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Self::Error>;

    /// Run a query and return a cursor over its rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Self::Cursor, Self::Error>;

    /// Run a query and scan at most its first row.
    fn query_row(&mut self, sql: &str, params: &[Value]) -> SqlResult<Option<Vec<RawValue>>> {
        let mut cursor = self.query(sql, params).map_err(SqlError::driver)?;
        let row = cursor.next_row().map_err(SqlError::driver)?;
        cursor.close().map_err(SqlError::driver)?;
        Ok(row)
    }

    fn close(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryCursorError {
    #[error("column types are not available")]
    MetadataUnavailable,
    #[error("row {0} could not be scanned")]
    Scan(usize),
}

/// A cursor over rows that were already scanned into memory.
///
/// Failures can be injected to exercise the error paths of callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    columns: Vec<ColumnType>,
    rows: VecDeque<Vec<RawValue>>,
    fail_at: Option<usize>,
    metadata_unavailable: bool,
    fetched: usize,
    closed: bool,
}

impl MemoryCursor {
    /// Create a cursor from `(name, type)` pairs.
    pub fn new<I, N, T>(columns: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| ColumnType::new(name, ty))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_row(mut self, row: Vec<RawValue>) -> Self {
        self.rows.push_back(row);
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Vec<RawValue>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Make the scan of the zero-based row `row` fail.
    pub fn fail_at(mut self, row: usize) -> Self {
        self.fail_at = Some(row);
        self
    }

    /// Make `column_types` fail.
    pub fn without_metadata(mut self) -> Self {
        self.metadata_unavailable = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Cursor for MemoryCursor {
    type Error = MemoryCursorError;

    fn column_types(&self) -> Result<Vec<ColumnType>, Self::Error> {
        if self.metadata_unavailable {
            return Err(MemoryCursorError::MetadataUnavailable);
        }
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<Option<Vec<RawValue>>, Self::Error> {
        if self.closed {
            return Ok(None);
        }
        if self.fail_at == Some(self.fetched) {
            return Err(MemoryCursorError::Scan(self.fetched));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}

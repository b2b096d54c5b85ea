//! # etude-sql
//!
//! Driver-agnostic row materialization for relational database clients.
//!
//! Given any result cursor, the crate discovers column names and the
//! database-reported type names, then turns every row into a [`Record`]:
//! an ordered mapping from column name to a coerced [`Value`].
//!
//! ## Features
//! - **Type-name coercion**: integer, real, binary and boolean families are
//!   collapsed from their reported names (`INT4`, `NUMERIC`, `BYTEA`, ...).
//! - **Total conversion**: coercion never fails; odd input degrades to a zero value.
//! - **One-shot cursors**: a [`Cursor`] is consumed exactly once.
//! - **Identifier guard**: table and database names are checked before they
//!   are interpolated into SQL text.

pub mod coerce;
pub mod column;
pub mod cursor;
pub mod database;
pub mod error;
pub mod ident;
pub mod materialize;
pub mod value;

pub use coerce::{TypeFamily, coerce};
pub use column::{ColumnDescriptor, ColumnTypeIndex, describe_columns, resolve_columns};
pub use cursor::{ColumnType, Connection, Cursor, MemoryCursor};
pub use database::Database;
pub use error::{IdentKind, SqlError, SqlResult};
pub use ident::{escape_apostrophes, escape_double_quotes, is_valid_identifier, require_identifier};
pub use materialize::{Record, ResultSet, materialize};
pub use value::{RawValue, Value, ValueKind};

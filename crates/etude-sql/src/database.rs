//! A session handle over any [`Connection`].
use crate::column::{ColumnDescriptor, ColumnTypeIndex, resolve_columns};
use crate::cursor::{Connection, Cursor};
use crate::error::{IdentKind, SqlError, SqlResult};
use crate::ident::require_identifier;
use crate::materialize::{ResultSet, materialize};
use crate::value::{RawValue, Value};

/// A database session: an optional live connection plus the database name
/// it is bound to.
///
/// Every operation fails with [`SqlError::NotConnected`] once the connection
/// is gone.
#[derive(Debug)]
pub struct Database<C: Connection> {
    conn: Option<C>,
    name: Option<String>,
}

impl<C: Connection> Database<C> {
    pub fn new(conn: C, name: impl Into<String>) -> Self {
        Self {
            conn: Some(conn),
            name: Some(name.into()).filter(|n: &String| !n.is_empty()),
        }
    }

    /// A session with no live connection.
    pub fn disconnected(name: Option<String>) -> Self {
        Self { conn: None, name }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn database_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn connection_mut(&mut self) -> SqlResult<&mut C> {
        self.conn.as_mut().ok_or(SqlError::NotConnected)
    }

    /// Run a statement and return the number of affected rows.
    pub fn exec(&mut self, sql: &str, params: &[Value]) -> SqlResult<u64> {
        let sql = sql.trim();
        let conn = self.connection_mut()?;
        log::debug!("Executing: {} | Params: {}", sql, params.len());
        conn.execute(sql, params).map_err(SqlError::driver)
    }

    /// Run a query and hand back its cursor unread.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> SqlResult<C::Cursor> {
        let sql = sql.trim();
        let conn = self.connection_mut()?;
        log::debug!("Querying: {} | Params: {}", sql, params.len());
        conn.query(sql, params).map_err(SqlError::driver)
    }

    /// Run a query and return its first row, if any, without coercion.
    pub fn query_row(&mut self, sql: &str, params: &[Value]) -> SqlResult<Option<Vec<RawValue>>> {
        let sql = sql.trim();
        let conn = self.connection_mut()?;
        log::debug!("Querying one row: {} | Params: {}", sql, params.len());
        conn.query_row(sql, params)
    }

    /// Run a query and materialize every row it returns.
    pub fn query_records(&mut self, sql: &str, params: &[Value]) -> SqlResult<ResultSet> {
        let cursor = self.query(sql, params)?;
        materialize(cursor)
    }

    /// Describe a table's columns by probing it with a one-row query.
    ///
    /// The database name (when bound) and the table name are validated
    /// before anything is sent.
    pub fn table_info(&mut self, table: &str) -> SqlResult<(Vec<ColumnDescriptor>, ColumnTypeIndex)> {
        if !self.is_connected() {
            return Err(SqlError::NotConnected);
        }
        if let Some(name) = &self.name {
            require_identifier(IdentKind::Database, name)?;
        }
        require_identifier(IdentKind::Table, table)?;

        let mut cursor = self.query(&format!("SELECT * FROM {} LIMIT 1", table), &[])?;
        let resolved = resolve_columns(&cursor);
        let closed = cursor.close();
        let resolved = resolved?;
        closed.map_err(SqlError::driver)?;
        Ok(resolved)
    }

    /// Drop the connection. Closing an already closed session is a no-op.
    pub fn close(&mut self) -> SqlResult<()> {
        match self.conn.take() {
            Some(mut conn) => {
                log::debug!("Closing connection to {:?}", self.name);
                conn.close().map_err(SqlError::driver)
            }
            None => Ok(()),
        }
    }
}

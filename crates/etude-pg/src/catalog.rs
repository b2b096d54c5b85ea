//! Catalog queries against PostgreSQL's `information_schema` and `pg_database`.
use std::collections::BTreeMap;

use etude_sql::{
    ColumnDescriptor, ColumnTypeIndex, Connection, Cursor, Database, IdentKind, RawValue,
    SqlError, SqlResult, TypeFamily, Value, is_valid_identifier, require_identifier,
};

const COLUMNS_SQL: &str = "SELECT COALESCE(ORDINAL_POSITION, 0), COALESCE(COLUMN_NAME, ''), \
     COALESCE(DATA_TYPE, '') FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = $1 \
     ORDER BY ORDINAL_POSITION";
const SCHEMA_COLUMNS_SQL: &str = "SELECT COALESCE(ORDINAL_POSITION, 0), COALESCE(COLUMN_NAME, ''), \
     COALESCE(DATA_TYPE, '') FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = $1 \
     AND TABLE_NAME = $2 ORDER BY ORDINAL_POSITION";
const EXISTS_SQL: &str = "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = $1";
const SCHEMA_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = $1 AND TABLE_NAME = $2";
const DATABASES_SQL: &str =
    "SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname";
const TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name";

/// PostgreSQL catalog lookups on a session.
///
/// Every method needs the session to be bound to a valid database name and
/// validates table names before anything is sent.
pub trait PgCatalog {
    /// Describe a table's columns from `information_schema.columns`.
    ///
    /// Yields the same shape as [`Database::table_info`]; the type names are
    /// the catalog's (`integer`, `character varying`, ...).
    fn sql_table_info(
        &mut self,
        table: &str,
    ) -> SqlResult<(Vec<ColumnDescriptor>, ColumnTypeIndex)>;

    /// Names of all non-template databases.
    fn show_databases(&mut self) -> SqlResult<Vec<String>>;

    /// Names of the base tables in the `public` schema.
    fn show_tables(&mut self) -> SqlResult<Vec<String>>;

    /// Column types of every table in [`PgCatalog::show_tables`].
    ///
    /// Tables whose names are not plain identifiers (mixed case, dashes)
    /// are skipped.
    fn show_tables_map(&mut self) -> SqlResult<BTreeMap<String, ColumnTypeIndex>>;

    fn table_exists(&mut self, table: &str) -> SqlResult<bool>;
}

impl<C: Connection> PgCatalog for Database<C> {
    fn sql_table_info(
        &mut self,
        table: &str,
    ) -> SqlResult<(Vec<ColumnDescriptor>, ColumnTypeIndex)> {
        check_session(self)?;
        require_identifier(IdentKind::Table, table)?;

        let rows = match table.split_once('.') {
            Some((schema, name)) => fetch_rows(
                self,
                SCHEMA_COLUMNS_SQL,
                &[Value::from(schema), Value::from(name)],
            )?,
            None => fetch_rows(self, COLUMNS_SQL, &[Value::from(table)])?,
        };

        let mut descriptors = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.into_iter();
            let sequence = TypeFamily::Integer
                .coerce(cells.next().unwrap_or(RawValue::Null))
                .as_i64()
                .unwrap_or(0);
            descriptors.push(ColumnDescriptor {
                sequence: usize::try_from(sequence).unwrap_or(0),
                name: text_of(cells.next()),
                type_name: text_of(cells.next()),
            });
        }
        let index = ColumnTypeIndex::from_descriptors(&descriptors);
        Ok((descriptors, index))
    }

    fn show_databases(&mut self) -> SqlResult<Vec<String>> {
        check_session(self)?;
        first_column(self, DATABASES_SQL)
    }

    fn show_tables(&mut self) -> SqlResult<Vec<String>> {
        check_session(self)?;
        first_column(self, TABLES_SQL)
    }

    fn show_tables_map(&mut self) -> SqlResult<BTreeMap<String, ColumnTypeIndex>> {
        let mut tables = BTreeMap::new();
        for table in self.show_tables()? {
            // The probe interpolates the name, so names needing quotes are left out.
            if !is_valid_identifier(&table) {
                log::warn!("Skipping table {:?}: not a plain identifier", table);
                continue;
            }
            let (_, index) = self.table_info(&table)?;
            tables.insert(table, index);
        }
        Ok(tables)
    }

    fn table_exists(&mut self, table: &str) -> SqlResult<bool> {
        check_session(self)?;
        require_identifier(IdentKind::Table, table)?;

        let row = match table.split_once('.') {
            Some((schema, name)) => self.query_row(
                SCHEMA_EXISTS_SQL,
                &[Value::from(schema), Value::from(name)],
            )?,
            None => self.query_row(EXISTS_SQL, &[Value::from(table)])?,
        };
        let count = row
            .and_then(|cells| cells.into_iter().next())
            .map_or(0, |cell| TypeFamily::Integer.coerce(cell).as_i64().unwrap_or(0));
        Ok(count > 0)
    }
}

/// Catalog lookups need a live connection bound to a valid database.
fn check_session<C: Connection>(db: &Database<C>) -> SqlResult<()> {
    if !db.is_connected() {
        return Err(SqlError::NotConnected);
    }
    require_identifier(IdentKind::Database, db.database_name().unwrap_or_default())
}

fn fetch_rows<C: Connection>(
    db: &mut Database<C>,
    sql: &str,
    params: &[Value],
) -> SqlResult<Vec<Vec<RawValue>>> {
    let mut cursor = db.query(sql, params)?;
    let mut rows = Vec::new();
    let result = loop {
        match cursor.next_row() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(rows),
            Err(e) => break Err(SqlError::driver(e)),
        }
    };
    let closed = cursor.close();
    let rows = result?;
    closed.map_err(SqlError::driver)?;
    Ok(rows)
}

fn first_column<C: Connection>(db: &mut Database<C>, sql: &str) -> SqlResult<Vec<String>> {
    Ok(fetch_rows(db, sql, &[])?
        .into_iter()
        .map(|row| text_of(row.into_iter().next()))
        .collect())
}

fn text_of(cell: Option<RawValue>) -> String {
    match cell {
        Some(RawValue::Text(s)) => s,
        Some(RawValue::Bytes(b)) => String::from_utf8_lossy(&b).into_owned(),
        Some(RawValue::Int(v)) => v.to_string(),
        Some(RawValue::Float(v)) => v.to_string(),
        Some(RawValue::Bool(v)) => v.to_string(),
        Some(RawValue::Null) | None => String::new(),
    }
}

/// Quote a string as a PostgreSQL literal.
///
/// Apostrophes are doubled. A value containing backslashes has them doubled
/// and is written as an escape string (` E'...'`).
pub fn quote_literal(s: &str) -> String {
    let escaped = s.replace('\'', "''");
    if escaped.contains('\\') {
        format!(" E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

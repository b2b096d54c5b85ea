//! Row materialization: cursor rows into coerced records.
use std::collections::HashMap;
use std::ops::Index;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::coerce::TypeFamily;
use crate::column::{ColumnDescriptor, ColumnTypeIndex, resolve_columns};
use crate::cursor::Cursor;
use crate::error::{RowWidthMismatch, SqlError, SqlResult};
use crate::value::{RawValue, Value};

/// One materialized row: column name to coerced value, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

/// Records in cursor fetch order.
pub type ResultSet = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Set a field. An existing field of the same name keeps its position
    /// and gets the new value; the old one is returned.
    ///
    /// Lookup is linear in the field count; [`materialize`] builds rows
    /// without going through here.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(v) => v,
            None => panic!("no column named {:?} in record", name),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Per-result-set mapping from physical columns to record fields, so each
/// row is built in one pass.
struct RowLayout {
    /// Distinct column names, in first-seen order.
    names: Vec<String>,
    /// Field slot and coercion family of each physical column.
    columns: Vec<(usize, TypeFamily)>,
}

impl RowLayout {
    fn new(columns: &[ColumnDescriptor], index: &ColumnTypeIndex) -> Self {
        let mut slots: HashMap<&str, usize> = HashMap::with_capacity(columns.len());
        let mut names = Vec::with_capacity(columns.len());
        let columns = columns
            .iter()
            .map(|column| {
                let slot = *slots.entry(column.name.as_str()).or_insert_with(|| {
                    names.push(column.name.clone());
                    names.len() - 1
                });
                (slot, index.family(&column.name))
            })
            .collect();
        Self { names, columns }
    }

    /// Coerce a full-width row. Duplicate names keep the later column's value.
    fn record(&self, row: Vec<RawValue>) -> Record {
        let mut fields: Vec<(String, Value)> = self
            .names
            .iter()
            .map(|name| (name.clone(), Value::Null))
            .collect();
        for (&(slot, family), raw) in self.columns.iter().zip(row) {
            fields[slot].1 = family.coerce(raw);
        }
        Record { fields }
    }
}

/// Consume a cursor and materialize every row it yields.
///
/// Each value is coerced by the reported type of its column, looked up by
/// column name. If a row fails to scan, iteration stops and the error is
/// returned as [`SqlError::Scan`] carrying the rows read so far; callers
/// should treat those as inconsistent. The cursor is closed in every case.
pub fn materialize<C: Cursor>(mut cursor: C) -> SqlResult<ResultSet> {
    let result = scan_rows(&mut cursor);
    let closed = cursor.close();
    let records = result?;
    closed.map_err(SqlError::driver)?;
    Ok(records)
}

fn scan_rows<C: Cursor>(cursor: &mut C) -> SqlResult<ResultSet> {
    let (columns, index) = resolve_columns(&*cursor)?;
    let layout = RowLayout::new(&columns, &index);
    let mut records = ResultSet::new();

    loop {
        let row = match cursor.next_row() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => {
                return Err(SqlError::Scan {
                    row: records.len(),
                    partial: records,
                    source: e.into(),
                });
            }
        };
        if row.len() != columns.len() {
            let mismatch = RowWidthMismatch {
                expected: columns.len(),
                found: row.len(),
            };
            return Err(SqlError::Scan {
                row: records.len(),
                partial: records,
                source: mismatch.into(),
            });
        }

        records.push(layout.record(row));
    }

    log::trace!(
        "materialized {} rows over {} columns",
        records.len(),
        columns.len()
    );
    Ok(records)
}

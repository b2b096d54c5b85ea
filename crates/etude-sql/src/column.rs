//! Column metadata resolution.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::coerce::TypeFamily;
use crate::cursor::{ColumnType, Cursor};
use crate::error::{SqlError, SqlResult};

/// One column of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// 1-based position in the result set.
    pub sequence: usize,
    pub name: String,
    /// Database-reported type name.
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Lookup from column name to reported type name.
///
/// Names are assumed unique per result set. When a query yields the same
/// name twice the later column wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnTypeIndex {
    types: BTreeMap<String, String>,
}

impl ColumnTypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from descriptors; later duplicates overwrite earlier ones.
    pub fn from_descriptors(descriptors: &[ColumnDescriptor]) -> Self {
        descriptors
            .iter()
            .map(|d| (d.name.clone(), d.type_name.clone()))
            .collect()
    }

    /// Record a column's type, returning the type it replaced, if any.
    pub fn insert(&mut self, name: impl Into<String>, type_name: impl Into<String>) -> Option<String> {
        self.types.insert(name.into(), type_name.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    /// Coercion family of a column; unknown columns pass through.
    pub fn family(&self, name: &str) -> TypeFamily {
        self.get(name).map_or(TypeFamily::Other, TypeFamily::of)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate `(name, type)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for ColumnTypeIndex {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (name, ty) in iter {
            index.insert(name, ty);
        }
        index
    }
}

/// Number columns in order and build their type index.
pub fn describe_columns(
    columns: impl IntoIterator<Item = ColumnType>,
) -> (Vec<ColumnDescriptor>, ColumnTypeIndex) {
    let descriptors: Vec<ColumnDescriptor> = columns
        .into_iter()
        .enumerate()
        .map(|(i, c)| ColumnDescriptor {
            sequence: i + 1,
            name: c.name,
            type_name: c.database_type,
        })
        .collect();
    let index = ColumnTypeIndex::from_descriptors(&descriptors);
    (descriptors, index)
}

/// Read a cursor's column metadata.
///
/// Fails with [`SqlError::Metadata`] when the cursor cannot report its
/// column types. The cursor's rows are left untouched.
pub fn resolve_columns<C: Cursor + ?Sized>(
    cursor: &C,
) -> SqlResult<(Vec<ColumnDescriptor>, ColumnTypeIndex)> {
    let columns = cursor.column_types().map_err(SqlError::metadata)?;
    Ok(describe_columns(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;

    fn cars() -> MemoryCursor {
        MemoryCursor::new([("id", "INT4"), ("name", "VARCHAR"), ("price", "INT4")])
    }

    #[test]
    fn test_resolve_columns() {
        let (descriptors, index) = resolve_columns(&cars()).unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(
            descriptors[0],
            ColumnDescriptor {
                sequence: 1,
                name: "id".into(),
                type_name: "INT4".into()
            }
        );
        assert_eq!(descriptors[2].sequence, 3);
        assert_eq!(index.get("name"), Some("VARCHAR"));
        assert_eq!(index.family("price"), TypeFamily::Integer);
        assert_eq!(index.family("missing"), TypeFamily::Other);
    }

    #[test]
    fn test_resolve_columns_is_repeatable() {
        let first = resolve_columns(&cars()).unwrap();
        let second = resolve_columns(&cars()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_metadata_error_is_propagated() {
        let err = resolve_columns(&cars().without_metadata()).unwrap_err();
        assert!(matches!(err, SqlError::Metadata(_)));
        assert!(err.to_string().contains("column types are not available"));
    }

    #[test]
    fn test_duplicate_names_last_one_wins() {
        let cursor = MemoryCursor::new([("v", "INT4"), ("v", "TEXT")]);
        let (descriptors, index) = resolve_columns(&cursor).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("v"), Some("TEXT"));
    }

    #[test]
    fn test_descriptor_json() {
        let (descriptors, index) = resolve_columns(&cars()).unwrap();
        let json = serde_json::to_string(&descriptors[0]).unwrap();
        assert_eq!(json, r#"{"sequence":1,"name":"id","type":"INT4"}"#);
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"id":"INT4","name":"VARCHAR","price":"INT4"}"#);
    }
}

//! Loosely-typed records.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{Entity, EntityDescriptor};
use crate::error::{Error, Result};
use crate::handler::SqlValue;
use crate::value::Value;

/// Column names shared by every row of one result set.
///
/// Lookups ignore ASCII case. When a name repeats, the first column wins.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_to_index.entry(name.to_ascii_lowercase()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(&name.to_ascii_lowercase()).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A row that captures every column of its result set.
///
/// Materializing into `DynamicRow` never fails on shape: whatever columns
/// the query returns are kept, addressable by ordinal or by name.
#[derive(Debug, Clone)]
pub struct DynamicRow {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl DynamicRow {
    /// Create a row with its own column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self::with_columns(Arc::new(ColumnInfo::new(column_names)), values)
    }

    /// Create a row sharing column metadata with its siblings.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.index_of(name).is_some()
    }

    /// Get a typed value by column index.
    pub fn get_as<T: SqlValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::conversion(
                std::any::type_name::<T>(),
                format!("index {index} out of bounds (row has {} columns)", self.len()),
            )
        })?;
        T::from_sql(value).map_err(|e| match self.columns.name_at(index) {
            Some(name) => e.in_column(name),
            None => e,
        })
    }

    /// Get a typed value by column name.
    pub fn get_named<T: SqlValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::conversion(std::any::type_name::<T>(), format!("column '{name}' not found"))
                .in_column(name)
        })?;
        T::from_sql(value).map_err(|e| e.in_column(name))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Entity for DynamicRow {
    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new("DynamicRow").capture_all(DynamicRow::with_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DynamicRow {
        DynamicRow::new(
            vec!["Id".into(), "Name".into(), "id".into()],
            vec![Value::Int(1), Value::Text("Ada".into()), Value::Int(9)],
        )
    }

    #[test]
    fn name_lookup_ignores_case_and_keeps_first() {
        let row = sample();
        assert_eq!(row.get_by_name("NAME"), Some(&Value::Text("Ada".into())));
        assert_eq!(row.get_by_name("ID"), Some(&Value::Int(1)));
        assert!(row.contains_column("name"));
        assert!(!row.contains_column("age"));
    }

    #[test]
    fn typed_access() {
        let row = sample();
        assert_eq!(row.get_as::<i64>(0).unwrap(), 1);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Ada");

        let err = row.get_named::<i32>("Name").unwrap_err();
        match err {
            Error::Conversion(e) => assert_eq!(e.column.as_deref(), Some("Name")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(row.get_as::<i32>(7).is_err());
    }

    #[test]
    fn iter_pairs() {
        let row = sample();
        let names: Vec<_> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Id", "Name", "id"]);
        assert_eq!(row.into_values().len(), 3);
    }
}

//! Column-oriented in-memory table shared by all pipeline stages.
//!
//! Every column holds exactly `row_count` cells. Stages never reorder cells,
//! they only append, replace, rename or drop whole columns.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Borrow the cell as text; every non-text value yields `None`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// A column repeating one value `len` times
    pub fn filled(name: impl Into<String>, value: Value, len: usize) -> Self {
        Self::new(name, vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build an empty table with a fixed number of rows and no columns
    pub fn with_rows(row_count: usize) -> Self {
        Self {
            columns: Vec::new(),
            row_count,
        }
    }

    /// Build a table from a header row and row-major data. Short rows are
    /// padded with nulls; extra cells beyond the header are ignored.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Value::Null));
            }
        }

        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Exact-name lookup
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First column whose lowercased header contains `fragment`
    pub fn find_column(&self, fragment: &str) -> Option<&str> {
        let fragment = fragment.to_lowercase();
        self.columns
            .iter()
            .find(|c| c.name.to_lowercase().contains(&fragment))
            .map(|c| c.name.as_str())
    }

    /// Append a column, or replace the column with the same name in place.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if column.len() != self.row_count {
            return Err(PipelineError::ColumnLength {
                column: column.name,
                expected: self.row_count,
                actual: column.values.len(),
            });
        }

        match self.column_index(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    /// Drop the named columns; unknown names are ignored
    pub fn drop_columns<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.columns
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.name));
        self
    }

    /// Rewrite every header through `f`
    pub fn rename_columns<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        for column in self.columns.iter_mut() {
            column.name = f(&column.name);
        }
        self
    }

    /// Cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Row-major iteration, one vector of borrowed cells per row
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count).map(move |i| self.columns.iter().map(|c| &c.values[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["Unnamed: 0".to_string(), "Город".to_string()],
            vec![
                vec![Value::text("0"), Value::text("Москва")],
                vec![Value::text("1")],
            ],
        )
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let table = sample();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(1, "Город"), Some(&Value::Null));
    }

    #[test]
    fn test_with_column_rejects_length_mismatch() {
        let table = sample();
        let result = table.with_column(Column::filled("city", Value::Null, 3));
        assert!(matches!(
            result,
            Err(PipelineError::ColumnLength { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_with_column_replaces_existing() {
        let table = sample()
            .with_column(Column::filled("Город", Value::text("x"), 2))
            .unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.get(0, "Город"), Some(&Value::text("x")));
    }

    #[test]
    fn test_find_column_is_case_insensitive() {
        let table = sample();
        assert_eq!(table.find_column("UNNAMED"), Some("Unnamed: 0"));
        assert_eq!(table.find_column("город"), Some("Город"));
        assert_eq!(table.find_column("зп"), None);
    }

    #[test]
    fn test_drop_keeps_row_count() {
        let table = sample().drop_columns(&["Unnamed: 0", "Город"]);
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(90000.0).to_string(), "90000");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}

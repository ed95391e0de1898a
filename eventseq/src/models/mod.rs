//! Domain models for the eventseq pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Table`] - Encoded, column-oriented input of the grouping engine
//! - [`Column`] / [`ColumnData`] - One named column and its typed values
//! - [`Cell`] - A single value taken out of a column
//! - [`EntityKey`] - Identifier of one entity (user, account, card...)
//! - [`FieldValue`] - One field of an assembled entity record

use ndarray::{Array1, ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::{TableError, TableResult};

// =============================================================================
// Column Kind
// =============================================================================

/// Declared kind of a column's values.
///
/// Set by the encoder that produced the column; the grouping engine reads
/// this tag instead of inspecting values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Int,
    Float,
    Category,
    Text,
    Tensor,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Category => "category",
            ColumnKind::Text => "text",
            ColumnKind::Tensor => "tensor",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Column Data
// =============================================================================

/// Typed values of one column, one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Integer numeric values.
    Int(Vec<i64>),
    /// Floating point numeric values.
    Float(Vec<f64>),
    /// Unordered labels stored as integer codes.
    ///
    /// Codes start at 1; `categories[code - 1]` is the label. Code 0 marks
    /// a value that was not seen while fitting. An empty dictionary means
    /// the codes came in already encoded.
    Category {
        codes: Vec<i64>,
        categories: Vec<String>,
    },
    /// Raw object values passed through untouched.
    Text(Vec<String>),
    /// One pre-vectorized array per row, all of `shape`.
    Tensor {
        shape: Vec<usize>,
        rows: Vec<ArrayD<f64>>,
    },
}

impl ColumnData {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Category { codes, .. } => codes.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Tensor { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Int(_) => ColumnKind::Int,
            ColumnData::Float(_) => ColumnKind::Float,
            ColumnData::Category { .. } => ColumnKind::Category,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Tensor { .. } => ColumnKind::Tensor,
        }
    }

    /// Value at `row`, or `None` when out of bounds.
    pub fn cell(&self, row: usize) -> Option<Cell> {
        match self {
            ColumnData::Int(v) => v.get(row).map(|x| Cell::Int(*x)),
            ColumnData::Float(v) => v.get(row).map(|x| Cell::Float(*x)),
            ColumnData::Category { codes, .. } => codes.get(row).map(|c| Cell::Code(*c)),
            ColumnData::Text(v) => v.get(row).map(|s| Cell::Text(s.clone())),
            ColumnData::Tensor { rows, .. } => rows.get(row).map(|a| Cell::Tensor(a.clone())),
        }
    }

    /// Label of a category code, if the column carries a dictionary.
    pub fn category_label(&self, code: i64) -> Option<&str> {
        match self {
            ColumnData::Category { categories, .. } if code >= 1 => {
                categories.get((code - 1) as usize).map(String::as_str)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Column & Table
// =============================================================================

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }
}

/// Fully encoded input of the grouping engine.
///
/// All columns have the same row count and distinct names. The engine only
/// borrows a table; it is never reordered in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking row counts and name uniqueness.
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map(Column::len).unwrap_or(0);

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != expected {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected,
                    actual: column.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append a column, with the same checks as [`Table::new`].
    pub fn push(&mut self, column: Column) -> TableResult<()> {
        if self.column(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(TableError::LengthMismatch {
                expected: self.num_rows(),
                actual: column.len(),
                column: column.name,
            });
        }
        self.columns.push(column);
        Ok(())
    }
}

// =============================================================================
// Cell
// =============================================================================

/// One value of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Code(i64),
    Text(String),
    Tensor(ArrayD<f64>),
}

impl Cell {
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Int(v) | Cell::Code(v) => json!(v),
            Cell::Float(v) => float_to_json(*v),
            Cell::Text(s) => json!(s),
            Cell::Tensor(a) => array_to_json(a.view()),
        }
    }
}

// =============================================================================
// Entity Key
// =============================================================================

/// Identifier of one entity.
///
/// Integer keys order before text keys; a single identifier column only
/// ever produces one variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    Int(i64),
    Text(String),
}

impl EntityKey {
    pub fn to_json(&self) -> Value {
        match self {
            EntityKey::Int(v) => json!(v),
            EntityKey::Text(s) => json!(s),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(v) => write!(f, "{}", v),
            EntityKey::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(v: i64) -> Self {
        EntityKey::Int(v)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey::Text(s.to_string())
    }
}

// =============================================================================
// Field Value
// =============================================================================

/// One field of an entity record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// First-item column: the earliest row's value.
    First(Cell),
    /// Tensor column: `(group_size, *item_shape)`.
    Stacked(ArrayD<f64>),
    /// Category column: integer codes.
    Codes(Array1<i64>),
    /// Text column: raw values.
    Text(Vec<String>),
    /// Integer numeric column.
    Int(Array1<i64>),
    /// Float numeric column.
    Float(Array1<f64>),
}

impl FieldValue {
    /// Number of steps for sequence fields, `None` for first-item scalars.
    pub fn seq_len(&self) -> Option<usize> {
        match self {
            FieldValue::First(_) => None,
            FieldValue::Stacked(a) => a.shape().first().copied(),
            FieldValue::Codes(a) => Some(a.len()),
            FieldValue::Text(v) => Some(v.len()),
            FieldValue::Int(a) => Some(a.len()),
            FieldValue::Float(a) => Some(a.len()),
        }
    }

    pub fn is_sequence(&self) -> bool {
        !matches!(self, FieldValue::First(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::First(cell) => cell.to_json(),
            FieldValue::Stacked(a) => array_to_json(a.view()),
            FieldValue::Codes(a) | FieldValue::Int(a) => json!(a.to_vec()),
            FieldValue::Text(v) => json!(v),
            FieldValue::Float(a) => Value::Array(a.iter().map(|x| float_to_json(*x)).collect()),
        }
    }
}

/// Non-finite floats have no JSON form and render as `null`.
pub(crate) fn float_to_json(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Nested JSON arrays, outermost axis first.
pub(crate) fn array_to_json(view: ArrayViewD<'_, f64>) -> Value {
    if view.ndim() == 0 {
        return view.iter().next().map(|x| float_to_json(*x)).unwrap_or(Value::Null);
    }
    Value::Array(view.outer_iter().map(array_to_json).collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_table_rejects_length_mismatch() {
        let result = Table::new(vec![
            Column::new("a", ColumnData::Int(vec![1, 2])),
            Column::new("b", ColumnData::Int(vec![1])),
        ]);
        assert!(matches!(
            result,
            Err(TableError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_table_rejects_duplicate_names() {
        let result = Table::new(vec![
            Column::new("a", ColumnData::Int(vec![1])),
            Column::new("a", ColumnData::Float(vec![1.0])),
        ]);
        assert!(matches!(result, Err(TableError::DuplicateColumn(name)) if name == "a"));
    }

    #[test]
    fn test_push_checks_rows() {
        let mut table = Table::new(vec![Column::new("a", ColumnData::Int(vec![1, 2]))]).unwrap();
        assert!(table
            .push(Column::new("b", ColumnData::Text(vec!["x".into()])))
            .is_err());
        table
            .push(Column::new("b", ColumnData::Text(vec!["x".into(), "y".into()])))
            .unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_category_label() {
        let data = ColumnData::Category {
            codes: vec![1, 2, 0],
            categories: vec!["food".into(), "travel".into()],
        };
        assert_eq!(data.category_label(1), Some("food"));
        assert_eq!(data.category_label(2), Some("travel"));
        assert_eq!(data.category_label(0), None);
        assert_eq!(data.cell(2), Some(Cell::Code(0)));
    }

    #[test]
    fn test_entity_key_ordering() {
        let mut keys = vec![
            EntityKey::from("b"),
            EntityKey::from(10),
            EntityKey::from("a"),
            EntityKey::from(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                EntityKey::Int(2),
                EntityKey::Int(10),
                EntityKey::Text("a".into()),
                EntityKey::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_field_value_json() {
        let stacked = FieldValue::Stacked(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        assert_eq!(stacked.to_json(), json!([[1.0, 2.0], [3.0, 4.0]]));
        assert_eq!(stacked.seq_len(), Some(2));

        let floats = FieldValue::Float(arr1(&[1.5, f64::NAN]));
        assert_eq!(floats.to_json(), json!([1.5, null]));

        let first = FieldValue::First(Cell::Text("gold".into()));
        assert_eq!(first.to_json(), json!("gold"));
        assert_eq!(first.seq_len(), None);
    }
}

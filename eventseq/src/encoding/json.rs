//! Already-encoded JSON rows to a [`Table`].
//!
//! Used when the encoding happened elsewhere and only grouping is left.
//! A column's kind follows its first non-null value:
//!
//! - integers -> `Int` (any float or null turns it into `Float`, null = `NaN`)
//! - other numbers -> `Float`
//! - arrays of numbers (nested arrays allowed) -> `Tensor`
//! - anything else -> `Text` (strings verbatim, other values as JSON text)

use serde_json::Value;

use crate::error::{EncodeError, EncodeResult};
use crate::models::{Column, ColumnData, Table};

use super::tensor::row_from_shape;

/// Build a table from an array of JSON objects.
///
/// Columns appear in order of first appearance across rows; a key missing
/// from a row counts as null.
pub fn table_from_json_rows(rows: &[Value]) -> EncodeResult<Table> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let cells: Vec<&Value> = rows
            .iter()
            .map(|row| row.get(&name).unwrap_or(&Value::Null))
            .collect();
        let data = column_from_cells(&name, &cells)?;
        columns.push(Column::new(name, data));
    }

    Ok(Table::new(columns)?)
}

fn column_from_cells(name: &str, cells: &[&Value]) -> EncodeResult<ColumnData> {
    match cells.iter().find(|v| !v.is_null()) {
        Some(Value::Number(_)) => numeric_column(name, cells),
        Some(Value::Array(_)) => tensor_column(name, cells),
        _ => Ok(ColumnData::Text(
            cells
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect(),
        )),
    }
}

fn numeric_column(name: &str, cells: &[&Value]) -> EncodeResult<ColumnData> {
    let ints: Option<Vec<i64>> = cells.iter().map(|v| v.as_i64()).collect();
    if let Some(values) = ints {
        return Ok(ColumnData::Int(values));
    }

    let mut values = Vec::with_capacity(cells.len());
    for (row, cell) in cells.iter().enumerate() {
        match cell {
            Value::Null => values.push(f64::NAN),
            other => values.push(other.as_f64().ok_or_else(|| EncodeError::InvalidNumber {
                column: name.to_string(),
                row,
                value: other.to_string(),
            })?),
        }
    }
    Ok(ColumnData::Float(values))
}

fn tensor_column(name: &str, cells: &[&Value]) -> EncodeResult<ColumnData> {
    let mut shape: Option<Vec<usize>> = None;
    let mut rows = Vec::with_capacity(cells.len());

    for (row, cell) in cells.iter().enumerate() {
        let mut row_shape = Vec::new();
        let mut flat = Vec::new();
        flatten(name, row, cell, 0, &mut row_shape, &mut flat)?;

        let expected = shape.get_or_insert_with(|| row_shape.clone());
        let array = if *expected == row_shape {
            row_from_shape(&row_shape, flat)
        } else {
            None
        };
        match array {
            Some(array) => rows.push(array),
            None => {
                return Err(EncodeError::InconsistentShape {
                    column: name.to_string(),
                    row,
                    expected: expected.clone(),
                    actual: row_shape,
                })
            }
        }
    }

    Ok(ColumnData::Tensor {
        shape: shape.unwrap_or_default(),
        rows,
    })
}

/// Depth-first flatten; records the length seen at each depth the first
/// time it is reached and rejects ragged arrays.
fn flatten(
    name: &str,
    row: usize,
    value: &Value,
    depth: usize,
    shape: &mut Vec<usize>,
    out: &mut Vec<f64>,
) -> EncodeResult<()> {
    match value {
        Value::Array(items) => {
            if shape.len() == depth {
                shape.push(items.len());
            } else if shape.get(depth) != Some(&items.len()) {
                let mut actual = shape[..depth].to_vec();
                actual.push(items.len());
                return Err(EncodeError::InconsistentShape {
                    column: name.to_string(),
                    row,
                    expected: shape.clone(),
                    actual,
                });
            }
            for item in items {
                flatten(name, row, item, depth + 1, shape, out)?;
            }
            Ok(())
        }
        other => match other.as_f64() {
            Some(x) if depth == shape.len() => {
                out.push(x);
                Ok(())
            }
            _ => Err(EncodeError::InvalidNumber {
                column: name.to_string(),
                row,
                value: other.to_string(),
            }),
        },
    }
}

//! Pre-vectorized columns: one numeric vector per cell.

use ndarray::{Array1, ArrayD};

use crate::error::{EncodeError, EncodeResult};
use crate::models::ColumnData;

use super::ColumnEncoder;

/// Parses cells such as `0.1 0.2 0.3` or `[0.1, 0.2, 0.3]` into 1-D arrays.
///
/// Every row of the column must have the same length; this is what lets the
/// grouping engine stack rows without re-checking.
#[derive(Debug, Clone)]
pub struct TensorEncoder {
    column: String,
    separator: String,
}

impl TensorEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            separator: " ".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn parse_cell(&self, row: usize, cell: &str) -> EncodeResult<Vec<f64>> {
        let inner = cell.trim().trim_start_matches('[').trim_end_matches(']');
        inner
            .split(self.separator.as_str())
            .map(|piece| piece.trim().trim_end_matches(','))
            .filter(|piece| !piece.is_empty())
            .map(|piece| {
                piece.parse::<f64>().map_err(|_| EncodeError::InvalidNumber {
                    column: self.column.clone(),
                    row,
                    value: piece.to_string(),
                })
            })
            .collect()
    }
}

impl ColumnEncoder for TensorEncoder {
    fn source(&self) -> &str {
        &self.column
    }

    fn target(&self) -> &str {
        &self.column
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        let mut shape: Option<Vec<usize>> = None;
        let mut rows = Vec::with_capacity(raw.len());

        for (row, cell) in raw.iter().enumerate() {
            let values = self.parse_cell(row, cell)?;
            let row_shape = vec![values.len()];
            match &shape {
                Some(expected) if *expected != row_shape => {
                    return Err(EncodeError::InconsistentShape {
                        column: self.column.clone(),
                        row,
                        expected: expected.clone(),
                        actual: row_shape,
                    });
                }
                Some(_) => {}
                None => shape = Some(row_shape),
            }
            rows.push(Array1::from(values).into_dyn());
        }

        Ok(ColumnData::Tensor {
            shape: shape.unwrap_or_default(),
            rows,
        })
    }
}

/// Build an n-dimensional row from a flat buffer, checking its shape.
pub(crate) fn row_from_shape(shape: &[usize], values: Vec<f64>) -> Option<ArrayD<f64>> {
    ArrayD::from_shape_vec(shape.to_vec(), values).ok()
}

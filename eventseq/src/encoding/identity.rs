//! Pass-through encoders.

use crate::error::{EncodeError, EncodeResult};
use crate::models::ColumnData;

use super::ColumnEncoder;

/// Numeric column, values kept as they are.
///
/// Produces `Int` when every cell is an integer, `Float` otherwise. Empty
/// cells become `NaN` and force a `Float` column.
#[derive(Debug, Clone)]
pub struct NumericIdentity {
    source: String,
    target: String,
}

impl NumericIdentity {
    pub fn new(column: impl Into<String>) -> Self {
        let source = column.into();
        Self {
            target: source.clone(),
            source,
        }
    }

    /// Write the result under another name (used for `event_time`).
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl ColumnEncoder for NumericIdentity {
    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        let ints: Option<Vec<i64>> = raw.iter().map(|s| s.trim().parse().ok()).collect();
        if let Some(values) = ints {
            return Ok(ColumnData::Int(values));
        }

        let mut values = Vec::with_capacity(raw.len());
        for (row, cell) in raw.iter().enumerate() {
            let cell = cell.trim();
            if cell.is_empty() {
                values.push(f64::NAN);
                continue;
            }
            let value = cell.parse::<f64>().map_err(|_| EncodeError::InvalidNumber {
                column: self.source.clone(),
                row,
                value: cell.to_string(),
            })?;
            values.push(value);
        }
        Ok(ColumnData::Float(values))
    }
}

/// Column passed through as raw text.
#[derive(Debug, Clone)]
pub struct TextIdentity {
    column: String,
}

impl TextIdentity {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl ColumnEncoder for TextIdentity {
    fn source(&self) -> &str {
        &self.column
    }

    fn target(&self) -> &str {
        &self.column
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        Ok(ColumnData::Text(raw.to_vec()))
    }
}

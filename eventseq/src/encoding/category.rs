//! Categorical encoders.

use std::collections::HashMap;

use crate::error::{EncodeError, EncodeResult};
use crate::models::ColumnData;

use super::ColumnEncoder;

/// Frequency encoding: the most frequent value gets code 1, the next one 2,
/// and so on. Ties keep the order of first appearance. Values unseen while
/// fitting get code 0.
#[derive(Debug, Clone)]
pub struct FrequencyEncoder {
    column: String,
    categories: Option<Vec<String>>,
    mapping: HashMap<String, i64>,
}

impl FrequencyEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            categories: None,
            mapping: HashMap::new(),
        }
    }

    /// Fitted labels, most frequent first.
    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_deref()
    }

    /// Number of codes including the reserved 0.
    pub fn dictionary_size(&self) -> usize {
        self.categories.as_ref().map(|c| c.len() + 1).unwrap_or(0)
    }
}

impl ColumnEncoder for FrequencyEncoder {
    fn source(&self) -> &str {
        &self.column
    }

    fn target(&self) -> &str {
        &self.column
    }

    fn fit(&mut self, raw: &[String]) -> EncodeResult<()> {
        // (count, first appearance)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for (row, value) in raw.iter().enumerate() {
            stats.entry(value.as_str()).or_insert((0, row)).0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = stats.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        let categories: Vec<String> = ranked.into_iter().map(|(v, _)| v.to_string()).collect();
        self.mapping = categories
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as i64 + 1))
            .collect();
        self.categories = Some(categories);
        Ok(())
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        let categories = self
            .categories
            .as_ref()
            .ok_or_else(|| EncodeError::NotFitted(self.column.clone()))?;

        let codes = raw
            .iter()
            .map(|v| self.mapping.get(v).copied().unwrap_or(0))
            .collect();

        Ok(ColumnData::Category {
            codes,
            categories: categories.clone(),
        })
    }
}

/// Categorical column whose cells already are non-negative integer codes.
#[derive(Debug, Clone)]
pub struct CategoryIdentity {
    column: String,
}

impl CategoryIdentity {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl ColumnEncoder for CategoryIdentity {
    fn source(&self) -> &str {
        &self.column
    }

    fn target(&self) -> &str {
        &self.column
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        let mut codes = Vec::with_capacity(raw.len());
        for (row, cell) in raw.iter().enumerate() {
            match cell.trim().parse::<i64>() {
                Ok(code) if code >= 0 => codes.push(code),
                _ => {
                    return Err(EncodeError::InvalidCode {
                        column: self.column.clone(),
                        row,
                        value: cell.clone(),
                    })
                }
            }
        }
        Ok(ColumnData::Category {
            codes,
            categories: Vec::new(),
        })
    }
}

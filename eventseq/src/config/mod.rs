//! Declarative preprocessor configuration.
//!
//! Column lists route each raw column to one encoder; the two
//! `*_transformation` names pick the encoder family. Names are resolved with
//! [`PreprocessorConfig::event_time_transformation`] and
//! [`PreprocessorConfig::category_transformation`], which reject unknown
//! values with [`ConfigError::UnknownTransformation`].
//!
//! # Example
//!
//! ```json
//! {
//!   "col_id": "client_id",
//!   "col_event_time": "trans_date",
//!   "cols_category": ["mcc", "channel"],
//!   "cols_numerical": ["amount"],
//!   "cols_first_item": ["segment"],
//!   "return_records": true
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::encoding::EVENT_TIME_COLUMN;
use crate::error::{ConfigError, ConfigResult};
use crate::transform::OutputFormat;
use crate::validation::validate_preprocessor_config;

/// How the raw event-time column becomes `event_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTimeTransformation {
    /// Parse datetimes to Unix seconds, drop the original column.
    DatetimeToTimestamp,
    /// Use the column as-is, keep the original column.
    None,
}

impl EventTimeTransformation {
    pub const NAMES: &'static str = "dt_to_timestamp, none";

    pub fn parse(name: &str) -> ConfigResult<Self> {
        match name {
            "dt_to_timestamp" => Ok(Self::DatetimeToTimestamp),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownTransformation {
                kind: "event_time",
                name: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// How categorical columns are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryTransformation {
    /// Codes ranked by frequency.
    Frequency,
    /// Cells already are codes.
    None,
}

impl CategoryTransformation {
    pub const NAMES: &'static str = "frequency, none";

    pub fn parse(name: &str) -> ConfigResult<Self> {
        match name {
            "frequency" => Ok(Self::Frequency),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownTransformation {
                kind: "category",
                name: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// Preprocessor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Identifier column, used for grouping
    pub col_id: String,

    /// Raw event-time column
    pub col_event_time: String,

    /// `dt_to_timestamp` or `none`
    #[serde(default = "default_event_time_transformation")]
    pub event_time_transformation: String,

    #[serde(default)]
    pub cols_category: Vec<String>,

    /// `frequency` or `none`
    #[serde(default = "default_category_transformation")]
    pub category_transformation: String,

    #[serde(default)]
    pub cols_numerical: Vec<String>,

    /// Passed through as text
    #[serde(default)]
    pub cols_identity: Vec<String>,

    /// Pre-vectorized columns, one numeric vector per cell
    #[serde(default)]
    pub cols_tensor: Vec<String>,

    /// Separator between vector components inside a tensor cell
    #[serde(default = "default_tensor_separator")]
    pub tensor_separator: String,

    /// Only the earliest value is kept for these columns
    #[serde(default)]
    pub cols_first_item: Vec<String>,

    /// `true`: list of entity records, `false`: one columnar frame
    #[serde(default = "default_return_records")]
    pub return_records: bool,

    /// Assemble entities on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

fn default_event_time_transformation() -> String {
    "dt_to_timestamp".to_string()
}

fn default_category_transformation() -> String {
    "frequency".to_string()
}

fn default_tensor_separator() -> String {
    " ".to_string()
}

fn default_return_records() -> bool {
    true
}

impl PreprocessorConfig {
    /// Minimal configuration; every list empty.
    pub fn new(col_id: impl Into<String>, col_event_time: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            col_event_time: col_event_time.into(),
            event_time_transformation: default_event_time_transformation(),
            cols_category: Vec::new(),
            category_transformation: default_category_transformation(),
            cols_numerical: Vec::new(),
            cols_identity: Vec::new(),
            cols_tensor: Vec::new(),
            tensor_separator: default_tensor_separator(),
            cols_first_item: Vec::new(),
            return_records: default_return_records(),
            parallel: false,
        }
    }

    /// Parse from JSON, validating against the embedded schema first.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        validate_preprocessor_config(&value).map_err(ConfigError::Schema)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn event_time_transformation(&self) -> ConfigResult<EventTimeTransformation> {
        EventTimeTransformation::parse(&self.event_time_transformation)
    }

    pub fn category_transformation(&self) -> ConfigResult<CategoryTransformation> {
        CategoryTransformation::parse(&self.category_transformation)
    }

    /// Check that no two settings write the same encoded column.
    ///
    /// The identifier and `event_time` are claimed first, then the original
    /// event-time column when it is kept, then the column lists in order.
    pub fn check_columns(&self) -> ConfigResult<()> {
        let mut owners: HashMap<&str, &'static str> = HashMap::new();
        owners.insert(self.col_id.as_str(), "col_id");
        if let Some(owner) = owners.insert(EVENT_TIME_COLUMN, "col_event_time") {
            return Err(ConfigError::ColumnConflict {
                column: EVENT_TIME_COLUMN.to_string(),
                list: "col_event_time",
                owner,
            });
        }

        let keeps_time_column = self.event_time_transformation()? == EventTimeTransformation::None
            && self.col_event_time != EVENT_TIME_COLUMN;
        let kept_time: &[String] = if keeps_time_column {
            std::slice::from_ref(&self.col_event_time)
        } else {
            &[]
        };

        let lists: [(&'static str, &[String]); 5] = [
            ("col_event_time", kept_time),
            ("cols_category", self.cols_category.as_slice()),
            ("cols_numerical", self.cols_numerical.as_slice()),
            ("cols_identity", self.cols_identity.as_slice()),
            ("cols_tensor", self.cols_tensor.as_slice()),
        ];
        for (list, columns) in lists {
            for column in columns {
                if let Some(owner) = owners.insert(column.as_str(), list) {
                    return Err(ConfigError::ColumnConflict {
                        column: column.clone(),
                        list,
                        owner,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_records_flag(self.return_records)
    }
}

/// Configuration printed by `eventseq example-config`.
pub fn example_config() -> PreprocessorConfig {
    PreprocessorConfig {
        cols_category: vec!["mcc".to_string(), "channel".to_string()],
        cols_numerical: vec!["amount".to_string()],
        cols_tensor: vec!["merchant_embedding".to_string()],
        cols_first_item: vec!["segment".to_string()],
        cols_identity: vec!["segment".to_string()],
        ..PreprocessorConfig::new("client_id", "trans_date")
    }
}

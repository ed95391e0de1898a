//! Error types for the eventseq preprocessing pipeline.
//!
//! One enum per layer, converted upward with `From`:
//!
//! - [`CsvError`] - CSV reading and decoding errors
//! - [`TableError`] - Encoded table construction errors
//! - [`EncodeError`] - Column encoding errors
//! - [`ConfigError`] - Preprocessor configuration errors
//! - [`GroupError`] - Grouping & sequence-assembly errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! The grouping core never retries and never returns partial output:
//! either every entity record is produced or an error reaches the caller.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading a raw CSV table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode bytes in the detected encoding.
    #[error("Failed to decode content as {0}")]
    EncodingError(String),

    /// Malformed CSV row.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors while assembling an encoded [`crate::models::Table`].
#[derive(Debug, Error)]
pub enum TableError {
    /// A column does not have the same row count as the first one.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Two columns share a name.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

// =============================================================================
// Encoding Errors
// =============================================================================

/// Errors from the column encoding stage.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Source column absent from the raw table.
    #[error("Missing source column: {0}")]
    MissingColumn(String),

    /// Cell could not be read as a number.
    #[error("Column '{column}', row {row}: '{value}' is not a number")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    /// Cell could not be read as a datetime.
    #[error("Column '{column}', row {row}: '{value}' is not a supported datetime")]
    InvalidDatetime {
        column: String,
        row: usize,
        value: String,
    },

    /// Cell is not a non-negative integer category code.
    #[error("Column '{column}', row {row}: '{value}' is not a category code")]
    InvalidCode {
        column: String,
        row: usize,
        value: String,
    },

    /// Tensor cells of one column disagree on shape.
    #[error("Column '{column}', row {row}: shape {actual:?} differs from {expected:?}")]
    InconsistentShape {
        column: String,
        row: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// `encode` called on an encoder that needs fitting first.
    #[error("Encoder for column '{0}' has not been fitted")]
    NotFitted(String),

    /// Encoded columns could not form a table.
    #[error(transparent)]
    Table(#[from] TableError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building a preprocessor from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unrecognized encoding policy name.
    #[error("Unknown {kind} transformation '{name}' (expected one of: {expected})")]
    UnknownTransformation {
        kind: &'static str,
        name: String,
        expected: &'static str,
    },

    /// Two settings produce the same output column.
    #[error("Column '{column}' in {list} is already produced by {owner}")]
    ColumnConflict {
        column: String,
        list: &'static str,
        owner: &'static str,
    },

    /// Schema validation failed.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Schema(Vec<String>),

    /// IO error.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Grouping Errors
// =============================================================================

/// Errors from the grouping & sequence-assembly engine.
#[derive(Debug, Error)]
pub enum GroupError {
    /// Identifier or event-time column absent. Raised before any grouping work.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Identifier column values are not hashable/comparable keys.
    #[error("Column '{column}' cannot be used as entity identifier ({kind} values)")]
    UnsupportedIdColumn { column: String, kind: &'static str },

    /// Event-time column values are not totally ordered scalars.
    #[error("Column '{column}' cannot be used as event time ({kind} values)")]
    UnsupportedTimeColumn { column: String, kind: &'static str },

    /// Tensor rows of one entity could not be stacked.
    #[error("Cannot stack column '{column}' for entity {entity}: {source}")]
    ShapeMismatch {
        column: String,
        entity: String,
        #[source]
        source: ndarray::ShapeError,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::transform_csv`]
/// and the [`crate::transform::pipeline::DataPreprocessor`] methods.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Table construction error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Grouping error.
    #[error("Grouping error: {0}")]
    Group(#[from] GroupError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for table construction.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for grouping operations.
pub type GroupResult<T> = Result<T, GroupError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

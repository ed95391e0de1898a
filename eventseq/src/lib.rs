//! # eventseq - event tables to per-entity sequences
//!
//! eventseq turns flat event tables (one row per event, e.g. card
//! transactions) into one record per entity, every column ordered by event
//! time, ready to feed a sequence model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Encoders   │────▶│   Grouper   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (fit/encode)│     │ (per entity)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eventseq::{transform, Table};
//!
//! let grouped = transform(&table, "client_id", ["segment"], true)?;
//! for record in grouped.into_records() {
//!     println!("{} -> {:?}", record.id, record.seq_len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Encoded table and output values
//! - [`parser`] - CSV parsing with auto-detection
//! - [`encoding`] - Column encoders
//! - [`config`] - Preprocessor configuration
//! - [`transform`] - Grouping, assembly, and pipeline
//! - [`validation`] - JSON Schema and sequence checks
//! - [`logs`] - Progress log broadcasting

// Core modules
pub mod error;
pub mod models;

// Logging
pub mod logs;

// Parsing
pub mod parser;

// Encoding
pub mod config;
pub mod encoding;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, EncodeError, GroupError, PipelineError, TableError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, ColumnData, ColumnKind, EntityKey, FieldValue, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, format_delimiter, parse_bytes_auto,
    parse_csv_file_auto, parse_csv_str, ParseResult, RawTable,
};

// =============================================================================
// Re-exports - Encoding & Config
// =============================================================================

pub use config::{example_config, CategoryTransformation, EventTimeTransformation, PreprocessorConfig};
pub use encoding::{table_from_json_rows, ColumnEncoder, EVENT_TIME_COLUMN};

// =============================================================================
// Re-exports - Grouper
// =============================================================================

pub use transform::{
    transform, ContainerPolicy, EntityFrame, EntityGrouper, EntityRecord, GroupProgress,
    GroupedOutput, OutputFormat, ProgressHook,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{transform_bytes, transform_csv, CsvInfo, DataPreprocessor, TransformOutput};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{check_sequence_alignment, is_valid, validate, validate_preprocessor_config};

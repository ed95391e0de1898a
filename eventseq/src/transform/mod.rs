//! Transformation module.
//!
//! This module handles encoded table to entity sequence transformation:
//! - Grouper: flat event rows to one record per entity
//! - Assembly: records and the columnar frame
//! - Pipeline: encoders plus grouping, driven by a configuration

pub mod assembly;
pub mod grouper;
pub mod pipeline;

pub use assembly::{EntityFrame, EntityRecord, GroupedOutput, OutputFormat};
pub use grouper::{transform, ContainerPolicy, EntityGrouper, GroupProgress, ProgressHook};
pub use pipeline::{transform_bytes, transform_csv, CsvInfo, DataPreprocessor, TransformOutput};

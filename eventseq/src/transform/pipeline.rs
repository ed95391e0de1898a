//! High-level pipeline API: raw CSV to grouped entity sequences.
//!
//! [`DataPreprocessor`] owns one encoder per configured column. `fit` learns
//! the encoder state (category dictionaries), `transform` encodes a raw
//! table and hands it to the [`EntityGrouper`].
//!
//! # Example
//!
//! ```rust,ignore
//! use eventseq::config::PreprocessorConfig;
//! use eventseq::transform::pipeline::transform_csv;
//! use std::path::Path;
//!
//! let config = PreprocessorConfig::load("config.json")?;
//! let result = transform_csv(Path::new("transactions.csv"), &config)?;
//! println!("Grouped {} entities", result.grouped.len());
//! ```

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::{CategoryTransformation, EventTimeTransformation, PreprocessorConfig};
use crate::encoding::{
    encode_key_column, CategoryIdentity, ColumnEncoder, DatetimeToTimestamp, FrequencyEncoder,
    NumericIdentity, TensorEncoder, TextIdentity, EVENT_TIME_COLUMN,
};
use crate::error::{EncodeError, PipelineResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::{Column, Table};
use crate::parser::{
    format_delimiter, parse_bytes_auto, parse_csv_file_auto, ParseResult, RawTable,
};
use crate::validation::check_sequence_alignment;

use super::assembly::GroupedOutput;
use super::grouper::{EntityGrouper, GroupProgress, ProgressHook};

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Result of a complete CSV transformation.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub grouped: GroupedOutput,
    pub csv_info: CsvInfo,
}

// =============================================================================
// Data Preprocessor
// =============================================================================

/// Encoders plus grouping settings, built from a [`PreprocessorConfig`].
pub struct DataPreprocessor {
    config: PreprocessorConfig,
    encoders: Vec<Box<dyn ColumnEncoder>>,
    progress: Option<ProgressHook>,
}

impl std::fmt::Debug for DataPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPreprocessor")
            .field("config", &self.config)
            .field("encoders", &self.output_columns())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl DataPreprocessor {
    /// Build the encoders. Fails on unknown transformation names and on
    /// settings that would produce the same column twice.
    pub fn from_config(config: PreprocessorConfig) -> PipelineResult<Self> {
        let event_time = config.event_time_transformation()?;
        let category = config.category_transformation()?;
        config.check_columns()?;

        let mut encoders: Vec<Box<dyn ColumnEncoder>> = Vec::new();

        match event_time {
            EventTimeTransformation::DatetimeToTimestamp => {
                encoders.push(Box::new(DatetimeToTimestamp::new(&config.col_event_time)));
            }
            EventTimeTransformation::None => {
                encoders.push(Box::new(
                    NumericIdentity::new(&config.col_event_time).with_target(EVENT_TIME_COLUMN),
                ));
                if config.col_event_time != EVENT_TIME_COLUMN {
                    encoders.push(Box::new(NumericIdentity::new(&config.col_event_time)));
                }
            }
        }

        for col in &config.cols_category {
            match category {
                CategoryTransformation::Frequency => encoders.push(Box::new(FrequencyEncoder::new(col))),
                CategoryTransformation::None => encoders.push(Box::new(CategoryIdentity::new(col))),
            }
        }
        for col in &config.cols_numerical {
            encoders.push(Box::new(NumericIdentity::new(col)));
        }
        for col in &config.cols_identity {
            encoders.push(Box::new(TextIdentity::new(col)));
        }
        for col in &config.cols_tensor {
            encoders.push(Box::new(
                TensorEncoder::new(col).with_separator(&config.tensor_separator),
            ));
        }

        Ok(Self {
            config,
            encoders,
            progress: None,
        })
    }

    /// Report grouping progress, once per finished entity.
    pub fn with_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(GroupProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Encoded column names, identifier first.
    pub fn output_columns(&self) -> Vec<&str> {
        std::iter::once(self.config.col_id.as_str())
            .chain(self.encoders.iter().map(|e| e.target()))
            .collect()
    }

    /// Learn encoder state from `raw`.
    pub fn fit(&mut self, raw: &RawTable) -> PipelineResult<()> {
        log_info(format!("Fitting {} encoders on {} rows...", self.encoders.len(), raw.num_rows()));
        for encoder in self.encoders.iter_mut() {
            let cells = raw
                .column(encoder.source())
                .ok_or_else(|| EncodeError::MissingColumn(encoder.source().to_string()))?;
            encoder.fit(cells)?;
        }
        Ok(())
    }

    /// Encode `raw` into a typed table, without grouping.
    ///
    /// Raw columns not named in the configuration are dropped.
    pub fn encode(&self, raw: &RawTable) -> PipelineResult<Table> {
        let id_cells = raw
            .column(&self.config.col_id)
            .ok_or_else(|| EncodeError::MissingColumn(self.config.col_id.clone()))?;

        let mut columns = Vec::with_capacity(self.encoders.len() + 1);
        columns.push(Column::new(&self.config.col_id, encode_key_column(id_cells)));

        for encoder in &self.encoders {
            let cells = raw
                .column(encoder.source())
                .ok_or_else(|| EncodeError::MissingColumn(encoder.source().to_string()))?;
            columns.push(Column::new(encoder.target(), encoder.encode(cells)?));
        }

        let used: HashSet<&str> = std::iter::once(self.config.col_id.as_str())
            .chain(self.encoders.iter().map(|e| e.source()))
            .collect();
        let dropped: Vec<&str> = raw
            .headers()
            .iter()
            .map(String::as_str)
            .filter(|h| !used.contains(h))
            .collect();
        if !dropped.is_empty() {
            log_warning(format!("Dropping unconfigured columns: {}", dropped.join(", ")));
        }

        Ok(Table::new(columns)?)
    }

    /// Encode and group `raw`. Encoders that need fitting must have been fitted.
    pub fn transform(&self, raw: &RawTable) -> PipelineResult<GroupedOutput> {
        log_info(format!("🔄 Encoding {} rows...", raw.num_rows()));
        let table = self.encode(raw)?;
        log_success(format!("Encoded {} columns", table.num_columns()));

        log_info(format!("📦 Grouping by {}...", self.config.col_id));
        let mut grouper = EntityGrouper::new(&self.config.col_id)
            .with_first_items(self.config.cols_first_item.iter().cloned())
            .with_output(self.config.output_format())
            .with_parallel(self.config.parallel);
        if let Some(hook) = &self.progress {
            let hook = Arc::clone(hook);
            grouper = grouper.with_progress(move |p| hook(p));
        }

        for (name, policy) in grouper.policies(&table) {
            log_info_indent(format!("{}: {:?}", name, policy), 1);
        }

        let grouped = grouper.transform(&table)?;
        log_success(format!("{} entities", grouped.len()));

        // Debug builds only; the grouper aligns every sequence field.
        if cfg!(debug_assertions) {
            if let GroupedOutput::Records(records) = &grouped {
                if let Err(errors) = check_sequence_alignment(records) {
                    for err in errors.iter().take(3) {
                        log_error(err.clone());
                    }
                    log_warning(format!("{} entities have misaligned sequences", errors.len()));
                }
            }
        }

        Ok(grouped)
    }

    pub fn fit_transform(&mut self, raw: &RawTable) -> PipelineResult<GroupedOutput> {
        self.fit(raw)?;
        self.transform(raw)
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Transform a CSV file into grouped entity sequences.
///
/// 1. Parses the CSV with encoding and delimiter auto-detection
/// 2. Fits the encoders on the file
/// 3. Encodes and groups
pub fn transform_csv(path: &Path, config: &PreprocessorConfig) -> PipelineResult<TransformOutput> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parse_result = parse_csv_file_auto(path)?;
    transform_parsed(parse_result, config)
}

/// Same as [`transform_csv`] but from raw bytes.
pub fn transform_bytes(bytes: &[u8], config: &PreprocessorConfig) -> PipelineResult<TransformOutput> {
    let parse_result = parse_bytes_auto(bytes)?;
    transform_parsed(parse_result, config)
}

fn transform_parsed(
    parse_result: ParseResult,
    config: &PreprocessorConfig,
) -> PipelineResult<TransformOutput> {
    log_success(format!("Detected encoding: {}", parse_result.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parse_result.delimiter)));
    log_success(format!("Read {} rows", parse_result.table.num_rows()));

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.table.headers().to_vec(),
        row_count: parse_result.table.num_rows(),
    };

    let mut preprocessor = DataPreprocessor::from_config(config.clone())?;
    let grouped = preprocessor.fit_transform(&parse_result.table)?;

    Ok(TransformOutput { grouped, csv_info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, PipelineError};
    use crate::logs::LOG_BROADCASTER;
    use crate::models::{ColumnData, EntityKey, FieldValue};
    use crate::parser::parse_csv_str;
    use ndarray::{arr1, arr2};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CSV: &str = "\
client_id,trans_date,mcc,amount,segment,note
1,2021-01-02 10:00:00,5411,10.5,gold,a
2,2021-01-01 09:00:00,5411,3,silver,b
1,2021-01-01 08:00:00,4111,20,gold,c
1,2021-01-03 00:00:00,5411,7,gold,d
";

    fn config() -> PreprocessorConfig {
        PreprocessorConfig {
            cols_category: vec!["mcc".into()],
            cols_numerical: vec!["amount".into()],
            cols_identity: vec!["segment".into()],
            cols_first_item: vec!["segment".into()],
            ..PreprocessorConfig::new("client_id", "trans_date")
        }
    }

    fn raw() -> RawTable {
        LOG_BROADCASTER.set_echo(false);
        parse_csv_str(CSV, ',').unwrap()
    }

    #[test]
    fn test_fit_transform_records() {
        let mut pre = DataPreprocessor::from_config(config()).unwrap();
        let records = pre.fit_transform(&raw()).unwrap().into_records();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.id, EntityKey::Int(1));
        assert_eq!(
            first.get("event_time"),
            Some(&FieldValue::Int(arr1(&[1609488000, 1609581600, 1609632000])))
        );
        // 5411 appears three times, 4111 once
        assert_eq!(first.get("mcc"), Some(&FieldValue::Codes(arr1(&[2, 1, 1]))));
        assert_eq!(
            first.get("amount"),
            Some(&FieldValue::Float(arr1(&[20.0, 10.5, 7.0])))
        );
        assert_eq!(
            first.get("segment"),
            Some(&FieldValue::First(crate::models::Cell::Text("gold".into())))
        );
        assert!(first.get("note").is_none());
        assert!(first.get("trans_date").is_none());
    }

    #[test]
    fn test_columnar_output() {
        let mut cfg = config();
        cfg.return_records = false;
        let mut pre = DataPreprocessor::from_config(cfg).unwrap();
        match pre.fit_transform(&raw()).unwrap() {
            GroupedOutput::Columnar(frame) => {
                assert_eq!(frame.ids(), &[EntityKey::Int(1), EntityKey::Int(2)]);
                assert_eq!(
                    frame.field_names().collect::<Vec<_>>(),
                    vec!["event_time", "mcc", "amount", "segment"]
                );
            }
            other => panic!("expected columnar output, got {:?}", other.format()),
        }
    }

    #[test]
    fn test_event_time_none_keeps_original() {
        let csv = "id,ts,amount\n1,30,1\n1,10,2\n";
        let mut cfg = PreprocessorConfig::new("id", "ts");
        cfg.event_time_transformation = "none".into();
        cfg.cols_numerical = vec!["amount".into()];

        let pre = DataPreprocessor::from_config(cfg).unwrap();
        assert_eq!(pre.output_columns(), vec!["id", "event_time", "ts", "amount"]);

        let records = pre.transform(&parse_csv_str(csv, ',').unwrap()).unwrap().into_records();
        assert_eq!(records[0].get("ts"), Some(&FieldValue::Int(arr1(&[10, 30]))));
        assert_eq!(records[0].get("amount"), Some(&FieldValue::Int(arr1(&[2, 1]))));
    }

    #[test]
    fn test_unknown_transformation() {
        let mut cfg = config();
        cfg.event_time_transformation = "to_days".into();
        let err = DataPreprocessor::from_config(cfg).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::UnknownTransformation { kind: "event_time", .. })
        ));
    }

    #[test]
    fn test_overlapping_columns_rejected() {
        let mut cfg = config();
        cfg.cols_identity.push("client_id".into());
        let err = DataPreprocessor::from_config(cfg).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::ColumnConflict { list: "cols_identity", .. })
        ));
        assert!(err.to_string().contains("client_id"));

        let mut cfg = PreprocessorConfig::new("id", "ts");
        cfg.event_time_transformation = "none".into();
        cfg.cols_numerical = vec!["ts".into()];
        assert!(matches!(
            DataPreprocessor::from_config(cfg),
            Err(PipelineError::Config(ConfigError::ColumnConflict { owner: "col_event_time", .. }))
        ));
    }

    #[test]
    fn test_records_sequences_aligned() {
        let mut pre = DataPreprocessor::from_config(config()).unwrap();
        let records = pre.fit_transform(&raw()).unwrap().into_records();
        assert!(check_sequence_alignment(&records).is_ok());
        assert_eq!(records[0].seq_len(), Some(3));
        assert_eq!(records[1].seq_len(), Some(1));
    }

    #[test]
    fn test_missing_raw_column() {
        let mut cfg = config();
        cfg.cols_numerical.push("balance".into());
        let mut pre = DataPreprocessor::from_config(cfg).unwrap();
        let err = pre.fit(&raw()).unwrap_err();
        assert!(matches!(err, PipelineError::Encode(EncodeError::MissingColumn(ref c)) if c == "balance"));
    }

    #[test]
    fn test_transform_before_fit() {
        let pre = DataPreprocessor::from_config(config()).unwrap();
        let err = pre.transform(&raw()).unwrap_err();
        assert!(matches!(err, PipelineError::Encode(EncodeError::NotFitted(_))));
    }

    #[test]
    fn test_category_codes_given() {
        let csv = "id,t,mcc\nu1,2,7\nu1,1,3\n";
        let mut cfg = PreprocessorConfig::new("id", "t");
        cfg.event_time_transformation = "none".into();
        cfg.category_transformation = "none".into();
        cfg.cols_category = vec!["mcc".into()];

        let pre = DataPreprocessor::from_config(cfg).unwrap();
        let table = pre.encode(&parse_csv_str(csv, ',').unwrap()).unwrap();
        assert!(matches!(
            table.column("mcc").map(|c| &c.data),
            Some(ColumnData::Category { categories, .. }) if categories.is_empty()
        ));

        let records = pre.transform(&parse_csv_str(csv, ',').unwrap()).unwrap().into_records();
        assert_eq!(records[0].id, EntityKey::Text("u1".into()));
        assert_eq!(records[0].get("mcc"), Some(&FieldValue::Codes(arr1(&[3, 7]))));
    }

    #[test]
    fn test_tensor_column() {
        let csv = "id;t;emb\n1;2;0.3 0.4\n1;1;[0.1 0.2]\n";
        let mut cfg = PreprocessorConfig::new("id", "t");
        cfg.event_time_transformation = "none".into();
        cfg.cols_tensor = vec!["emb".into()];

        let pre = DataPreprocessor::from_config(cfg).unwrap();
        let records = pre.transform(&parse_csv_str(csv, ';').unwrap()).unwrap().into_records();
        assert_eq!(
            records[0].get("emb"),
            Some(&FieldValue::Stacked(arr2(&[[0.1, 0.2], [0.3, 0.4]]).into_dyn()))
        );
    }

    #[test]
    fn test_progress_and_parallel() {
        let mut cfg = config();
        cfg.parallel = true;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut pre = DataPreprocessor::from_config(cfg)
            .unwrap()
            .with_progress(move |p| {
                assert_eq!(p.total, 2);
                seen.fetch_add(1, Ordering::SeqCst);
            });
        let grouped = pre.fit_transform(&raw()).unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transform_bytes() {
        LOG_BROADCASTER.set_echo(false);
        let result = transform_bytes(CSV.as_bytes(), &config()).unwrap();
        assert_eq!(result.csv_info.row_count, 4);
        assert_eq!(result.csv_info.delimiter, ',');
        assert_eq!(result.grouped.len(), 2);
    }
}

//! Column encoding stage.
//!
//! Each encoder maps one raw string column to one typed [`ColumnData`] of the
//! same row count. Encoders never look at other columns; the grouping engine
//! only ever sees their output.
//!
//! | Encoder | Output kind |
//! |---|---|
//! | [`NumericIdentity`] | `Int` or `Float` |
//! | [`FrequencyEncoder`] | `Category` (codes ranked by frequency) |
//! | [`CategoryIdentity`] | `Category` (codes given as-is) |
//! | [`DatetimeToTimestamp`] | `Int` (Unix seconds) |
//! | [`TensorEncoder`] | `Tensor` |
//! | [`TextIdentity`] | `Text` |

pub mod category;
pub mod datetime;
pub mod identity;
pub mod json;
pub mod tensor;

pub use category::{CategoryIdentity, FrequencyEncoder};
pub use datetime::DatetimeToTimestamp;
pub use identity::{NumericIdentity, TextIdentity};
pub use json::table_from_json_rows;
pub use tensor::TensorEncoder;

use crate::error::EncodeResult;
use crate::models::ColumnData;

/// Name of the encoded event-time column.
pub const EVENT_TIME_COLUMN: &str = "event_time";

/// A per-column mapping `raw cells -> encoded column`.
pub trait ColumnEncoder: Send + Sync {
    /// Raw column read by this encoder.
    fn source(&self) -> &str;

    /// Name of the produced column.
    fn target(&self) -> &str;

    /// Learn whatever the encoder needs from the raw column.
    fn fit(&mut self, _raw: &[String]) -> EncodeResult<()> {
        Ok(())
    }

    /// Encode the raw column.
    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData>;
}

/// Encode an identifier column: integers when every cell is one, text otherwise.
pub fn encode_key_column(raw: &[String]) -> ColumnData {
    let ints: Option<Vec<i64>> = raw.iter().map(|s| s.trim().parse().ok()).collect();
    match ints {
        Some(values) => ColumnData::Int(values),
        None => ColumnData::Text(raw.to_vec()),
    }
}

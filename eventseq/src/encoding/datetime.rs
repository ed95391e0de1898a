//! Datetime to Unix timestamp conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{EncodeError, EncodeResult};
use crate::models::ColumnData;

use super::{ColumnEncoder, EVENT_TIME_COLUMN};

/// Naive formats tried after RFC 3339, interpreted as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Converts a datetime column to whole Unix seconds in `event_time`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (space or `T`), `YYYY/MM/DD ...`
/// and bare dates. Integer cells are taken as Unix seconds already.
#[derive(Debug, Clone)]
pub struct DatetimeToTimestamp {
    source: String,
    target: String,
}

impl DatetimeToTimestamp {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            source: column.into(),
            target: EVENT_TIME_COLUMN.to_string(),
        }
    }
}

impl ColumnEncoder for DatetimeToTimestamp {
    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn encode(&self, raw: &[String]) -> EncodeResult<ColumnData> {
        let mut values = Vec::with_capacity(raw.len());
        for (row, cell) in raw.iter().enumerate() {
            let ts = parse_timestamp(cell).ok_or_else(|| EncodeError::InvalidDatetime {
                column: self.source.clone(),
                row,
                value: cell.clone(),
            })?;
            values.push(ts);
        }
        Ok(ColumnData::Int(values))
    }
}

/// Parse one cell to Unix seconds.
pub fn parse_timestamp(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    if let Ok(ts) = cell.parse::<i64>() {
        return Some(ts);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.timestamp());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(dt.and_utc().timestamp());
        }
    }

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(cell, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        assert_eq!(parse_timestamp("1970-01-02"), Some(86_400));
        assert_eq!(parse_timestamp("1970-01-01 00:01:00"), Some(60));
        assert_eq!(parse_timestamp("1970-01-01T00:00:10.250"), Some(10));
        assert_eq!(parse_timestamp("1970/01/01 01:00:00"), Some(3_600));
        assert_eq!(parse_timestamp("1970-01-01T01:00:00+01:00"), Some(0));
        assert_eq!(parse_timestamp("1700000000"), Some(1_700_000_000));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01"), None);
    }

    #[test]
    fn test_encoder_targets_event_time() {
        let enc = DatetimeToTimestamp::new("trans_date");
        assert_eq!(enc.target(), EVENT_TIME_COLUMN);

        let raw = vec!["1970-01-01 00:00:05".to_string(), "1970-01-01".to_string()];
        assert_eq!(enc.encode(&raw).unwrap(), ColumnData::Int(vec![5, 0]));

        let err = enc.encode(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidDatetime { row: 0, .. }));
    }
}

//! Validation helpers.
//!
//! - Configuration files are checked against the embedded JSON Schema
//!   (`schemas/preprocessor-config.json`, draft 7) before deserialization,
//!   so type errors come back as readable messages.
//! - Grouped records can be checked for sequence alignment: every sequence
//!   field of an entity has the same number of steps.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::transform::EntityRecord;

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/preprocessor-config.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use eventseq::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["col_id"],
///     "properties": { "col_id": { "type": "string" } }
/// });
///
/// assert!(validate(&schema, &json!({ "col_id": "client_id" })).is_ok());
/// assert!(validate(&schema, &json!({ "col_id": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a preprocessor configuration document.
pub fn validate_preprocessor_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&CONFIG_SCHEMA, data)
}

/// Check that the sequence fields of each record share one length.
///
/// Returns one message per misaligned record.
pub fn check_sequence_alignment(records: &[EntityRecord]) -> Result<(), Vec<String>> {
    let errors: Vec<String> = records
        .iter()
        .filter_map(|record| {
            let lengths: Vec<(&str, usize)> = record
                .fields
                .iter()
                .filter_map(|(name, value)| value.seq_len().map(|len| (name.as_str(), len)))
                .collect();
            let first = lengths.first()?.1;
            let bad: Vec<String> = lengths
                .iter()
                .filter(|(_, len)| *len != first)
                .map(|(name, len)| format!("{}={}", name, len))
                .collect();
            if bad.is_empty() {
                None
            } else {
                Some(format!(
                    "Entity {}: expected {} steps, got {}",
                    record.id,
                    first,
                    bad.join(", ")
                ))
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

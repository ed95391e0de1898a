//! Result assembly: per-entity records and the columnar frame.
//!
//! Both shapes carry the same values in the same order; converting one to
//! the other never changes content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{EntityKey, FieldValue};

/// Representation of the grouped result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One [`EntityFrame`] with a value vector per field.
    Columnar,
    /// One [`EntityRecord`] per entity.
    #[default]
    Records,
}

impl OutputFormat {
    pub fn from_records_flag(as_records: bool) -> Self {
        if as_records {
            OutputFormat::Records
        } else {
            OutputFormat::Columnar
        }
    }
}

// =============================================================================
// Entity Record
// =============================================================================

/// All fields of one entity: the identifier plus one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Name of the identifier field.
    pub id_field: String,
    pub id: EntityKey,
    /// Column name -> value, in table column order.
    pub fields: Vec<(String, FieldValue)>,
}

impl EntityRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Number of events of this entity, read from any sequence field.
    pub fn seq_len(&self) -> Option<usize> {
        self.fields.iter().find_map(|(_, v)| v.seq_len())
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(self.id_field.clone(), self.id.to_json());
        for (name, value) in &self.fields {
            obj.insert(name.clone(), value.to_json());
        }
        Value::Object(obj)
    }
}

// =============================================================================
// Entity Frame
// =============================================================================

/// Columnar form of the result: row `i` of every column belongs to `ids[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFrame {
    id_field: String,
    ids: Vec<EntityKey>,
    columns: Vec<(String, Vec<FieldValue>)>,
}

impl EntityFrame {
    /// An empty frame with the given field layout.
    pub fn empty(id_field: impl Into<String>, field_names: &[String]) -> Self {
        Self {
            id_field: id_field.into(),
            ids: Vec::new(),
            columns: field_names.iter().map(|n| (n.clone(), Vec::new())).collect(),
        }
    }

    /// Transpose records into columns.
    ///
    /// `field_names` fixes the column layout; a record lacking one of the
    /// fields is not produced by the grouper and is not padded here.
    pub fn from_records(
        id_field: impl Into<String>,
        field_names: &[String],
        records: Vec<EntityRecord>,
    ) -> Self {
        let mut frame = Self::empty(id_field, field_names);
        frame.ids.reserve(records.len());
        for (_, values) in frame.columns.iter_mut() {
            values.reserve(records.len());
        }

        for record in records {
            frame.ids.push(record.id);
            for (name, value) in record.fields {
                if let Some((_, values)) = frame.columns.iter_mut().find(|(n, _)| *n == name) {
                    values.push(value);
                }
            }
        }
        frame
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn ids(&self) -> &[EntityKey] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[FieldValue]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Value of `name` for the entity at `row`.
    pub fn get(&self, row: usize, name: &str) -> Option<&FieldValue> {
        self.column(name).and_then(|values| values.get(row))
    }

    /// Split into one record per entity, keeping order.
    pub fn into_records(self) -> Vec<EntityRecord> {
        let id_field = self.id_field;
        let names: Vec<String> = self.columns.iter().map(|(n, _)| n.clone()).collect();
        let mut iters: Vec<_> = self.columns.into_iter().map(|(_, v)| v.into_iter()).collect();

        self.ids
            .into_iter()
            .map(|id| {
                let fields = names
                    .iter()
                    .zip(iters.iter_mut())
                    .filter_map(|(name, values)| values.next().map(|v| (name.clone(), v)))
                    .collect();
                EntityRecord {
                    id_field: id_field.clone(),
                    id,
                    fields,
                }
            })
            .collect()
    }

    /// `{ id_field: [ids...], field: [values...], ... }`
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            self.id_field.clone(),
            Value::Array(self.ids.iter().map(EntityKey::to_json).collect()),
        );
        for (name, values) in &self.columns {
            obj.insert(
                name.clone(),
                Value::Array(values.iter().map(FieldValue::to_json).collect()),
            );
        }
        Value::Object(obj)
    }
}

// =============================================================================
// Grouped Output
// =============================================================================

/// Output of one grouping call.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupedOutput {
    Columnar(EntityFrame),
    Records(Vec<EntityRecord>),
}

impl GroupedOutput {
    /// Number of entities.
    pub fn len(&self) -> usize {
        match self {
            GroupedOutput::Columnar(frame) => frame.len(),
            GroupedOutput::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            GroupedOutput::Columnar(_) => OutputFormat::Columnar,
            GroupedOutput::Records(_) => OutputFormat::Records,
        }
    }

    pub fn into_records(self) -> Vec<EntityRecord> {
        match self {
            GroupedOutput::Columnar(frame) => frame.into_records(),
            GroupedOutput::Records(records) => records,
        }
    }

    /// Records as a JSON array, the frame as a JSON object of columns.
    pub fn to_json(&self) -> Value {
        match self {
            GroupedOutput::Columnar(frame) => frame.to_json(),
            GroupedOutput::Records(records) => {
                Value::Array(records.iter().map(EntityRecord::to_json).collect())
            }
        }
    }
}

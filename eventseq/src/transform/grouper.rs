//! Group flat event rows into one sequence record per entity.
//!
//! # Architecture
//!
//! ```text
//! Encoded table (flat rows)                 Entity records
//! ┌──────────────────────────────┐         ┌──────────────────────────────┐
//! │ id: 1, t: 5, amount: 10      │         │ id: 1                        │
//! │ id: 1, t: 2, amount: 20      │   →     │ event_time: [2, 5]           │
//! │ id: 2, t: 1, amount: 5       │         │ amount: [20, 10]             │
//! └──────────────────────────────┘         ├──────────────────────────────┤
//!                                          │ id: 2                        │
//!                                          │ event_time: [1]              │
//!                                          │ amount: [5]                  │
//!                                          └──────────────────────────────┘
//! ```
//!
//! # Algorithm
//!
//! 1. Check the identifier and event-time columns before any work.
//! 2. Sort a private row permutation once by `(identifier, event time)`.
//!    The sort is stable, so rows with equal keys keep their input order.
//! 3. Split the permutation into contiguous runs of one identifier.
//! 4. For every run, materialize each column with the [`ContainerPolicy`]
//!    resolved for it up front.
//!
//! The table is only borrowed. Runs are independent of each other, which is
//! what the optional rayon mode relies on.
//!
//! # Tensor columns
//!
//! Rows of a tensor column are expected to share one shape (the encoders
//! guarantee it). Rows that do not are reported as
//! [`GroupError::ShapeMismatch`] by the stacking step itself; nothing is
//! truncated or padded.

use ndarray::{Array1, ArrayD, ArrayViewD, Axis};
use rayon::prelude::*;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::encoding::EVENT_TIME_COLUMN;
use crate::error::{GroupError, GroupResult};
use crate::models::{Cell, Column, ColumnData, EntityKey, FieldValue, Table};

use super::assembly::{EntityFrame, EntityRecord, GroupedOutput, OutputFormat};

// =============================================================================
// Container Policy
// =============================================================================

/// How a column is materialized in an entity record. First match wins, in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPolicy {
    /// Value of the earliest row only.
    FirstItem,
    /// Per-row arrays stacked along a new leading axis.
    StackedArray,
    /// Category codes, or raw text values.
    CategoricalIndex,
    /// Plain numbers, dtype preserved.
    NumericSequence,
}

impl ContainerPolicy {
    pub fn resolve(column: &Column, first_item: bool) -> Self {
        if first_item {
            return ContainerPolicy::FirstItem;
        }
        match &column.data {
            ColumnData::Tensor { .. } => ContainerPolicy::StackedArray,
            ColumnData::Category { .. } | ColumnData::Text(_) => ContainerPolicy::CategoricalIndex,
            ColumnData::Int(_) | ColumnData::Float(_) => ContainerPolicy::NumericSequence,
        }
    }
}

/// A column bound to its policy, resolved once per call.
enum ColumnPlan<'a> {
    First(&'a ColumnData),
    Stacked(&'a [ArrayD<f64>]),
    Codes(&'a [i64]),
    Text(&'a [String]),
    Int(&'a [i64]),
    Float(&'a [f64]),
}

impl<'a> ColumnPlan<'a> {
    fn new(column: &'a Column, policy: ContainerPolicy) -> Self {
        match (policy, &column.data) {
            (ContainerPolicy::FirstItem, data) => ColumnPlan::First(data),
            (_, ColumnData::Tensor { rows, .. }) => ColumnPlan::Stacked(rows),
            (_, ColumnData::Category { codes, .. }) => ColumnPlan::Codes(codes),
            (_, ColumnData::Text(values)) => ColumnPlan::Text(values),
            (_, ColumnData::Int(values)) => ColumnPlan::Int(values),
            (_, ColumnData::Float(values)) => ColumnPlan::Float(values),
        }
    }

    /// `rows` is never empty: runs come from a partition of the table.
    fn materialize(&self, name: &str, entity: &EntityKey, rows: &[usize]) -> GroupResult<FieldValue> {
        let value = match self {
            ColumnPlan::First(data) => FieldValue::First(first_cell(data, rows[0])),
            ColumnPlan::Stacked(arrays) => {
                let views: Vec<ArrayViewD<'_, f64>> = rows.iter().map(|&r| arrays[r].view()).collect();
                let stacked = ndarray::stack(Axis(0), &views).map_err(|source| GroupError::ShapeMismatch {
                    column: name.to_string(),
                    entity: entity.to_string(),
                    source,
                })?;
                FieldValue::Stacked(stacked)
            }
            ColumnPlan::Codes(codes) => FieldValue::Codes(gather(codes, rows)),
            ColumnPlan::Text(values) => FieldValue::Text(rows.iter().map(|&r| values[r].clone()).collect()),
            ColumnPlan::Int(values) => FieldValue::Int(gather(values, rows)),
            ColumnPlan::Float(values) => FieldValue::Float(gather(values, rows)),
        };
        Ok(value)
    }
}

fn gather<T: Copy>(values: &[T], rows: &[usize]) -> Array1<T> {
    rows.iter().map(|&r| values[r]).collect()
}

fn first_cell(data: &ColumnData, row: usize) -> Cell {
    match data {
        ColumnData::Int(v) => Cell::Int(v[row]),
        ColumnData::Float(v) => Cell::Float(v[row]),
        ColumnData::Category { codes, .. } => Cell::Code(codes[row]),
        ColumnData::Text(v) => Cell::Text(v[row].clone()),
        ColumnData::Tensor { rows, .. } => Cell::Tensor(rows[row].clone()),
    }
}

// =============================================================================
// Sort keys
// =============================================================================

fn entity_keys(column: &Column) -> GroupResult<Vec<EntityKey>> {
    match &column.data {
        ColumnData::Int(v) => Ok(v.iter().map(|&x| EntityKey::Int(x)).collect()),
        ColumnData::Text(v) => Ok(v.iter().map(|s| EntityKey::Text(s.clone())).collect()),
        ColumnData::Category { codes, categories } if categories.is_empty() => {
            Ok(codes.iter().map(|&c| EntityKey::Int(c)).collect())
        }
        ColumnData::Category { codes, .. } => Ok(codes
            .iter()
            .map(|&c| match column.data.category_label(c) {
                Some(label) => EntityKey::Text(label.to_string()),
                None => EntityKey::Int(c),
            })
            .collect()),
        other => Err(GroupError::UnsupportedIdColumn {
            column: column.name.clone(),
            kind: other.kind().as_str(),
        }),
    }
}

/// Event times, borrowed from the table.
enum TimeKeys<'a> {
    Int(&'a [i64]),
    Float(&'a [f64]),
}

impl<'a> TimeKeys<'a> {
    fn new(column: &'a Column) -> GroupResult<Self> {
        match &column.data {
            ColumnData::Int(v) => Ok(TimeKeys::Int(v)),
            ColumnData::Float(v) => Ok(TimeKeys::Float(v)),
            other => Err(GroupError::UnsupportedTimeColumn {
                column: column.name.clone(),
                kind: other.kind().as_str(),
            }),
        }
    }

    fn cmp(&self, a: usize, b: usize) -> CmpOrdering {
        match self {
            TimeKeys::Int(v) => v[a].cmp(&v[b]),
            TimeKeys::Float(v) => v[a].total_cmp(&v[b]),
        }
    }
}

/// Stable sort of row indices by `(entity, time)`, then split into runs.
fn partition(keys: &[EntityKey], times: &TimeKeys<'_>) -> (Vec<usize>, Vec<Range<usize>>) {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]).then_with(|| times.cmp(a, b)));

    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=order.len() {
        if i == order.len() || keys[order[i]] != keys[order[start]] {
            if i > start {
                runs.push(start..i);
            }
            start = i;
        }
    }
    (order, runs)
}

// =============================================================================
// Progress
// =============================================================================

/// Reported once per finished entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProgress {
    pub completed: usize,
    pub total: usize,
}

/// Callback invoked once per finished entity. In parallel mode calls may
/// come from several threads and in any entity order.
pub type ProgressHook = Arc<dyn Fn(GroupProgress) + Send + Sync>;

// =============================================================================
// Entity Grouper
// =============================================================================

/// Grouping & sequence-assembly engine.
///
/// # Example
///
/// ```rust,ignore
/// use eventseq::transform::{EntityGrouper, OutputFormat};
///
/// let output = EntityGrouper::new("client_id")
///     .with_first_items(["segment"])
///     .with_output(OutputFormat::Records)
///     .transform(&table)?;
/// ```
#[derive(Clone)]
pub struct EntityGrouper {
    id_column: String,
    event_time_column: String,
    first_item_columns: BTreeSet<String>,
    output: OutputFormat,
    parallel: bool,
    progress: Option<ProgressHook>,
}

impl fmt::Debug for EntityGrouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityGrouper")
            .field("id_column", &self.id_column)
            .field("event_time_column", &self.event_time_column)
            .field("first_item_columns", &self.first_item_columns)
            .field("output", &self.output)
            .field("parallel", &self.parallel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl EntityGrouper {
    pub fn new(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            event_time_column: EVENT_TIME_COLUMN.to_string(),
            first_item_columns: BTreeSet::new(),
            output: OutputFormat::default(),
            parallel: false,
            progress: None,
        }
    }

    pub fn with_event_time_column(mut self, column: impl Into<String>) -> Self {
        self.event_time_column = column.into();
        self
    }

    pub fn with_first_items<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.first_item_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Assemble entities on the rayon global pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(GroupProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(hook));
        self
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn event_time_column(&self) -> &str {
        &self.event_time_column
    }

    pub fn first_item_columns(&self) -> &BTreeSet<String> {
        &self.first_item_columns
    }

    /// Policy each non-identifier column of `table` would get, in column order.
    pub fn policies<'t>(&self, table: &'t Table) -> Vec<(&'t str, ContainerPolicy)> {
        table
            .columns()
            .iter()
            .filter(|c| c.name != self.id_column)
            .map(|c| {
                let first = self.first_item_columns.contains(&c.name);
                (c.name.as_str(), ContainerPolicy::resolve(c, first))
            })
            .collect()
    }

    /// Group `table` into one record per entity.
    pub fn transform(&self, table: &Table) -> GroupResult<GroupedOutput> {
        let id_column = table
            .column(&self.id_column)
            .ok_or_else(|| GroupError::MissingColumn(self.id_column.clone()))?;
        let time_column = table
            .column(&self.event_time_column)
            .ok_or_else(|| GroupError::MissingColumn(self.event_time_column.clone()))?;

        let keys = entity_keys(id_column)?;
        let times = TimeKeys::new(time_column)?;

        let plans: Vec<(&str, ColumnPlan<'_>)> = table
            .columns()
            .iter()
            .filter(|c| c.name != self.id_column)
            .map(|c| {
                let first = self.first_item_columns.contains(&c.name);
                (c.name.as_str(), ColumnPlan::new(c, ContainerPolicy::resolve(c, first)))
            })
            .collect();
        let field_names: Vec<String> = plans.iter().map(|(n, _)| n.to_string()).collect();

        let (order, runs) = partition(&keys, &times);
        let total = runs.len();
        let completed = AtomicUsize::new(0);

        let assemble = |run: &Range<usize>| -> GroupResult<EntityRecord> {
            let rows = &order[run.clone()];
            let id = keys[rows[0]].clone();

            let mut fields = Vec::with_capacity(plans.len());
            for (name, plan) in &plans {
                fields.push((name.to_string(), plan.materialize(name, &id, rows)?));
            }

            if let Some(hook) = &self.progress {
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                hook(GroupProgress { completed: done, total });
            }

            Ok(EntityRecord {
                id_field: self.id_column.clone(),
                id,
                fields,
            })
        };

        let records: Vec<EntityRecord> = if self.parallel {
            runs.par_iter().map(assemble).collect::<GroupResult<_>>()?
        } else {
            runs.iter().map(assemble).collect::<GroupResult<_>>()?
        };

        Ok(match self.output {
            OutputFormat::Records => GroupedOutput::Records(records),
            OutputFormat::Columnar => GroupedOutput::Columnar(EntityFrame::from_records(
                self.id_column.clone(),
                &field_names,
                records,
            )),
        })
    }
}

/// Group `table` by `entity_id_column`, ordering each entity by the
/// `event_time` column.
pub fn transform<I, S>(
    table: &Table,
    entity_id_column: &str,
    first_item_columns: I,
    output_as_records: bool,
) -> GroupResult<GroupedOutput>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    EntityGrouper::new(entity_id_column)
        .with_first_items(first_item_columns)
        .with_output(OutputFormat::from_records_flag(output_as_records))
        .transform(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    const NO_FIRST: [&str; 0] = [];

    fn table(columns: Vec<(&str, ColumnData)>) -> Table {
        Table::new(columns.into_iter().map(|(n, d)| Column::new(n, d)).collect()).unwrap()
    }

    /// `[(id=1,t=5,amt=10),(id=1,t=2,amt=20),(id=2,t=1,amt=5)]`
    fn scenario() -> Table {
        table(vec![
            ("client_id", ColumnData::Int(vec![1, 1, 2])),
            ("event_time", ColumnData::Int(vec![5, 2, 1])),
            ("amt", ColumnData::Int(vec![10, 20, 5])),
        ])
    }

    fn records(out: GroupedOutput) -> Vec<EntityRecord> {
        match out {
            GroupedOutput::Records(r) => r,
            GroupedOutput::Columnar(_) => panic!("expected records"),
        }
    }

    #[test]
    fn test_sequences_ordered_by_time() {
        let out = records(transform(&scenario(), "client_id", NO_FIRST, true).unwrap());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, EntityKey::Int(1));
        assert_eq!(out[0].get("amt"), Some(&FieldValue::Int(arr1(&[20, 10]))));
        assert_eq!(out[0].get("event_time"), Some(&FieldValue::Int(arr1(&[2, 5]))));
        assert_eq!(out[1].id, EntityKey::Int(2));
        assert_eq!(out[1].get("amt"), Some(&FieldValue::Int(arr1(&[5]))));
        assert!(out[0].get("client_id").is_none());
    }

    #[test]
    fn test_first_item_takes_earliest_row() {
        let out = records(transform(&scenario(), "client_id", ["amt"], true).unwrap());

        assert_eq!(out[0].get("amt"), Some(&FieldValue::First(Cell::Int(20))));
        assert_eq!(out[1].get("amt"), Some(&FieldValue::First(Cell::Int(5))));
    }

    #[test]
    fn test_tensor_rows_stacked() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![7, 7])),
            ("event_time", ColumnData::Int(vec![20, 10])),
            (
                "emb",
                ColumnData::Tensor {
                    shape: vec![3],
                    rows: vec![
                        arr1(&[4.0, 5.0, 6.0]).into_dyn(),
                        arr1(&[1.0, 2.0, 3.0]).into_dyn(),
                    ],
                },
            ),
        ]);
        let out = records(transform(&t, "client_id", NO_FIRST, true).unwrap());

        let expected = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn();
        assert_eq!(out[0].get("emb"), Some(&FieldValue::Stacked(expected)));
    }

    #[test]
    fn test_tensor_first_item_is_single_array() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![7, 7])),
            ("event_time", ColumnData::Int(vec![20, 10])),
            (
                "profile",
                ColumnData::Tensor {
                    shape: vec![2],
                    rows: vec![arr1(&[9.0, 9.0]).into_dyn(), arr1(&[1.0, 1.0]).into_dyn()],
                },
            ),
        ]);
        let out = records(transform(&t, "client_id", ["profile"], true).unwrap());
        assert_eq!(
            out[0].get("profile"),
            Some(&FieldValue::First(Cell::Tensor(arr1(&[1.0, 1.0]).into_dyn())))
        );
    }

    #[test]
    fn test_tensor_shape_mismatch_surfaces() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![1, 1])),
            ("event_time", ColumnData::Int(vec![1, 2])),
            (
                "emb",
                ColumnData::Tensor {
                    shape: vec![2],
                    rows: vec![arr1(&[1.0, 2.0]).into_dyn(), arr1(&[1.0]).into_dyn()],
                },
            ),
        ]);
        let err = transform(&t, "client_id", NO_FIRST, true).unwrap_err();
        assert!(matches!(
            err,
            GroupError::ShapeMismatch { ref column, ref entity, .. } if column == "emb" && entity == "1"
        ));
    }

    #[test]
    fn test_categorical_and_text_columns() {
        let t = table(vec![
            ("client_id", ColumnData::Text(vec!["b".into(), "a".into(), "b".into()])),
            ("event_time", ColumnData::Float(vec![2.5, 1.0, 0.5])),
            (
                "mcc",
                ColumnData::Category {
                    codes: vec![3, 1, 2],
                    categories: vec!["x".into(), "y".into(), "z".into()],
                },
            ),
            ("note", ColumnData::Text(vec!["late".into(), "only".into(), "early".into()])),
            ("rate", ColumnData::Float(vec![0.1, 0.2, 0.3])),
        ]);
        let out = records(transform(&t, "client_id", NO_FIRST, true).unwrap());

        assert_eq!(out[0].id, EntityKey::Text("a".into()));
        assert_eq!(out[1].id, EntityKey::Text("b".into()));
        assert_eq!(out[1].get("mcc"), Some(&FieldValue::Codes(arr1(&[2, 3]))));
        assert_eq!(
            out[1].get("note"),
            Some(&FieldValue::Text(vec!["early".into(), "late".into()]))
        );
        assert_eq!(out[1].get("rate"), Some(&FieldValue::Float(arr1(&[0.3, 0.1]))));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![1, 1, 1, 1])),
            ("event_time", ColumnData::Int(vec![3, 1, 3, 1])),
            ("seq", ColumnData::Int(vec![0, 1, 2, 3])),
        ]);
        let out = records(transform(&t, "client_id", ["event_time"], true).unwrap());
        assert_eq!(out[0].get("seq"), Some(&FieldValue::Int(arr1(&[1, 3, 0, 2]))));
        assert_eq!(out[0].get("event_time"), Some(&FieldValue::First(Cell::Int(1))));
    }

    #[test]
    fn test_first_item_tie_uses_earliest_input_row() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![1, 1])),
            ("event_time", ColumnData::Int(vec![4, 4])),
            ("segment", ColumnData::Text(vec!["first".into(), "second".into()])),
        ]);
        let out = records(transform(&t, "client_id", ["segment"], true).unwrap());
        assert_eq!(
            out[0].get("segment"),
            Some(&FieldValue::First(Cell::Text("first".into())))
        );
    }

    #[test]
    fn test_empty_table() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![])),
            ("event_time", ColumnData::Int(vec![])),
            ("amt", ColumnData::Float(vec![])),
        ]);
        assert!(transform(&t, "client_id", NO_FIRST, true).unwrap().is_empty());

        match transform(&t, "client_id", NO_FIRST, false).unwrap() {
            GroupedOutput::Columnar(frame) => {
                assert!(frame.is_empty());
                assert_eq!(frame.field_names().collect::<Vec<_>>(), vec!["event_time", "amt"]);
            }
            GroupedOutput::Records(_) => panic!("expected columnar output"),
        }
    }

    #[test]
    fn test_missing_columns_fail_fast() {
        let t = scenario();
        assert!(matches!(
            transform(&t, "user", NO_FIRST, true),
            Err(GroupError::MissingColumn(c)) if c == "user"
        ));
        assert!(matches!(
            EntityGrouper::new("client_id").with_event_time_column("ts").transform(&t),
            Err(GroupError::MissingColumn(c)) if c == "ts"
        ));
    }

    #[test]
    fn test_unsupported_key_columns() {
        let t = table(vec![
            ("client_id", ColumnData::Float(vec![1.0])),
            ("event_time", ColumnData::Text(vec!["x".into()])),
        ]);
        assert!(matches!(
            transform(&t, "client_id", NO_FIRST, true),
            Err(GroupError::UnsupportedIdColumn { kind: "float", .. })
        ));

        let t = table(vec![
            ("client_id", ColumnData::Int(vec![1])),
            ("event_time", ColumnData::Text(vec!["x".into()])),
        ]);
        assert!(matches!(
            transform(&t, "client_id", NO_FIRST, true),
            Err(GroupError::UnsupportedTimeColumn { kind: "text", .. })
        ));
    }

    #[test]
    fn test_category_id_uses_labels() {
        let t = table(vec![
            (
                "client_id",
                ColumnData::Category {
                    codes: vec![2, 1],
                    categories: vec!["alice".into(), "bob".into()],
                },
            ),
            ("event_time", ColumnData::Int(vec![1, 2])),
        ]);
        let out = records(transform(&t, "client_id", NO_FIRST, true).unwrap());
        assert_eq!(out[0].id, EntityKey::Text("alice".into()));
        assert_eq!(out[1].id, EntityKey::Text("bob".into()));
    }

    #[test]
    fn test_input_table_untouched() {
        let t = scenario();
        let before = t.clone();
        transform(&t, "client_id", NO_FIRST, false).unwrap();
        assert_eq!(t, before);
    }

    #[test]
    fn test_policies_resolved_per_column() {
        let t = table(vec![
            ("client_id", ColumnData::Int(vec![1])),
            ("event_time", ColumnData::Int(vec![1])),
            ("emb", ColumnData::Tensor { shape: vec![1], rows: vec![arr1(&[0.0]).into_dyn()] }),
            ("mcc", ColumnData::Category { codes: vec![1], categories: vec![] }),
            ("segment", ColumnData::Text(vec!["a".into()])),
        ]);
        let grouper = EntityGrouper::new("client_id").with_first_items(["segment"]);
        assert_eq!(
            grouper.policies(&t),
            vec![
                ("event_time", ContainerPolicy::NumericSequence),
                ("emb", ContainerPolicy::StackedArray),
                ("mcc", ContainerPolicy::CategoricalIndex),
                ("segment", ContainerPolicy::FirstItem),
            ]
        );
    }

    fn random_table(seed: u64, rows: usize) -> Table {
        let mut rng = StdRng::seed_from_u64(seed);
        let ids: Vec<i64> = (0..rows).map(|_| rng.gen_range(0..7)).collect();
        let times: Vec<i64> = (0..rows).map(|_| rng.gen_range(0..5)).collect();
        let row_no: Vec<i64> = (0..rows as i64).collect();
        let emb: Vec<ArrayD<f64>> = (0..rows)
            .map(|r| arr1(&[r as f64, -(r as f64)]).into_dyn())
            .collect();
        table(vec![
            ("client_id", ColumnData::Int(ids)),
            ("event_time", ColumnData::Int(times)),
            ("row_no", ColumnData::Int(row_no)),
            ("emb", ColumnData::Tensor { shape: vec![2], rows: emb }),
        ])
    }

    #[test]
    fn test_grouping_properties() {
        for seed in 0..20 {
            let t = random_table(seed, 60);
            let ids = match &t.column("client_id").unwrap().data {
                ColumnData::Int(v) => v.clone(),
                _ => unreachable!(),
            };
            let times = match &t.column("event_time").unwrap().data {
                ColumnData::Int(v) => v.clone(),
                _ => unreachable!(),
            };
            let mut counts: HashMap<i64, usize> = HashMap::new();
            for id in &ids {
                *counts.entry(*id).or_default() += 1;
            }

            let out = records(transform(&t, "client_id", NO_FIRST, true).unwrap());

            // completeness
            let seen: HashSet<EntityKey> = out.iter().map(|r| r.id.clone()).collect();
            assert_eq!(out.len(), counts.len());
            assert_eq!(seen.len(), counts.len());

            for rec in &out {
                let id = match rec.id {
                    EntityKey::Int(v) => v,
                    _ => unreachable!(),
                };
                let row_no = match rec.get("row_no") {
                    Some(FieldValue::Int(a)) => a.to_vec(),
                    _ => unreachable!(),
                };

                // conservation
                for (_, value) in &rec.fields {
                    assert_eq!(value.seq_len(), Some(counts[&id]));
                }

                // order and stability, alignment across fields
                for w in row_no.windows(2) {
                    let (a, b) = (w[0] as usize, w[1] as usize);
                    assert!(times[a] < times[b] || (times[a] == times[b] && a < b));
                }
                let event_time = match rec.get("event_time") {
                    Some(FieldValue::Int(a)) => a.to_vec(),
                    _ => unreachable!(),
                };
                let emb = match rec.get("emb") {
                    Some(FieldValue::Stacked(a)) => a.clone(),
                    _ => unreachable!(),
                };
                for (i, &r) in row_no.iter().enumerate() {
                    assert_eq!(ids[r as usize], id);
                    assert_eq!(event_time[i], times[r as usize]);
                    assert_eq!(emb[&[i, 0][..]], r as f64);
                }
            }
        }
    }

    #[test]
    fn test_columnar_and_records_agree() {
        for seed in 0..10 {
            let t = random_table(seed, 80);
            let columnar = transform(&t, "client_id", ["row_no"], false).unwrap();
            let records = transform(&t, "client_id", ["row_no"], true).unwrap();

            assert_eq!(columnar.format(), OutputFormat::Columnar);
            assert_eq!(columnar.len(), records.len());
            assert_eq!(columnar.into_records(), records.into_records());
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let t = random_table(42, 500);
        let sequential = EntityGrouper::new("client_id")
            .with_first_items(["row_no"])
            .transform(&t)
            .unwrap();
        let parallel = EntityGrouper::new("client_id")
            .with_first_items(["row_no"])
            .with_parallel(true)
            .transform(&t)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_progress_hook_once_per_entity() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let out = EntityGrouper::new("client_id")
            .with_progress(move |p| sink.lock().unwrap().push(p))
            .transform(&scenario())
            .unwrap();

        let calls = seen.lock().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            *calls,
            vec![
                GroupProgress { completed: 1, total: 2 },
                GroupProgress { completed: 2, total: 2 },
            ]
        );
    }
}

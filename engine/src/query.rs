//! FILENAME: engine/src/query.rs
//! PURPOSE: Lazily filtered views over one model's records.
//! CONTEXT: `QuerySet` offers the handful of shapes reports need:
//! group-and-annotate (one row per distinct group), per-object annotate
//! (one row per object) and whole-set aggregates. Multi-valued paths fan
//! out, so an object reaching two groups contributes to both.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::aggregate::{AggregateAccumulator, AggregateFn};
use crate::dataset::{Database, PathValues, Record};
use crate::error::EngineResult;
use crate::lookup::Lookup;
use crate::params::SortDirection;
use crate::value::{CellValue, ValueKey};

/// Grouping key of one result row. Reports rarely group by more than four paths.
pub type GroupKey = SmallVec<[ValueKey; 4]>;

// ============================================================================
// RESULT ROWS
// ============================================================================

/// One row of a query result: field path or alias -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(BTreeMap<String, CellValue>);

static EMPTY: CellValue = CellValue::Empty;

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value under `key`, `Empty` when absent.
    pub fn get(&self, key: &str) -> &CellValue {
        self.0.get(key).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, key: impl Into<String>, value: CellValue) {
        self.0.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.0.iter()
    }

    /// Grouping key over `fields`, in the given order.
    pub fn key(&self, fields: &[String]) -> GroupKey {
        fields.iter().map(|f| self.get(f).key()).collect()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        ResultRow(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// An aggregate expression bound to the alias it is reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub alias: String,
    pub field: String,
    pub function: AggregateFn,
}

impl Annotation {
    /// Annotation under its default `<field>__<fn>` alias.
    pub fn new(field: &str, function: AggregateFn) -> Self {
        Annotation {
            alias: function.default_alias(field),
            field: field.to_string(),
            function,
        }
    }
}

// ============================================================================
// QUERY SET
// ============================================================================

#[derive(Debug, Clone)]
pub struct QuerySet<'db> {
    db: &'db Database,
    model: String,
    lookups: Vec<Lookup>,
}

impl<'db> QuerySet<'db> {
    /// Every record of `model`.
    pub fn all(db: &'db Database, model: &str) -> EngineResult<Self> {
        db.schema().model(model)?;
        Ok(QuerySet {
            db,
            model: model.to_string(),
            lookups: Vec::new(),
        })
    }

    /// Narrows the set. Lookups are combined with AND.
    pub fn filter(mut self, lookup: Lookup) -> Self {
        self.lookups.push(lookup);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn db(&self) -> &'db Database {
        self.db
    }

    pub fn lookups(&self) -> &[Lookup] {
        &self.lookups
    }

    /// Evaluates the filters.
    pub fn records(&self) -> EngineResult<Vec<&'db Record>> {
        let mut out = Vec::new();
        'records: for record in self.db.records(&self.model)? {
            for lookup in &self.lookups {
                let values = self.db.resolve_path(&self.model, record, &lookup.path)?;
                if !lookup.matches(&values)? {
                    continue 'records;
                }
            }
            out.push(record);
        }
        Ok(out)
    }

    pub fn len(&self) -> EngineResult<usize> {
        Ok(self.records()?.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }

    /// `values(group_fields).annotate(annotations)`: one row per distinct
    /// combination of group values, ordered by group key.
    pub fn values_annotate(&self, group_fields: &[String], annotations: &[Annotation]) -> EngineResult<Vec<ResultRow>> {
        struct Group {
            values: Vec<CellValue>,
            accumulators: Vec<AggregateAccumulator>,
        }

        let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
        for record in self.records()? {
            let resolved = self.resolve_all(record, group_fields)?;
            let aggregated = self.resolve_annotations(record, annotations)?;

            for combination in combinations(&resolved) {
                let key: GroupKey = combination.iter().map(CellValue::key).collect();
                let group = groups.entry(key).or_insert_with(|| Group {
                    values: combination.clone(),
                    accumulators: vec![AggregateAccumulator::new(); annotations.len()],
                });
                for (acc, values) in group.accumulators.iter_mut().zip(&aggregated) {
                    for value in values {
                        acc.add(value);
                    }
                }
            }
        }

        Ok(groups
            .into_values()
            .map(|group| {
                let mut row = ResultRow::new();
                for (field, value) in group_fields.iter().zip(group.values) {
                    row.set(field.clone(), value);
                }
                for (annotation, acc) in annotations.iter().zip(&group.accumulators) {
                    row.set(annotation.alias.clone(), acc.compute(annotation.function));
                }
                row
            })
            .collect())
    }

    /// `annotate(annotations).values(fields)`: annotations are computed per
    /// object, then each object yields one row per combination of `fields`.
    pub fn annotate_each(&self, fields: &[String], annotations: &[Annotation]) -> EngineResult<Vec<ResultRow>> {
        let mut rows = Vec::new();
        for record in self.records()? {
            let resolved = self.resolve_all(record, fields)?;
            let aggregated = self.resolve_annotations(record, annotations)?;
            let annotated: Vec<CellValue> = annotations
                .iter()
                .zip(&aggregated)
                .map(|(annotation, values)| {
                    let mut acc = AggregateAccumulator::new();
                    values.iter().for_each(|v| acc.add(v));
                    acc.compute(annotation.function)
                })
                .collect();

            for combination in combinations(&resolved) {
                let mut row: ResultRow = fields.iter().cloned().zip(combination).collect();
                for (annotation, value) in annotations.iter().zip(&annotated) {
                    row.set(annotation.alias.clone(), value.clone());
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Aggregates over the whole set, keyed by alias.
    pub fn aggregate(&self, annotations: &[Annotation]) -> EngineResult<ResultRow> {
        let mut accumulators = vec![AggregateAccumulator::new(); annotations.len()];
        for record in self.records()? {
            for (acc, values) in accumulators.iter_mut().zip(self.resolve_annotations(record, annotations)?) {
                values.iter().for_each(|v| acc.add(v));
            }
        }
        Ok(annotations
            .iter()
            .zip(&accumulators)
            .map(|(annotation, acc)| (annotation.alias.clone(), acc.compute(annotation.function)))
            .collect())
    }

    /// Distinct values of `path`, ascending.
    pub fn distinct_values(&self, path: &str) -> EngineResult<Vec<CellValue>> {
        let mut seen: FxHashMap<ValueKey, CellValue> = FxHashMap::default();
        for record in self.records()? {
            for value in self.db.resolve_path(&self.model, record, path)? {
                seen.entry(value.key()).or_insert(value);
            }
        }
        let mut values: Vec<(ValueKey, CellValue)> = seen.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(values.into_iter().map(|(_, v)| v).collect())
    }

    fn resolve_all(&self, record: &Record, fields: &[String]) -> EngineResult<Vec<PathValues>> {
        fields
            .iter()
            .map(|f| self.db.resolve_path(&self.model, record, f))
            .collect()
    }

    fn resolve_annotations(&self, record: &Record, annotations: &[Annotation]) -> EngineResult<Vec<PathValues>> {
        annotations
            .iter()
            .map(|a| self.db.resolve_path(&self.model, record, &a.field))
            .collect()
    }
}

/// Cartesian product of per-field value lists.
fn combinations(lists: &[PathValues]) -> Vec<Vec<CellValue>> {
    let mut out: Vec<Vec<CellValue>> = vec![Vec::with_capacity(lists.len())];
    for values in lists {
        let mut next = Vec::with_capacity(out.len() * values.len());
        for prefix in &out {
            for value in values {
                let mut row = prefix.clone();
                row.push(value.clone());
                next.push(row);
            }
        }
        out = next;
    }
    out
}

/// Stable sort of result rows by one field.
pub fn order_rows(rows: &mut [ResultRow], field: &str, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ord = a.get(field).key().cmp(&b.get(field).key());
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

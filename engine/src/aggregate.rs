//! FILENAME: engine/src/aggregate.rs
//! Aggregate functions and the accumulator that evaluates them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::{CellValue, ValueKey};

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    DistinctCount,
}

impl AggregateFn {
    /// Suffix used to build the default alias `<field>__<suffix>`.
    pub fn alias_suffix(&self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::DistinctCount => "distinct_count",
        }
    }

    /// Human name used in derived titles ("Amount Sum").
    pub fn display_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "Count",
            AggregateFn::Sum => "Sum",
            AggregateFn::Avg => "Avg",
            AggregateFn::Min => "Min",
            AggregateFn::Max => "Max",
            AggregateFn::DistinctCount => "Distinct count",
        }
    }

    /// Default alias for `function(field)`.
    pub fn default_alias(&self, field: &str) -> String {
        format!("{}__{}", field, self.alias_suffix())
    }
}

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Accumulator for computing aggregates incrementally.
/// Stores intermediate state needed for all aggregation types.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    count: u64,
    int_sum: i64,
    float_sum: f64,
    numeric_count: u64,
    /// Sum falls back to `float_sum` once set.
    saw_float: bool,
    min: Option<(ValueKey, CellValue)>,
    max: Option<(ValueKey, CellValue)>,
    distinct: BTreeSet<ValueKey>,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value. Empty values are ignored, as SQL aggregates skip NULL.
    pub fn add(&mut self, value: &CellValue) {
        if value.is_empty() {
            return;
        }
        self.count += 1;

        match value {
            CellValue::Integer(i) => {
                match self.int_sum.checked_add(*i) {
                    Some(sum) => self.int_sum = sum,
                    None => self.saw_float = true,
                }
                self.float_sum += *i as f64;
                self.numeric_count += 1;
            }
            CellValue::Number(n) => {
                self.saw_float = true;
                self.float_sum += n;
                self.numeric_count += 1;
            }
            _ => {}
        }

        let key = value.key();
        if self.min.as_ref().map_or(true, |(k, _)| key < *k) {
            self.min = Some((key.clone(), value.clone()));
        }
        if self.max.as_ref().map_or(true, |(k, _)| key > *k) {
            self.max = Some((key.clone(), value.clone()));
        }
        self.distinct.insert(key);
    }

    /// Computes the final aggregate value. Sum, Avg, Min and Max of nothing
    /// are `Empty`; counts of nothing are zero.
    pub fn compute(&self, function: AggregateFn) -> CellValue {
        match function {
            AggregateFn::Count => CellValue::Integer(self.count as i64),
            AggregateFn::DistinctCount => CellValue::Integer(self.distinct.len() as i64),
            AggregateFn::Sum => {
                if self.numeric_count == 0 {
                    CellValue::Empty
                } else if self.saw_float {
                    CellValue::Number(self.float_sum)
                } else {
                    CellValue::Integer(self.int_sum)
                }
            }
            AggregateFn::Avg => {
                if self.numeric_count == 0 {
                    CellValue::Empty
                } else {
                    CellValue::Number(self.float_sum / self.numeric_count as f64)
                }
            }
            AggregateFn::Min => self.min.as_ref().map(|(_, v)| v.clone()).unwrap_or(CellValue::Empty),
            AggregateFn::Max => self.max.as_ref().map(|(_, v)| v.clone()).unwrap_or(CellValue::Empty),
        }
    }
}

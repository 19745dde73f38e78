//! FILENAME: engine/src/value.rs
//! PURPOSE: Scalar values stored on records and carried through report results.
//! CONTEXT: `CellValue` is what records hold and what result rows carry.
//! `ValueKey` is its hashable, totally ordered projection, used for grouping,
//! lookup tables and ordering. Dereferenced objects project to their primary
//! key, so a raw foreign key and the object it points at share one key.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A related object substituted for a raw foreign key by the dereferencer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub model: String,
    pub pk: i64,
    /// The object's display string, computed when it was dereferenced.
    pub display: String,
}

/// Represents the raw data held by a record field or a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Integer(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Object(ObjectRef),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric view of the value, for Sum/Avg.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The primary key this value refers to: raw integer keys and
    /// dereferenced objects both qualify.
    pub fn as_pk(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Object(obj) => Some(obj.pk),
            _ => None,
        }
    }

    /// Returns the hashable key used for grouping and intersections.
    pub fn key(&self) -> ValueKey {
        match self {
            CellValue::Empty => ValueKey::Empty,
            CellValue::Integer(i) => ValueKey::Integer(*i),
            CellValue::Number(n) => ValueKey::Number(OrderedFloat(*n)),
            CellValue::Text(s) => ValueKey::Text(s.clone()),
            CellValue::Boolean(b) => ValueKey::Boolean(*b),
            CellValue::Date(d) => ValueKey::Date(*d),
            CellValue::Object(obj) => ValueKey::Integer(obj.pk),
        }
    }

    /// Returns the display string for the value.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Object(obj) => obj.display.clone(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

// ============================================================================
// VALUE KEYS
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            // All NaN values hash to the same thing
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            // 0.0 and -0.0 compare equal, so they must hash equal
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// A normalized, hashable, ordered representation of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKey {
    Empty,
    Integer(i64),
    Number(OrderedFloat),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
}

impl ValueKey {
    fn rank(&self) -> u8 {
        match self {
            ValueKey::Empty => 0,
            ValueKey::Integer(_) | ValueKey::Number(_) => 1,
            ValueKey::Date(_) => 2,
            ValueKey::Text(_) => 3,
            ValueKey::Boolean(_) => 4,
        }
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ValueKey::Empty, ValueKey::Empty) => Ordering::Equal,
            (ValueKey::Integer(a), ValueKey::Integer(b)) => a.cmp(b),
            (ValueKey::Number(a), ValueKey::Number(b)) => {
                if a == b {
                    Ordering::Equal
                } else {
                    a.0.total_cmp(&b.0)
                }
            }
            // Mixed numerics compare by value; ties put the integer first so
            // that the ordering stays consistent with Eq.
            (ValueKey::Integer(a), ValueKey::Number(b)) => (*a as f64)
                .partial_cmp(&b.0)
                .unwrap_or(Ordering::Less)
                .then(Ordering::Less),
            (ValueKey::Number(a), ValueKey::Integer(b)) => a
                .0
                .partial_cmp(&(*b as f64))
                .unwrap_or(Ordering::Greater)
                .then(Ordering::Greater),
            (ValueKey::Date(a), ValueKey::Date(b)) => a.cmp(b),
            (ValueKey::Text(a), ValueKey::Text(b)) => a.cmp(b),
            (ValueKey::Boolean(a), ValueKey::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

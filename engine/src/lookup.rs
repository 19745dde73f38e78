//! FILENAME: engine/src/lookup.rs
//! Filter predicates written as `path[__op]=value`.
//!
//! Lookups come from two places: request parameters (raw strings) and
//! report definitions (typed values). Request values are checked when the
//! lookup is parsed: against the field's declared type when it has one,
//! otherwise for their form only, and then coerced against the stored value
//! they are compared with. Any failure to make sense of a request lookup
//! surfaces as `IncorrectLookupParameters`, never as a configuration error.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::schema::{FieldDef, FieldKind, Schema, ValueType, LOOKUP_SEP};
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupOp {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    IsNull,
    Year,
    Month,
    Day,
}

impl LookupOp {
    pub fn from_name(name: &str) -> Option<LookupOp> {
        let op = match name {
            "exact" => LookupOp::Exact,
            "iexact" => LookupOp::IExact,
            "contains" => LookupOp::Contains,
            "icontains" => LookupOp::IContains,
            "startswith" => LookupOp::StartsWith,
            "istartswith" => LookupOp::IStartsWith,
            "endswith" => LookupOp::EndsWith,
            "iendswith" => LookupOp::IEndsWith,
            "in" => LookupOp::In,
            "gt" => LookupOp::Gt,
            "gte" => LookupOp::Gte,
            "lt" => LookupOp::Lt,
            "lte" => LookupOp::Lte,
            "range" => LookupOp::Range,
            "isnull" => LookupOp::IsNull,
            "year" => LookupOp::Year,
            "month" => LookupOp::Month,
            "day" => LookupOp::Day,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LookupValue {
    /// Untyped value from a query string.
    Raw(String),
    /// Typed value from a report definition, or a checked request value.
    Value(CellValue),
    /// Checked operands of `in` and `range`.
    List(Vec<CellValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    pub path: String,
    pub op: LookupOp,
    pub value: LookupValue,
}

impl Lookup {
    pub fn new(path: &str, op: LookupOp, value: CellValue) -> Self {
        Lookup {
            path: path.to_string(),
            op,
            value: LookupValue::Value(value),
        }
    }

    pub fn exact(path: &str, value: CellValue) -> Self {
        Self::new(path, LookupOp::Exact, value)
    }

    /// Parses a request parameter `key=raw` against `model`. The value is
    /// validated here, so a malformed request fails the same way whether or
    /// not any rows are stored.
    pub fn parse(schema: &Schema, model: &str, key: &str, raw: &str) -> EngineResult<Lookup> {
        let (path, op, field) = split_lookup_key(schema, model, key)?;
        let value = parse_operand(field_type(field), op, raw).map_err(|reason| {
            EngineError::IncorrectLookupParameters(format!("{} ({:?}={}): {}", path, op, raw, reason))
        })?;
        Ok(Lookup { path, op, value })
    }

    /// True if any of the values reached by the path satisfies the lookup.
    pub fn matches(&self, values: &[CellValue]) -> EngineResult<bool> {
        if self.op == LookupOp::IsNull {
            let wanted = self.bool_operand()?;
            let is_null = values.iter().all(CellValue::is_empty);
            return Ok(is_null == wanted);
        }
        for value in values {
            if self.matches_one(value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_one(&self, value: &CellValue) -> EngineResult<bool> {
        if value.is_empty() {
            // NULL never compares equal; an explicit Empty operand asks for it.
            return Ok(matches!(&self.value, LookupValue::Value(CellValue::Empty)));
        }

        let matched = match self.op {
            LookupOp::Exact => self.operand(value)?.key() == value.key(),
            LookupOp::IExact => value.display().to_lowercase() == self.text().to_lowercase(),
            LookupOp::Contains => value.display().contains(&self.text()),
            LookupOp::IContains => value.display().to_lowercase().contains(&self.text().to_lowercase()),
            LookupOp::StartsWith => value.display().starts_with(&self.text()),
            LookupOp::IStartsWith => value.display().to_lowercase().starts_with(&self.text().to_lowercase()),
            LookupOp::EndsWith => value.display().ends_with(&self.text()),
            LookupOp::IEndsWith => value.display().to_lowercase().ends_with(&self.text().to_lowercase()),
            LookupOp::In => {
                let key = value.key();
                let mut found = false;
                for part in self.list_operands(value)? {
                    if part.key() == key {
                        found = true;
                        break;
                    }
                }
                found
            }
            LookupOp::Gt => value.key() > self.operand(value)?.key(),
            LookupOp::Gte => value.key() >= self.operand(value)?.key(),
            LookupOp::Lt => value.key() < self.operand(value)?.key(),
            LookupOp::Lte => value.key() <= self.operand(value)?.key(),
            LookupOp::Range => {
                let bounds = self.list_operands(value)?;
                let [low, high] = bounds.as_slice() else {
                    return Err(self.incorrect("range needs two values"));
                };
                let key = value.key();
                key >= low.key() && key <= high.key()
            }
            LookupOp::Year | LookupOp::Month | LookupOp::Day => {
                let part = self.int_operand()?;
                match value {
                    CellValue::Date(d) => {
                        let actual = match self.op {
                            LookupOp::Year => d.year() as i64,
                            LookupOp::Month => d.month() as i64,
                            _ => d.day() as i64,
                        };
                        actual == part
                    }
                    _ => false,
                }
            }
            LookupOp::IsNull => unreachable!("handled in matches"),
        };
        Ok(matched)
    }

    fn text(&self) -> String {
        match &self.value {
            LookupValue::Raw(s) => s.clone(),
            LookupValue::Value(v) => v.display(),
            LookupValue::List(values) => values.iter().map(CellValue::display).collect::<Vec<_>>().join(","),
        }
    }

    fn operand(&self, sample: &CellValue) -> EngineResult<CellValue> {
        match &self.value {
            LookupValue::Raw(s) => coerce_like(sample, s).ok_or_else(|| self.incorrect("invalid value")),
            LookupValue::Value(v) => Ok(v.clone()),
            LookupValue::List(_) => Err(self.incorrect("expected a single value")),
        }
    }

    fn list_operands(&self, sample: &CellValue) -> EngineResult<Vec<CellValue>> {
        match &self.value {
            LookupValue::Raw(s) => s
                .split(',')
                .map(|part| coerce_like(sample, part.trim()).ok_or_else(|| self.incorrect("invalid value")))
                .collect(),
            LookupValue::Value(v) => Ok(vec![v.clone()]),
            LookupValue::List(values) => Ok(values.clone()),
        }
    }

    fn bool_operand(&self) -> EngineResult<bool> {
        match &self.value {
            LookupValue::Raw(s) => parse_bool(s).ok_or_else(|| self.incorrect("expected a boolean")),
            LookupValue::Value(CellValue::Boolean(b)) => Ok(*b),
            _ => Err(self.incorrect("expected a boolean")),
        }
    }

    fn int_operand(&self) -> EngineResult<i64> {
        match &self.value {
            LookupValue::Raw(s) => s.trim().parse().map_err(|_| self.incorrect("expected an integer")),
            LookupValue::Value(v) => v.as_pk().ok_or_else(|| self.incorrect("expected an integer")),
            LookupValue::List(_) => Err(self.incorrect("expected an integer")),
        }
    }

    fn incorrect(&self, reason: &str) -> EngineError {
        EngineError::IncorrectLookupParameters(format!("{} ({:?}={}): {}", self.path, self.op, self.text(), reason))
    }
}

/// Splits `key` into a field path and an operator. The full key is tried
/// as a path first; otherwise the last segment must name an operator.
fn split_lookup_key<'s>(schema: &'s Schema, model: &str, key: &str) -> EngineResult<(String, LookupOp, &'s FieldDef)> {
    if let Ok(field) = schema.get_field(model, key) {
        return Ok((key.to_string(), LookupOp::Exact, field));
    }
    if let Some((path, op_name)) = key.rsplit_once(LOOKUP_SEP) {
        if let Some(op) = LookupOp::from_name(op_name) {
            if let Ok(field) = schema.get_field(model, path) {
                return Ok((path.to_string(), op, field));
            }
        }
    }
    Err(EngineError::IncorrectLookupParameters(format!(
        "Cannot resolve keyword '{}' into field",
        key
    )))
}

/// Type request values are checked against. Relations compare by key.
fn field_type(field: &FieldDef) -> ValueType {
    match field.kind {
        FieldKind::Scalar => field.value_type,
        _ => ValueType::Integer,
    }
}

/// Checks a raw request value for `op` on a field of `value_type`. Typed
/// fields get their operands coerced now; untyped ones keep the raw string
/// once its form is known to be sound.
fn parse_operand(value_type: ValueType, op: LookupOp, raw: &str) -> Result<LookupValue, &'static str> {
    match op {
        LookupOp::IsNull => parse_bool(raw)
            .map(|b| LookupValue::Value(CellValue::Boolean(b)))
            .ok_or("expected a boolean"),
        LookupOp::Year | LookupOp::Month | LookupOp::Day => {
            if !matches!(value_type, ValueType::Any | ValueType::Date) {
                return Err("date part of a field that is not a date");
            }
            raw.trim()
                .parse()
                .map(|n| LookupValue::Value(CellValue::Integer(n)))
                .map_err(|_| "expected an integer")
        }
        LookupOp::In | LookupOp::Range => {
            let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
            if op == LookupOp::Range && parts.len() != 2 {
                return Err("range needs two values");
            }
            if value_type == ValueType::Any {
                return Ok(LookupValue::Raw(raw.to_string()));
            }
            parts
                .into_iter()
                .map(|part| coerce_to(value_type, part).ok_or("invalid value"))
                .collect::<Result<Vec<_>, _>>()
                .map(LookupValue::List)
        }
        LookupOp::Exact | LookupOp::Gt | LookupOp::Gte | LookupOp::Lt | LookupOp::Lte => {
            if value_type == ValueType::Any {
                return Ok(LookupValue::Raw(raw.to_string()));
            }
            coerce_to(value_type, raw).map(LookupValue::Value).ok_or("invalid value")
        }
        // Text operators compare display strings, whatever the type.
        LookupOp::IExact
        | LookupOp::Contains
        | LookupOp::IContains
        | LookupOp::StartsWith
        | LookupOp::IStartsWith
        | LookupOp::EndsWith
        | LookupOp::IEndsWith => Ok(LookupValue::Raw(raw.to_string())),
    }
}

fn coerce_to(value_type: ValueType, raw: &str) -> Option<CellValue> {
    let raw = raw.trim();
    match value_type {
        ValueType::Integer => raw.parse().ok().map(CellValue::Integer),
        ValueType::Number => raw.parse().ok().map(CellValue::Number),
        ValueType::Boolean => parse_bool(raw).map(CellValue::Boolean),
        ValueType::Date => chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(CellValue::Date),
        ValueType::Text | ValueType::Any => Some(CellValue::Text(raw.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "true" | "True" | "on" | "yes" => Some(true),
        "0" | "false" | "False" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Coerces a raw string to the variant of `sample`.
fn coerce_like(sample: &CellValue, raw: &str) -> Option<CellValue> {
    let raw = raw.trim();
    match sample {
        CellValue::Integer(_) | CellValue::Object(_) => raw.parse().ok().map(CellValue::Integer),
        CellValue::Number(_) => raw.parse().ok().map(CellValue::Number),
        CellValue::Boolean(_) => parse_bool(raw).map(CellValue::Boolean),
        CellValue::Date(_) => chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(CellValue::Date),
        CellValue::Text(_) | CellValue::Empty => Some(CellValue::Text(raw.to_string())),
    }
}

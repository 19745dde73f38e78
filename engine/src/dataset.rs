//! FILENAME: engine/src/dataset.rs
//! PURPOSE: In-memory relational store that reports query against.
//! CONTEXT: One table per model. Records keep their raw field values with
//! foreign keys stored as integer primary keys. Reverse relations are
//! served from an index maintained on insert, so traversing
//! `customer__order` does not rescan the order table.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::error::{EngineError, EngineResult};
use crate::schema::{FieldDef, FieldKind, Schema};
use crate::value::{CellValue, ObjectRef};

/// Values reached by a path from one record. Most paths are single-valued.
pub type PathValues = SmallVec<[CellValue; 1]>;

/// A single stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub pk: i64,
    pub values: FxHashMap<String, CellValue>,
}

static EMPTY: CellValue = CellValue::Empty;

impl Record {
    /// Returns the stored value of a field, or `Empty` when unset.
    pub fn get(&self, field: &str) -> &CellValue {
        self.values.get(field).unwrap_or(&EMPTY)
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    records: Vec<Record>,
    pk_index: FxHashMap<i64, usize>,
}

/// Reverse index: target pk -> positions of referring records.
type ReverseIndex = FxHashMap<i64, Vec<usize>>;

#[derive(Debug, Clone)]
pub struct Database {
    schema: Schema,
    tables: FxHashMap<String, Table>,
    /// Keyed by (referring model, foreign key field).
    reverse_index: FxHashMap<(String, String), ReverseIndex>,
}

impl Database {
    pub fn new(schema: Schema) -> Self {
        let tables = schema
            .models()
            .map(|m| (m.name.clone(), Table::default()))
            .collect();
        Database {
            schema,
            tables,
            reverse_index: FxHashMap::default(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Inserts a record. Only scalar and foreign-key fields may be set;
    /// foreign keys take integer keys (or objects, stored by key).
    pub fn insert<I, K>(&mut self, model: &str, pk: i64, values: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        let model_def = self.schema.model(model)?;
        let mut stored: FxHashMap<String, CellValue> = FxHashMap::default();
        let mut foreign_keys: Vec<(String, i64)> = Vec::new();

        for (name, value) in values {
            let name = name.into();
            let field = model_def.get_field(&name).ok_or_else(|| EngineError::FieldDoesNotExist {
                model: model.to_string(),
                path: name.clone(),
            })?;
            let value = match &field.kind {
                FieldKind::Scalar => field.value_type.admit(value.clone()).ok_or_else(|| {
                    EngineError::ImproperlyConfigured(format!(
                        "{}.{} expects {:?}, got {:?}",
                        model, name, field.value_type, value
                    ))
                })?,
                FieldKind::ForeignKey { .. } => match value {
                    CellValue::Empty => CellValue::Empty,
                    other => {
                        let key = other.as_pk().ok_or_else(|| {
                            EngineError::ImproperlyConfigured(format!(
                                "{}.{} expects a primary key, got {:?}",
                                model, name, other
                            ))
                        })?;
                        foreign_keys.push((field.name.clone(), key));
                        CellValue::Integer(key)
                    }
                },
                FieldKind::PrimaryKey | FieldKind::Reverse { .. } => {
                    return Err(EngineError::ImproperlyConfigured(format!(
                        "{}.{} cannot be assigned",
                        model, name
                    )));
                }
            };
            stored.insert(field.name.clone(), value);
        }

        let table = self
            .tables
            .get_mut(model)
            .ok_or_else(|| EngineError::UnknownModel(model.to_string()))?;
        if table.pk_index.contains_key(&pk) {
            return Err(EngineError::DuplicateObject { model: model.to_string(), pk });
        }
        let position = table.records.len();
        table.records.push(Record { pk, values: stored });
        table.pk_index.insert(pk, position);

        for (field, target) in foreign_keys {
            self.reverse_index
                .entry((model.to_string(), field))
                .or_default()
                .entry(target)
                .or_default()
                .push(position);
        }

        Ok(())
    }

    pub fn records(&self, model: &str) -> EngineResult<&[Record]> {
        self.tables
            .get(model)
            .map(|t| t.records.as_slice())
            .ok_or_else(|| EngineError::UnknownModel(model.to_string()))
    }

    pub fn get(&self, model: &str, pk: i64) -> EngineResult<&Record> {
        let table = self
            .tables
            .get(model)
            .ok_or_else(|| EngineError::UnknownModel(model.to_string()))?;
        table
            .pk_index
            .get(&pk)
            .map(|&i| &table.records[i])
            .ok_or_else(|| EngineError::ObjectNotFound { model: model.to_string(), pk })
    }

    /// The display string of a record.
    pub fn display(&self, model: &str, record: &Record) -> String {
        let model_def = match self.schema.model(model) {
            Ok(m) => m,
            Err(_) => return format!("object ({})", record.pk),
        };
        match &model_def.display_field {
            Some(field) => record.get(field).display(),
            None => format!("{} object ({})", crate::schema::capfirst(&model_def.verbose_name), record.pk),
        }
    }

    /// Fetches an object by key and wraps it as an `ObjectRef`.
    pub fn object_ref(&self, model: &str, pk: i64) -> EngineResult<ObjectRef> {
        let record = self.get(model, pk)?;
        Ok(ObjectRef {
            model: model.to_string(),
            pk,
            display: self.display(model, record),
        })
    }

    /// Resolves `path` from `record`. Relations fan out; a path that reaches
    /// nothing yields a single `Empty`, like an outer join.
    pub fn resolve_path(&self, model: &str, record: &Record, path: &str) -> EngineResult<PathValues> {
        let fields = self.schema.fields_from_path(model, path)?;
        let mut frontier: Vec<(&str, &Record)> = vec![(model, record)];
        let mut out: PathValues = SmallVec::new();

        for (i, field) in fields.iter().enumerate() {
            if i + 1 == fields.len() {
                for (m, r) in &frontier {
                    self.push_field_values(m, r, field, &mut out)?;
                }
                break;
            }

            let mut next: Vec<(&str, &Record)> = Vec::new();
            for (m, r) in &frontier {
                match &field.kind {
                    FieldKind::ForeignKey { to } => {
                        if let Some(key) = r.get(&field.name).as_pk() {
                            next.push((to.as_str(), self.get(to, key)?));
                        }
                    }
                    FieldKind::Reverse { from, via } => {
                        for related in self.reverse_records(from, via, r.pk)? {
                            next.push((from.as_str(), related));
                        }
                    }
                    _ => {
                        return Err(EngineError::FieldDoesNotExist {
                            model: m.to_string(),
                            path: path.to_string(),
                        })
                    }
                }
            }
            frontier = next;
        }

        if out.is_empty() {
            return Ok(smallvec![CellValue::Empty]);
        }
        Ok(out)
    }

    /// Convenience for paths known to be single-valued: the first value.
    pub fn resolve_first(&self, model: &str, record: &Record, path: &str) -> EngineResult<CellValue> {
        let mut values = self.resolve_path(model, record, path)?;
        Ok(if values.is_empty() { CellValue::Empty } else { values.swap_remove(0) })
    }

    fn push_field_values(
        &self,
        _model: &str,
        record: &Record,
        field: &FieldDef,
        out: &mut PathValues,
    ) -> EngineResult<()> {
        match &field.kind {
            FieldKind::PrimaryKey => out.push(CellValue::Integer(record.pk)),
            FieldKind::Scalar | FieldKind::ForeignKey { .. } => out.push(record.get(&field.name).clone()),
            FieldKind::Reverse { from, via } => {
                for related in self.reverse_records(from, via, record.pk)? {
                    out.push(CellValue::Integer(related.pk));
                }
            }
        }
        Ok(())
    }

    fn reverse_records(&self, from: &str, via: &str, pk: i64) -> EngineResult<Vec<&Record>> {
        let records = self.records(from)?;
        Ok(self
            .reverse_index
            .get(&(from.to_string(), via.to_string()))
            .and_then(|index| index.get(&pk))
            .map(|positions| positions.iter().map(|&p| &records[p]).collect())
            .unwrap_or_default())
    }
}

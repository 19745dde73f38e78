//! FILENAME: band-engine/src/definition.rs
//! Band Definition - The declarative configuration.
//!
//! This module contains the types needed to DESCRIBE a band report:
//! - the group-by choices a reader can switch between
//! - per-group annotations and whole-report aggregates
//! - for detail bands, the columns listed under each group
//!
//! Reuses FieldSpec, AggregateSpec and the aggregate resolver from
//! crosstab-engine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crosstab_engine::{resolve_aggregates, AggregateSpec, FieldSpec, ResolvedAggregate};
use engine::{
    capfirst, CellValue, Database, EngineError, EngineResult, Record, Schema, LOOKUP_SEP,
};

// ============================================================================
// BAND
// ============================================================================

/// A grouped report: one row per distinct value of the selected group-by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDefinition {
    pub model: String,

    /// Group-by choices. The first one is the default.
    pub group_by: Vec<FieldSpec>,

    /// Aggregates computed per group.
    #[serde(default)]
    pub annotate: Vec<AggregateSpec>,

    /// Aggregates computed over the whole filtered set.
    #[serde(default)]
    pub aggregate: Vec<AggregateSpec>,
}

impl BandDefinition {
    pub fn new(model: &str, group_by: Vec<FieldSpec>) -> Self {
        BandDefinition {
            model: model.to_string(),
            group_by,
            annotate: Vec::new(),
            aggregate: Vec::new(),
        }
    }

    /// Checks every group-by choice and aggregate against the schema.
    pub fn validate(&self, schema: &Schema) -> EngineResult<()> {
        schema.model(&self.model).map_err(|e| e.in_attribute("model"))?;
        if self.group_by.is_empty() {
            return Err(EngineError::ImproperlyConfigured(
                "group_by: at least one group-by choice is required".to_string(),
            ));
        }
        for spec in &self.group_by {
            if spec.lookups().is_empty() {
                return Err(EngineError::ImproperlyConfigured(
                    "group_by: a choice needs at least one field".to_string(),
                ));
            }
            for lookup in spec.lookups() {
                schema
                    .get_field(&self.model, lookup)
                    .map_err(|e| e.in_attribute("group_by"))?;
            }
        }
        resolve_aggregates(schema, &self.model, "annotate", &self.annotate)?;
        resolve_aggregates(schema, &self.model, "aggregate", &self.aggregate)?;
        Ok(())
    }

    /// Resolves the layout for one selected group-by choice.
    pub fn layout(&self, schema: &Schema, selected: &FieldSpec) -> EngineResult<BandLayout> {
        Ok(BandLayout {
            model: self.model.clone(),
            lookups: selected.lookups().to_vec(),
            group_title: selected.title(schema, &self.model).map_err(|e| e.in_attribute("group_by"))?,
            annotate: resolve_aggregates(schema, &self.model, "annotate", &self.annotate)?,
            aggregate: resolve_aggregates(schema, &self.model, "aggregate", &self.aggregate)?,
        })
    }
}

/// A band definition resolved for one request's group-by choice.
#[derive(Debug, Clone, Serialize)]
pub struct BandLayout {
    pub model: String,
    pub lookups: Vec<String>,
    pub group_title: String,
    pub annotate: Vec<ResolvedAggregate>,
    pub aggregate: Vec<ResolvedAggregate>,
}

// ============================================================================
// DETAIL COLUMNS
// ============================================================================

/// Computes a detail value for one object.
pub type Accessor = Arc<dyn Fn(&Database, &Record) -> CellValue + Send + Sync>;

/// Named accessors a detail band may list next to plain fields.
#[derive(Clone, Default)]
pub struct CustomAccessors(BTreeMap<String, Accessor>);

impl CustomAccessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, key: &str, accessor: F) -> Self
    where
        F: Fn(&Database, &Record) -> CellValue + Send + Sync + 'static,
    {
        self.0.insert(key.to_string(), Arc::new(accessor));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Accessor> {
        self.0.get(key)
    }
}

impl fmt::Debug for CustomAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// How one detail column gets its value.
#[derive(Clone)]
pub enum DetailColumn {
    /// A `__` path through relations.
    Path(String),
    /// A field of the base model.
    Field(String),
    /// A registered accessor.
    Custom(Accessor),
}

impl fmt::Debug for DetailColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailColumn::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DetailColumn::Field(field) => f.debug_tuple("Field").field(field).finish(),
            DetailColumn::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Registry mapping each listed key to its accessor, built once per
/// definition. Unknown keys are rejected when it is built.
#[derive(Debug, Clone)]
pub struct DetailColumns {
    model: String,
    keys: Vec<String>,
    titles: Vec<String>,
    columns: Vec<DetailColumn>,
}

impl DetailColumns {
    pub fn build(schema: &Schema, model: &str, keys: &[String], custom: &CustomAccessors) -> EngineResult<Self> {
        let model_def = schema.model(model)?;
        let mut titles = Vec::with_capacity(keys.len());
        let mut columns = Vec::with_capacity(keys.len());

        for key in keys {
            let unresolved = || {
                EngineError::ImproperlyConfigured(format!(
                    "detail_list_display: could not resolve '{}' into value",
                    key
                ))
            };
            let (column, title) = if key.contains(LOOKUP_SEP) {
                let title = schema.title_for_path(model, key).map_err(|_| unresolved())?;
                (DetailColumn::Path(key.clone()), title)
            } else if model_def.get_field(key).is_some() {
                (DetailColumn::Field(key.clone()), schema.title_for_path(model, key)?)
            } else if let Some(accessor) = custom.get(key) {
                (DetailColumn::Custom(accessor.clone()), capfirst(&key.replace('_', " ")))
            } else {
                return Err(unresolved());
            };
            titles.push(title);
            columns.push(column);
        }

        Ok(DetailColumns {
            model: model.to_string(),
            keys: keys.to_vec(),
            titles,
            columns,
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Values of every column for one object. Relations come back as
    /// objects; paths reaching several values are joined with ", ".
    pub fn resolve(&self, db: &Database, record: &Record) -> EngineResult<Vec<CellValue>> {
        self.columns
            .iter()
            .map(|column| match column {
                DetailColumn::Path(path) | DetailColumn::Field(path) => self.resolve_path(db, record, path),
                DetailColumn::Custom(accessor) => Ok(accessor(db, record)),
            })
            .collect()
    }

    fn resolve_path(&self, db: &Database, record: &Record, path: &str) -> EngineResult<CellValue> {
        let field = db.schema().get_field(&self.model, path)?;
        let mut values = db.resolve_path(&self.model, record, path)?;
        if let Some(related) = field.related_model() {
            for value in values.iter_mut() {
                if let CellValue::Integer(pk) = value {
                    *value = CellValue::Object(db.object_ref(related, *pk)?);
                }
            }
        }
        if values.len() == 1 {
            return Ok(values.swap_remove(0));
        }
        let joined: Vec<String> = values.iter().filter(|v| !v.is_empty()).map(CellValue::display).collect();
        Ok(CellValue::Text(joined.join(", ")))
    }
}

// ============================================================================
// DETAIL BAND
// ============================================================================

/// A band report listing member objects under each group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailBandDefinition {
    pub band: BandDefinition,

    /// Keys of the detail columns: paths, fields or custom accessors.
    pub detail_list_display: Vec<String>,

    /// Detail columns rendered as links to the object.
    #[serde(default)]
    pub detail_link_fields: Vec<String>,

    #[serde(skip)]
    pub accessors: CustomAccessors,
}

impl DetailBandDefinition {
    pub fn new(band: BandDefinition, detail_list_display: &[&str]) -> Self {
        DetailBandDefinition {
            band,
            detail_list_display: detail_list_display.iter().map(|k| k.to_string()).collect(),
            detail_link_fields: Vec::new(),
            accessors: CustomAccessors::new(),
        }
    }

    pub fn validate(&self, schema: &Schema) -> EngineResult<()> {
        self.band.validate(schema)?;
        self.detail_columns(schema)?;
        for key in &self.detail_link_fields {
            if !self.detail_list_display.contains(key) {
                return Err(EngineError::ImproperlyConfigured(format!(
                    "detail_link_fields: '{}' is not in detail_list_display",
                    key
                )));
            }
        }
        Ok(())
    }

    pub fn detail_columns(&self, schema: &Schema) -> EngineResult<DetailColumns> {
        DetailColumns::build(schema, &self.band.model, &self.detail_list_display, &self.accessors)
    }
}

//! FILENAME: engine/src/schema.rs
//! PURPOSE: Describes the relational data model reports are declared over.
//! CONTEXT: A `Schema` is a set of models. Each model has scalar fields,
//! foreign keys and (derived) reverse relations. Field paths traverse
//! relations with the `__` separator, e.g. `customer__region__name`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::value::CellValue;

/// Separator between the segments of a field path.
pub const LOOKUP_SEP: &str = "__";

/// Name of the implicit primary-key field every model carries.
pub const PK_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// The record's primary key.
    PrimaryKey,
    /// A plain stored column.
    Scalar,
    /// A stored key pointing at one record of `to`.
    ForeignKey { to: String },
    /// Derived accessor for every `from` record whose `via` foreign key
    /// points at this record.
    Reverse { from: String, via: String },
}

/// Declared type of a stored column. Request values are checked against it
/// before any record is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueType {
    /// Untyped; request values take the type of the stored value they meet.
    #[default]
    Any,
    Integer,
    Number,
    Text,
    Boolean,
    Date,
}

impl ValueType {
    /// Brings a stored value into this type, or `None` if it does not fit.
    /// Integers widen to numbers; `Empty` fits every type.
    pub fn admit(self, value: CellValue) -> Option<CellValue> {
        match (self, value) {
            (_, CellValue::Empty) => Some(CellValue::Empty),
            (ValueType::Any, v) => Some(v),
            (ValueType::Number, CellValue::Integer(i)) => Some(CellValue::Number(i as f64)),
            (ValueType::Integer, v @ CellValue::Integer(_))
            | (ValueType::Number, v @ CellValue::Number(_))
            | (ValueType::Text, v @ CellValue::Text(_))
            | (ValueType::Boolean, v @ CellValue::Boolean(_))
            | (ValueType::Date, v @ CellValue::Date(_)) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub verbose_name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub value_type: ValueType,
}

impl FieldDef {
    pub fn scalar(name: &str, verbose_name: &str) -> Self {
        Self::typed(name, verbose_name, ValueType::Any)
    }

    pub fn typed(name: &str, verbose_name: &str, value_type: ValueType) -> Self {
        FieldDef {
            name: name.to_string(),
            verbose_name: verbose_name.to_string(),
            kind: FieldKind::Scalar,
            value_type,
        }
    }

    pub fn foreign_key(name: &str, verbose_name: &str, to: &str) -> Self {
        FieldDef {
            name: name.to_string(),
            verbose_name: verbose_name.to_string(),
            kind: FieldKind::ForeignKey { to: to.to_string() },
            value_type: ValueType::Integer,
        }
    }

    /// True for foreign keys and reverse relations.
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey { .. } | FieldKind::Reverse { .. })
    }

    /// The model on the other side of a relation.
    pub fn related_model(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { to } => Some(to),
            FieldKind::Reverse { from, .. } => Some(from),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub verbose_name: String,
    pub fields: Vec<FieldDef>,
    /// Field whose value is an object's display string. Objects without one
    /// display as "<Verbose name> object (<pk>)".
    pub display_field: Option<String>,
}

impl ModelDef {
    pub fn new(name: &str, verbose_name: &str) -> Self {
        ModelDef {
            name: name.to_string(),
            verbose_name: verbose_name.to_string(),
            fields: vec![FieldDef {
                name: PK_FIELD.to_string(),
                verbose_name: "ID".to_string(),
                kind: FieldKind::PrimaryKey,
                value_type: ValueType::Integer,
            }],
            display_field: None,
        }
    }

    pub fn scalar(mut self, name: &str, verbose_name: &str) -> Self {
        self.fields.push(FieldDef::scalar(name, verbose_name));
        self
    }

    /// Adds a scalar field with a declared type.
    pub fn typed(mut self, name: &str, verbose_name: &str, value_type: ValueType) -> Self {
        self.fields.push(FieldDef::typed(name, verbose_name, value_type));
        self
    }

    pub fn foreign_key(mut self, name: &str, verbose_name: &str, to: &str) -> Self {
        self.fields.push(FieldDef::foreign_key(name, verbose_name, to));
        self
    }

    pub fn display_field(mut self, name: &str) -> Self {
        self.display_field = Some(name.to_string());
        self
    }

    /// Looks up a field by name. `pk` is an alias for the primary key.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        let name = if name == "pk" { PK_FIELD } else { name };
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The full set of models, with reverse relations derived from foreign keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    models: BTreeMap<String, ModelDef>,
}

impl Schema {
    /// Builds a schema, checking foreign-key targets and adding one reverse
    /// accessor per foreign key, named after the referring model.
    pub fn new(models: Vec<ModelDef>) -> EngineResult<Self> {
        let mut by_name: BTreeMap<String, ModelDef> = BTreeMap::new();
        for model in models {
            if by_name.contains_key(&model.name) {
                return Err(EngineError::ImproperlyConfigured(format!(
                    "model '{}' declared twice",
                    model.name
                )));
            }
            by_name.insert(model.name.clone(), model);
        }

        let mut reverse: Vec<(String, FieldDef)> = Vec::new();
        for model in by_name.values() {
            for field in &model.fields {
                if let FieldKind::ForeignKey { to } = &field.kind {
                    if !by_name.contains_key(to) {
                        return Err(EngineError::ImproperlyConfigured(format!(
                            "{}.{} points at unknown model '{}'",
                            model.name, field.name, to
                        )));
                    }
                    reverse.push((
                        to.clone(),
                        FieldDef {
                            name: model.name.clone(),
                            verbose_name: model.verbose_name.clone(),
                            kind: FieldKind::Reverse {
                                from: model.name.clone(),
                                via: field.name.clone(),
                            },
                            value_type: ValueType::Integer,
                        },
                    ));
                }
            }
        }

        for (target, field) in reverse {
            // Both were checked above.
            let Some(model) = by_name.get_mut(&target) else { continue };
            if model.get_field(&field.name).is_some() {
                return Err(EngineError::ImproperlyConfigured(format!(
                    "reverse accessor '{}' clashes with a field on '{}'",
                    field.name, target
                )));
            }
            model.fields.push(field);
        }

        Ok(Schema { models: by_name })
    }

    pub fn model(&self, name: &str) -> EngineResult<&ModelDef> {
        self.models
            .get(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values()
    }

    /// Resolves every segment of `path`, starting at `model`. All segments
    /// but the last must be relations.
    pub fn fields_from_path(&self, model: &str, path: &str) -> EngineResult<Vec<&FieldDef>> {
        let mut current = self.model(model)?;
        let mut fields = Vec::new();
        let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();

        for (i, segment) in segments.iter().enumerate() {
            let field = current.get_field(segment).ok_or_else(|| EngineError::FieldDoesNotExist {
                model: model.to_string(),
                path: path.to_string(),
            })?;
            fields.push(field);

            if i + 1 < segments.len() {
                let related = field.related_model().ok_or_else(|| EngineError::FieldDoesNotExist {
                    model: model.to_string(),
                    path: path.to_string(),
                })?;
                current = self.model(related)?;
            }
        }

        Ok(fields)
    }

    /// Returns the last field of a path.
    pub fn get_field(&self, model: &str, path: &str) -> EngineResult<&FieldDef> {
        let fields = self.fields_from_path(model, path)?;
        fields.last().copied().ok_or_else(|| EngineError::FieldDoesNotExist {
            model: model.to_string(),
            path: path.to_string(),
        })
    }

    /// Human title for a path: the field's verbose name, or the related
    /// model's verbose name for reverse relations, capitalised.
    pub fn title_for_path(&self, model: &str, path: &str) -> EngineResult<String> {
        let field = self.get_field(model, path)?;
        let title = match &field.kind {
            FieldKind::Reverse { from, .. } => self.model(from)?.verbose_name.clone(),
            _ => field.verbose_name.clone(),
        };
        Ok(capfirst(&title))
    }
}

/// Upper-cases the first character.
pub fn capfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

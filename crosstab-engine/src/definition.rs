//! FILENAME: crosstab-engine/src/definition.rs
//! Cross-tab Definition - The declarative configuration.
//!
//! This module contains the types needed to DESCRIBE a report:
//! - which paths group rows and columns
//! - which aggregates decorate each axis, the crossing and each cell
//! - which group-by choices a report offers
//!
//! Definitions are plain data. Paths are checked against the schema only
//! when they are resolved into a `CrossTabLayout`.

use serde::{Deserialize, Serialize};

use engine::{AggregateFn, EngineResult, Schema};

// ============================================================================
// AGGREGATES
// ============================================================================

/// `(field, function[, title])` as declared on a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Path on the base model, possibly crossing relations with `__`.
    pub field: String,
    pub function: AggregateFn,
    /// Explicit title; derived from the field and function when absent.
    #[serde(default)]
    pub title: Option<String>,
}

impl AggregateSpec {
    pub fn new(field: &str, function: AggregateFn) -> Self {
        AggregateSpec {
            field: field.to_string(),
            function,
            title: None,
        }
    }

    pub fn titled(field: &str, function: AggregateFn, title: &str) -> Self {
        AggregateSpec {
            field: field.to_string(),
            function,
            title: Some(title.to_string()),
        }
    }
}

// ============================================================================
// GROUP-BY FIELDS
// ============================================================================

/// A declared group-by entry: one path, several paths grouped together, or
/// several paths shown under one explicit title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSpec {
    Single(String),
    Composite(Vec<String>),
    Titled { fields: Vec<String>, title: String },
}

impl FieldSpec {
    pub fn single(field: &str) -> Self {
        FieldSpec::Single(field.to_string())
    }

    pub fn composite(fields: &[&str]) -> Self {
        FieldSpec::Composite(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn titled(fields: &[&str], title: &str) -> Self {
        FieldSpec::Titled {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            title: title.to_string(),
        }
    }

    /// The paths this entry groups by.
    pub fn lookups(&self) -> &[String] {
        match self {
            FieldSpec::Single(field) => std::slice::from_ref(field),
            FieldSpec::Composite(fields) => fields,
            FieldSpec::Titled { fields, .. } => fields,
        }
    }

    /// Value of the `g` parameter selecting this entry.
    pub fn param_value(&self) -> String {
        self.lookups().join(",")
    }

    /// Display title. Composite entries join their field titles with ", ".
    pub fn title(&self, schema: &Schema, model: &str) -> EngineResult<String> {
        match self {
            FieldSpec::Titled { title, .. } => Ok(title.clone()),
            _ => {
                let titles = self
                    .lookups()
                    .iter()
                    .map(|f| schema.title_for_path(model, f))
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(titles.join(", "))
            }
        }
    }
}

// ============================================================================
// CROSS-TAB DEFINITION
// ============================================================================

/// The complete definition of a cross-tab report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTabDefinition {
    /// Base model every path starts from.
    pub model: String,

    /// Path identifying a row group.
    pub row: String,

    /// Path identifying a column group.
    pub column: String,

    /// Row label paths. Empty means the row key itself.
    #[serde(default)]
    pub row_headers: Vec<String>,

    /// Column label paths. Empty means the column key itself.
    #[serde(default)]
    pub column_headers: Vec<String>,

    #[serde(default)]
    pub row_aggregate: Vec<AggregateSpec>,
    #[serde(default)]
    pub column_aggregate: Vec<AggregateSpec>,
    #[serde(default)]
    pub cross_aggregate: Vec<AggregateSpec>,

    #[serde(default)]
    pub row_annotate: Vec<AggregateSpec>,
    #[serde(default)]
    pub column_annotate: Vec<AggregateSpec>,
    #[serde(default)]
    pub cross_annotate: Vec<AggregateSpec>,

    /// Per-object value paths shown at each intersection.
    #[serde(default)]
    pub cell_values: Vec<String>,

    /// Per-object aggregates shown at each intersection.
    #[serde(default)]
    pub cell_annotate: Vec<AggregateSpec>,
}

impl CrossTabDefinition {
    pub fn new(model: &str, row: &str, column: &str) -> Self {
        CrossTabDefinition {
            model: model.to_string(),
            row: row.to_string(),
            column: column.to_string(),
            row_headers: Vec::new(),
            column_headers: Vec::new(),
            row_aggregate: Vec::new(),
            column_aggregate: Vec::new(),
            cross_aggregate: Vec::new(),
            row_annotate: Vec::new(),
            column_annotate: Vec::new(),
            cross_annotate: Vec::new(),
            cell_values: Vec::new(),
            cell_annotate: Vec::new(),
        }
    }

    /// Row label paths, defaulting to the row key.
    pub fn effective_row_headers(&self) -> Vec<String> {
        if self.row_headers.is_empty() {
            vec![self.row.clone()]
        } else {
            self.row_headers.clone()
        }
    }

    /// Column label paths, defaulting to the column key.
    pub fn effective_column_headers(&self) -> Vec<String> {
        if self.column_headers.is_empty() {
            vec![self.column.clone()]
        } else {
            self.column_headers.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ModelDef;

    fn schema() -> Schema {
        Schema::new(vec![
            ModelDef::new("customer", "customer").scalar("name", "name"),
            ModelDef::new("order", "order")
                .scalar("amount", "amount")
                .foreign_key("customer", "customer", "customer"),
        ])
        .unwrap()
    }

    #[test]
    fn test_field_spec_lookups_and_titles() {
        let schema = schema();
        let single = FieldSpec::single("customer");
        assert_eq!(single.lookups(), &["customer".to_string()]);
        assert_eq!(single.title(&schema, "order").unwrap(), "Customer");

        let composite = FieldSpec::composite(&["customer", "amount"]);
        assert_eq!(composite.param_value(), "customer,amount");
        assert_eq!(composite.title(&schema, "order").unwrap(), "Customer, Amount");

        let titled = FieldSpec::titled(&["customer__name"], "Client");
        assert_eq!(titled.title(&schema, "order").unwrap(), "Client");
    }

    #[test]
    fn test_axis_headers_default_to_key() {
        let mut def = CrossTabDefinition::new("order", "customer", "amount");
        assert_eq!(def.effective_row_headers(), vec!["customer".to_string()]);
        def.row_headers = vec!["customer__name".to_string()];
        assert_eq!(def.effective_row_headers(), vec!["customer__name".to_string()]);
        assert_eq!(def.effective_column_headers(), vec!["amount".to_string()]);
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let json = r#"{
            "model": "order",
            "row": "customer",
            "column": "amount",
            "cross_aggregate": [{"field": "amount", "function": "Sum"}]
        }"#;
        let def: CrossTabDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.cross_aggregate, vec![AggregateSpec::new("amount", AggregateFn::Sum)]);
        assert!(def.cell_values.is_empty());
    }
}

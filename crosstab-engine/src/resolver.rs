//! FILENAME: crosstab-engine/src/resolver.rs
//! PURPOSE: Turns declared aggregates and axes into a checked layout.
//! CONTEXT: Every path is resolved against the schema once, when the
//! definition is validated. Errors name the attribute they came from so a
//! bad definition is rejected at registration with a useful message.

use serde::Serialize;

use engine::{AggregateFn, Annotation, EngineError, EngineResult, Schema};

use crate::definition::{AggregateSpec, CrossTabDefinition};

/// An aggregate with its alias and title worked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAggregate {
    pub field: String,
    pub function: AggregateFn,
    /// Key of the value in result rows: `<field>__<fn>`.
    pub alias: String,
    pub title: String,
}

impl ResolvedAggregate {
    pub fn annotation(&self) -> Annotation {
        Annotation {
            alias: self.alias.clone(),
            field: self.field.clone(),
            function: self.function,
        }
    }
}

/// Resolves one declared list. `attribute` names the list in errors.
pub fn resolve_aggregates(
    schema: &Schema,
    model: &str,
    attribute: &str,
    specs: &[AggregateSpec],
) -> EngineResult<Vec<ResolvedAggregate>> {
    specs
        .iter()
        .map(|spec| {
            let field_title = schema
                .title_for_path(model, &spec.field)
                .map_err(|e| e.in_attribute(attribute))?;
            let title = match &spec.title {
                Some(title) => title.clone(),
                None => format!("{} {}", field_title, spec.function.display_name()),
            };
            Ok(ResolvedAggregate {
                field: spec.field.clone(),
                function: spec.function,
                alias: spec.function.default_alias(&spec.field),
                title,
            })
        })
        .collect()
}

/// Titles for a list of paths. `attribute` names the list in errors.
pub fn resolve_titles(schema: &Schema, model: &str, attribute: &str, paths: &[String]) -> EngineResult<Vec<String>> {
    paths
        .iter()
        .map(|path| schema.title_for_path(model, path).map_err(|e| e.in_attribute(attribute)))
        .collect()
}

/// Aggregates wrapped as query annotations.
pub fn annotations(aggregates: &[&ResolvedAggregate]) -> Vec<Annotation> {
    aggregates.iter().map(|a| a.annotation()).collect()
}

// ============================================================================
// LAYOUT
// ============================================================================

/// A validated cross-tab definition, ready to be queried and rendered.
#[derive(Debug, Clone, Serialize)]
pub struct CrossTabLayout {
    pub model: String,
    pub row: String,
    pub column: String,
    pub row_title: String,
    pub column_title: String,

    /// Row label paths (at least one).
    pub row_headers: Vec<String>,
    pub row_header_titles: Vec<String>,
    /// Column label paths (at least one).
    pub column_headers: Vec<String>,
    pub column_header_titles: Vec<String>,

    pub cell_values: Vec<String>,

    pub cross_aggregate: Vec<ResolvedAggregate>,
    pub row_aggregate: Vec<ResolvedAggregate>,
    pub column_aggregate: Vec<ResolvedAggregate>,
    pub cross_annotate: Vec<ResolvedAggregate>,
    pub row_annotate: Vec<ResolvedAggregate>,
    pub column_annotate: Vec<ResolvedAggregate>,
    pub cell_annotate: Vec<ResolvedAggregate>,
}

impl CrossTabLayout {
    pub fn resolve(schema: &Schema, definition: &CrossTabDefinition) -> EngineResult<Self> {
        let model = definition.model.as_str();
        schema.model(model).map_err(|e| e.in_attribute("model"))?;

        let row_title = schema.title_for_path(model, &definition.row).map_err(|e| e.in_attribute("row"))?;
        let column_title = schema
            .title_for_path(model, &definition.column)
            .map_err(|e| e.in_attribute("column"))?;

        let row_headers = definition.effective_row_headers();
        let column_headers = definition.effective_column_headers();
        let row_header_titles = resolve_titles(schema, model, "row_headers", &row_headers)?;
        let column_header_titles = resolve_titles(schema, model, "column_headers", &column_headers)?;
        resolve_titles(schema, model, "cell_values", &definition.cell_values)?;

        let layout = CrossTabLayout {
            model: model.to_string(),
            row: definition.row.clone(),
            column: definition.column.clone(),
            row_title,
            column_title,
            row_headers,
            row_header_titles,
            column_headers,
            column_header_titles,
            cell_values: definition.cell_values.clone(),
            cross_aggregate: resolve_aggregates(schema, model, "cross_aggregate", &definition.cross_aggregate)?,
            row_aggregate: resolve_aggregates(schema, model, "row_aggregate", &definition.row_aggregate)?,
            column_aggregate: resolve_aggregates(schema, model, "column_aggregate", &definition.column_aggregate)?,
            cross_annotate: resolve_aggregates(schema, model, "cross_annotate", &definition.cross_annotate)?,
            row_annotate: resolve_aggregates(schema, model, "row_annotate", &definition.row_annotate)?,
            column_annotate: resolve_aggregates(schema, model, "column_annotate", &definition.column_annotate)?,
            cell_annotate: resolve_aggregates(schema, model, "cell_annotate", &definition.cell_annotate)?,
        };

        if layout.cell_field_count() == 0 {
            return Err(EngineError::ImproperlyConfigured(
                "cell_values: at least one cell value or cell annotation is required".to_string(),
            ));
        }
        Ok(layout)
    }

    /// Aggregates attached to row results, in their fixed column order:
    /// cross-aggregate, row-aggregate, cross-annotate, row-annotate.
    pub fn row_annotations(&self) -> Vec<&ResolvedAggregate> {
        self.cross_aggregate
            .iter()
            .chain(&self.row_aggregate)
            .chain(&self.cross_annotate)
            .chain(&self.row_annotate)
            .collect()
    }

    /// Aggregates attached to column results, in the same fixed order.
    pub fn column_annotations(&self) -> Vec<&ResolvedAggregate> {
        self.cross_aggregate
            .iter()
            .chain(&self.column_aggregate)
            .chain(&self.cross_annotate)
            .chain(&self.column_annotate)
            .collect()
    }

    /// Number of row-annotation columns right of the column groups.
    pub fn annotation_width(&self) -> usize {
        self.cross_aggregate.len() + self.row_aggregate.len() + self.cross_annotate.len() + self.row_annotate.len()
    }

    /// A trailing "Totals" column exists iff a column aggregate is declared.
    pub fn has_totals_column(&self) -> bool {
        !self.column_aggregate.is_empty()
    }

    /// Fields rendered as one body row each per row group: cell values,
    /// then cell annotation aliases.
    pub fn cell_fields(&self) -> Vec<String> {
        self.cell_values
            .iter()
            .cloned()
            .chain(self.cell_annotate.iter().map(|a| a.alias.clone()))
            .collect()
    }

    pub fn cell_field_count(&self) -> usize {
        self.cell_values.len() + self.cell_annotate.len()
    }

    /// Row-side fields a sort may target: row headers and row aliases.
    pub fn row_sort_fields(&self) -> impl Iterator<Item = &str> {
        self.row_headers
            .iter()
            .map(String::as_str)
            .chain(self.row_annotations().into_iter().map(|a| a.alias.as_str()))
    }

    /// Column-side fields a sort may target.
    pub fn column_sort_fields(&self) -> impl Iterator<Item = &str> {
        self.column_headers
            .iter()
            .map(String::as_str)
            .chain(self.column_annotations().into_iter().map(|a| a.alias.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ModelDef;

    fn schema() -> Schema {
        Schema::new(vec![
            ModelDef::new("region", "region").scalar("name", "name"),
            ModelDef::new("order", "order")
                .scalar("amount", "amount")
                .scalar("month", "month")
                .foreign_key("region", "sales region", "region"),
        ])
        .unwrap()
    }

    #[test]
    fn test_alias_and_derived_title() {
        let schema = schema();
        let resolved = resolve_aggregates(
            &schema,
            "order",
            "cross_aggregate",
            &[
                AggregateSpec::new("amount", AggregateFn::Sum),
                AggregateSpec::titled("amount", AggregateFn::DistinctCount, "Distinct amounts"),
            ],
        )
        .unwrap();
        assert_eq!(resolved[0].alias, "amount__sum");
        assert_eq!(resolved[0].title, "Amount Sum");
        assert_eq!(resolved[1].alias, "amount__distinct_count");
        assert_eq!(resolved[1].title, "Distinct amounts");
    }

    #[test]
    fn test_bad_path_names_attribute() {
        let schema = schema();
        let err = resolve_aggregates(&schema, "order", "row_aggregate", &[AggregateSpec::new("nope", AggregateFn::Sum)])
            .unwrap_err();
        match err {
            EngineError::ImproperlyConfigured(msg) => assert!(msg.starts_with("row_aggregate")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_layout_orders_row_annotations() {
        let schema = schema();
        let mut def = CrossTabDefinition::new("order", "region", "month");
        def.cell_values = vec!["amount".to_string()];
        def.row_annotate = vec![AggregateSpec::new("amount", AggregateFn::Max)];
        def.cross_annotate = vec![AggregateSpec::new("amount", AggregateFn::Min)];
        def.row_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Avg)];
        def.cross_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        def.column_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Count)];

        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();
        let aliases: Vec<&str> = layout.row_annotations().iter().map(|a| a.alias.as_str()).collect();
        assert_eq!(aliases, vec!["amount__sum", "amount__avg", "amount__min", "amount__max"]);
        assert_eq!(layout.annotation_width(), 4);
        assert!(layout.has_totals_column());
        assert_eq!(layout.row_title, "Sales region");
        assert_eq!(layout.row_headers, vec!["region".to_string()]);
    }

    #[test]
    fn test_layout_requires_cell_fields() {
        let schema = schema();
        let def = CrossTabDefinition::new("order", "region", "month");
        assert!(matches!(
            CrossTabLayout::resolve(&schema, &def),
            Err(EngineError::ImproperlyConfigured(_))
        ));
    }
}

//! FILENAME: crosstab-engine/src/query.rs
//! PURPOSE: Runs the three independent cross-tab queries.
//! CONTEXT: Row groups, column groups and per-object cells are computed
//! separately over the same filtered base, then dereferenced. Nothing
//! ties them to one snapshot; they are consistent only as long as the
//! data does not change between them.

use serde::Serialize;

use engine::{order_rows, EngineResult, QuerySet, ResultRow, SortState};

use crate::dereference::dereference_values;
use crate::resolver::{annotations, CrossTabLayout, ResolvedAggregate};

/// Raw material for the grid.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossTabResults {
    pub row_results: Vec<ResultRow>,
    pub column_results: Vec<ResultRow>,
    pub cell_results: Vec<ResultRow>,

    pub row_aggregate_results: ResultRow,
    pub column_aggregate_results: ResultRow,
    pub cross_aggregate_results: ResultRow,

    /// Whether the requested sort applied to rows or columns. Both false
    /// with a sort field set means the sort was ignored.
    pub rows_sorted: bool,
    pub columns_sorted: bool,
}

/// Appends `fields` to `out`, skipping ones already present.
fn push_unique(out: &mut Vec<String>, fields: &[String]) {
    for field in fields {
        if !out.contains(field) {
            out.push(field.clone());
        }
    }
}

/// Builds and runs the row, column and cell queries plus the three grand
/// aggregates. A sort field matching neither axis is ignored.
pub fn assemble_queries(queryset: &QuerySet<'_>, layout: &CrossTabLayout, sort: &SortState) -> EngineResult<CrossTabResults> {
    let db = queryset.db();
    let model = queryset.model();

    // Row groups
    let mut row_fields = vec![layout.row.clone()];
    push_unique(&mut row_fields, &layout.row_headers);
    let mut row_results = queryset.values_annotate(&row_fields, &annotations(&layout.row_annotations()))?;

    let mut rows_sorted = false;
    if let Some(field) = &sort.field {
        if layout.row_sort_fields().any(|f| f == field.as_str()) {
            order_rows(&mut row_results, field, sort.direction);
            rows_sorted = true;
        }
    }

    // Column groups
    let mut column_fields = vec![layout.column.clone()];
    push_unique(&mut column_fields, &layout.column_headers);
    let mut column_results = queryset.values_annotate(&column_fields, &annotations(&layout.column_annotations()))?;

    let mut columns_sorted = false;
    if let Some(field) = &sort.field {
        if layout.column_sort_fields().any(|f| f == field.as_str()) {
            order_rows(&mut column_results, field, sort.direction);
            columns_sorted = true;
        }
    }

    // Cells
    let mut cell_fields = vec![layout.row.clone()];
    push_unique(&mut cell_fields, std::slice::from_ref(&layout.column));
    push_unique(&mut cell_fields, &layout.cell_values);
    let cell_annotations: Vec<_> = layout.cell_annotate.iter().map(|a| a.annotation()).collect();
    let mut cell_results = queryset.annotate_each(&cell_fields, &cell_annotations)?;

    dereference_values(db, model, &layout.row_headers, &mut row_results)?;
    dereference_values(db, model, &layout.column_headers, &mut column_results)?;
    dereference_values(db, model, &layout.cell_values, &mut cell_results)?;

    let grand = |aggregates: &[ResolvedAggregate]| {
        let annotations: Vec<_> = aggregates.iter().map(|a| a.annotation()).collect();
        queryset.aggregate(&annotations)
    };

    Ok(CrossTabResults {
        row_aggregate_results: grand(&layout.row_aggregate)?,
        column_aggregate_results: grand(&layout.column_aggregate)?,
        cross_aggregate_results: grand(&layout.cross_aggregate)?,
        row_results,
        column_results,
        cell_results,
        rows_sorted,
        columns_sorted,
    })
}

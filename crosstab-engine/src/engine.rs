//! FILENAME: crosstab-engine/src/engine.rs
//! Cross-tab Calculation Engine - Assembles query results into a grid.
//!
//! This module takes the row, column and cell results and produces a
//! renderable CrossTabView. Body and footer cells are placed at explicit
//! logical positions in a sparse grid:
//!
//! - `[0, R)`            row labels
//! - `[R, R+C)`          one column per column group
//! - `[R+C, R+C+A)`      row annotations: cross-aggregate, row-aggregate,
//!                       cross-annotate, row-annotate
//! - `R+C+A`             "Totals", only when a column aggregate exists
//!
//! The grid is then flattened, so every body and footer row has the same
//! width no matter which positions were filled.

use rustc_hash::FxHashMap;

use engine::{
    sort_header, CellValue, EngineResult, Grid, QuerySet, RequestParams, ResultRow, SortState, ValueKey, ViewCell,
};

use crate::query::{assemble_queries, CrossTabResults};
use crate::resolver::CrossTabLayout;
use crate::view::CrossTabView;

/// Rendering options supplied by the host.
#[derive(Debug, Clone)]
pub struct CrossTabOptions {
    /// Label of the totals column header and the totals row.
    pub totals_label: String,
}

impl Default for CrossTabOptions {
    fn default() -> Self {
        CrossTabOptions {
            totals_label: "Totals".to_string(),
        }
    }
}

// ============================================================================
// CROSS-TAB CALCULATOR
// ============================================================================

pub struct CrossTabCalculator<'a> {
    layout: &'a CrossTabLayout,
    results: &'a CrossTabResults,
    sort: &'a SortState,
    params: &'a RequestParams,
    options: &'a CrossTabOptions,

    /// (row key, column key) -> cell result row.
    cells: FxHashMap<(ValueKey, ValueKey), &'a ResultRow>,
    duplicate_cells: usize,

    /// Row-label columns.
    r: u32,
    /// Column groups.
    c: u32,
    /// Row-annotation columns.
    a: u32,
    width: u32,
}

impl<'a> CrossTabCalculator<'a> {
    pub fn new(
        layout: &'a CrossTabLayout,
        results: &'a CrossTabResults,
        sort: &'a SortState,
        params: &'a RequestParams,
        options: &'a CrossTabOptions,
    ) -> Self {
        let r = layout.row_headers.len() as u32;
        let c = results.column_results.len() as u32;
        let a = layout.annotation_width() as u32;
        let width = r + c + a + u32::from(layout.has_totals_column());

        CrossTabCalculator {
            layout,
            results,
            sort,
            params,
            options,
            cells: FxHashMap::default(),
            duplicate_cells: 0,
            r,
            c,
            a,
            width,
        }
    }

    /// Executes the full assembly and returns the rendered view.
    pub fn calculate(&mut self) -> CrossTabView {
        // Step 1: Index cell rows by intersection
        self.build_lookup_table();

        // Step 2: Header rows
        let mut headers = self.build_headers();

        // Step 3: Body
        let mut grid: Grid<ViewCell> = Grid::new(self.width);
        let body_row_count = self.build_body(&mut grid);

        // Steps 4-6: Footers
        let mut next = body_row_count;
        next = self.build_aggregate_footers(&mut grid, next);
        next = self.build_annotation_footers(&mut grid, next);
        self.build_totals_row(&mut grid, next);

        // Step 7: Corner header labels the row dimension
        let header_rows = headers.len() as u32;
        if let Some(first) = headers.first_mut() {
            first.insert(0, ViewCell::header(self.layout.row_title.clone()).with_row_span(header_rows));
        }

        CrossTabView {
            headers,
            rows: grid.into_rows(|_, _| ViewCell::blank()),
            body_row_count: body_row_count as usize,
            width: self.width as usize,
            row_label_count: self.r as usize,
            column_count: self.c as usize,
            annotation_width: self.a as usize,
            has_totals_column: self.layout.has_totals_column(),
            result_count: self.results.row_results.len(),
            duplicate_cells: self.duplicate_cells,
        }
    }

    fn build_lookup_table(&mut self) {
        let layout = self.layout;
        let results = self.results;
        for cell in &results.cell_results {
            let key = (cell.get(&layout.row).key(), cell.get(&layout.column).key());
            if self.cells.insert(key, cell).is_some() {
                self.duplicate_cells += 1;
            }
        }
    }

    /// Row 0, then one row per column header. Row 0 cells right of the
    /// column groups span every header row.
    fn build_headers(&self) -> Vec<Vec<ViewCell>> {
        let layout = self.layout;
        let header_rows = 1 + layout.column_headers.len() as u32;
        let mut headers = Vec::with_capacity(header_rows as usize);

        let mut top: Vec<ViewCell> = layout
            .row_headers
            .iter()
            .zip(&layout.row_header_titles)
            .map(|(field, title)| sort_header(title, field, self.sort, self.params))
            .collect();
        top.push(
            ViewCell::header(layout.column_title.clone())
                .with_class("grp-text")
                .with_col_span(self.c),
        );
        for aggregate in layout.row_annotations() {
            top.push(ViewCell::header(aggregate.title.clone()).with_row_span(header_rows));
        }
        if layout.has_totals_column() {
            top.push(ViewCell::header(self.options.totals_label.clone()).with_row_span(header_rows));
        }
        headers.push(top);

        for (field, title) in layout.column_headers.iter().zip(&layout.column_header_titles) {
            let mut row = vec![sort_header(title, field, self.sort, self.params).with_col_span(self.r)];
            for column in &self.results.column_results {
                row.push(ViewCell::value_header(column.get(field).clone()));
            }
            headers.push(row);
        }

        headers
    }

    /// One body row per (row group, cell field). Returns the number of rows.
    fn build_body(&self, grid: &mut Grid<ViewCell>) -> u32 {
        let layout = self.layout;
        let cell_fields = layout.cell_fields();
        let field_count = cell_fields.len() as u32;
        let row_annotations = layout.row_annotations();
        let annotation_start = self.r + self.c;

        let mut line = 0u32;
        for row in &self.results.row_results {
            let row_key = row.get(&layout.row).key();

            for (index, field) in cell_fields.iter().enumerate() {
                grid.touch_row(line);

                // Row labels and row annotations span the group's rows
                if index == 0 {
                    for (h, header) in layout.row_headers.iter().enumerate() {
                        let label = ViewCell::span_header(row.get(header).clone()).with_row_span(field_count);
                        grid.set_cell(line, h as u32, label);
                    }
                    for (k, aggregate) in row_annotations.iter().enumerate() {
                        let value = ViewCell::span_data(row.get(&aggregate.alias).clone())
                            .with_class("annotate")
                            .with_row_span(field_count);
                        grid.set_cell(line, annotation_start + k as u32, value);
                    }
                } else {
                    for h in 0..self.r {
                        grid.set_cell(line, h, ViewCell::spanned());
                    }
                    for k in 0..self.a {
                        grid.set_cell(line, annotation_start + k, ViewCell::spanned());
                    }
                }

                for (j, column) in self.results.column_results.iter().enumerate() {
                    let key = (row_key.clone(), column.get(&layout.column).key());
                    let cell = match self.cells.get(&key) {
                        Some(cell) => ViewCell::data(cell.get(field).clone()),
                        None => ViewCell::missing(),
                    };
                    grid.set_cell(line, self.r + j as u32, cell);
                }

                line += 1;
            }
        }
        line
    }

    /// Footer title at column 0, spanning the row-label columns.
    fn place_title(&self, grid: &mut Grid<ViewCell>, line: u32, title: &str) {
        grid.touch_row(line);
        grid.set_cell(line, 0, ViewCell::header(title).with_col_span(self.r));
        for h in 1..self.r {
            grid.set_cell(line, h, ViewCell::spanned());
        }
    }

    fn place_column_values(&self, grid: &mut Grid<ViewCell>, line: u32, alias: &str, class: &str) {
        for (j, column) in self.results.column_results.iter().enumerate() {
            let value = ViewCell::data(column.get(alias).clone()).with_class(class);
            grid.set_cell(line, self.r + j as u32, value);
        }
    }

    /// One row per cross aggregate, then per column aggregate.
    fn build_aggregate_footers(&self, grid: &mut Grid<ViewCell>, mut line: u32) -> u32 {
        let layout = self.layout;
        let annotation_start = self.r + self.c;

        for (k, aggregate) in layout.cross_aggregate.iter().enumerate() {
            self.place_title(grid, line, &aggregate.title);
            self.place_column_values(grid, line, &aggregate.alias, "aggregate");
            let total = self.results.cross_aggregate_results.get(&aggregate.alias).clone();
            grid.set_cell(line, annotation_start + k as u32, ViewCell::data(total).with_class("aggregate"));
            line += 1;
        }

        let totals_column = annotation_start + self.a;
        for aggregate in &layout.column_aggregate {
            self.place_title(grid, line, &aggregate.title);
            self.place_column_values(grid, line, &aggregate.alias, "aggregate");
            let total = self.results.column_aggregate_results.get(&aggregate.alias).clone();
            grid.set_cell(line, totals_column, ViewCell::data(total).with_class("aggregate"));
            line += 1;
        }

        line
    }

    /// One row per cross annotation, then per column annotation. They carry
    /// per-column values only.
    fn build_annotation_footers(&self, grid: &mut Grid<ViewCell>, mut line: u32) -> u32 {
        let layout = self.layout;
        for aggregate in layout.cross_annotate.iter().chain(&layout.column_annotate) {
            self.place_title(grid, line, &aggregate.title);
            self.place_column_values(grid, line, &aggregate.alias, "annotate");
            line += 1;
        }
        line
    }

    /// Row-aggregate grand totals under their own annotation columns.
    fn build_totals_row(&self, grid: &mut Grid<ViewCell>, line: u32) {
        let layout = self.layout;
        if layout.row_aggregate.is_empty() {
            return;
        }

        self.place_title(grid, line, &self.options.totals_label);
        let start = self.r + self.c + layout.cross_aggregate.len() as u32;
        for (i, aggregate) in layout.row_aggregate.iter().enumerate() {
            let total = self.results.row_aggregate_results.get(&aggregate.alias).clone();
            grid.set_cell(line, start + i as u32, ViewCell::data(total).with_class("aggregate"));
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Runs the queries for `layout` over `queryset` and assembles the grid.
/// This is the main entry point for the calculation engine.
pub fn calculate_crosstab(
    queryset: &QuerySet<'_>,
    layout: &CrossTabLayout,
    sort: &SortState,
    params: &RequestParams,
    options: &CrossTabOptions,
) -> EngineResult<(CrossTabView, CrossTabResults)> {
    let results = assemble_queries(queryset, layout, sort)?;
    let view = CrossTabCalculator::new(layout, &results, sort, params, options).calculate();
    Ok((view, results))
}

/// Assembles a grid from results computed elsewhere.
pub fn assemble_grid(
    layout: &CrossTabLayout,
    results: &CrossTabResults,
    sort: &SortState,
    params: &RequestParams,
    options: &CrossTabOptions,
) -> CrossTabView {
    CrossTabCalculator::new(layout, results, sort, params, options).calculate()
}

/// Value stored at `(row, col)` of a flattened view, if it is a data cell.
pub fn value_at(view: &CrossTabView, row: usize, col: usize) -> Option<&CellValue> {
    view.cell(row, col).map(|c| &c.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AggregateSpec, CrossTabDefinition};
    use engine::{AggregateFn, CellKind, Database, ModelDef, Schema};

    fn sale_schema() -> Schema {
        Schema::new(vec![ModelDef::new("sale", "sale")
            .scalar("g", "group")
            .scalar("c", "column")
            .scalar("v", "value")
            .scalar("amount", "amount")])
        .unwrap()
    }

    fn rows(pairs: &[&[(&str, CellValue)]]) -> Vec<ResultRow> {
        pairs.iter().map(|row| row.iter().cloned().collect()).collect()
    }

    fn grid(layout: &CrossTabLayout, results: &CrossTabResults) -> CrossTabView {
        assemble_grid(
            layout,
            results,
            &SortState::default(),
            &RequestParams::new(),
            &CrossTabOptions::default(),
        )
    }

    #[test]
    fn test_missing_intersections() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_values = vec!["v".to_string()];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();

        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into())], &[("g", "B".into())]]),
            column_results: rows(&[&[("c", 1i64.into())], &[("c", 2i64.into())]]),
            cell_results: rows(&[&[("g", "A".into()), ("c", 1i64.into()), ("v", 10i64.into())]]),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        assert_eq!(view.width, 3);
        assert!(view.is_rectangular());
        assert_eq!(value_at(&view, 0, 1), Some(&CellValue::Integer(10)));
        assert!(view.rows[0][2].is_missing());
        assert!(view.rows[1][1].is_missing());
        assert!(view.rows[1][2].is_missing());
        assert_eq!(view.rows[0][0].text, "A");
        assert!(view.rows[0][0].span);
    }

    #[test]
    fn test_cross_aggregate_footer() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_values = vec!["v".to_string()];
        def.cross_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();

        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into()), ("amount__sum", 12i64.into())]]),
            column_results: rows(&[
                &[("c", 1i64.into()), ("amount__sum", 5i64.into())],
                &[("c", 2i64.into()), ("amount__sum", 7i64.into())],
            ]),
            cross_aggregate_results: [("amount__sum", CellValue::Integer(12))].into_iter().collect(),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        assert_eq!(view.footers().len(), 1);
        assert_eq!(view.row_texts(view.body_row_count), vec!["Amount Sum", "5", "7", "12"]);
        assert!(view.rows[1][3].has_class("aggregate"));
        // Row annotation column in the body carries the row's own total
        assert_eq!(view.rows[0][3].text, "12");
        assert!(view.rows[0][3].has_class("annotate"));
    }

    #[test]
    fn test_header_rows_and_corner() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_values = vec!["v".to_string()];
        def.row_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        def.column_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Count)];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();
        let results = CrossTabResults {
            column_results: rows(&[&[("c", 1i64.into())], &[("c", 2i64.into())]]),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        let top: Vec<&str> = view.headers[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(top, vec!["Group", "Group", "Column", "Amount Sum", "Totals"]);
        assert!(view.headers[0][1].has_class("sortable"));
        assert!(view.headers[0][2].has_class("grp-text"));
        assert_eq!(view.headers[0][2].col_span, 2);

        let second: Vec<&str> = view.headers[1].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(second, vec!["Column", "1", "2"]);

        // Corner, annotation and totals headers reach down to the last header row
        assert_eq!(view.headers[0][0].row_span, 2);
        assert_eq!(view.headers[0][3].row_span, 2);
        assert_eq!(view.headers[0][4].row_span, 2);
        assert_eq!(view.headers[0][1].row_span, 1);
        assert_eq!(view.header_widths(), vec![view.width + 1; 2]);
    }

    #[test]
    fn test_several_column_headers() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.column_headers = vec!["c".to_string(), "v".to_string()];
        def.cell_values = vec!["amount".to_string()];
        def.row_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        def.column_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();
        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into()), ("amount__sum", 4i64.into())]]),
            column_results: rows(&[
                &[("c", 1i64.into()), ("v", "x".into())],
                &[("c", 2i64.into()), ("v", "y".into())],
            ]),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        assert_eq!(view.headers.len(), 3);
        let third: Vec<&str> = view.headers[2].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(third, vec!["Value", "x", "y"]);
        assert!(view.headers[2][0].has_class("sortable"));
        assert_eq!(view.headers[2][0].col_span, 1);
        assert_eq!(view.headers[0][0].row_span, 3);
        assert_eq!(view.headers[0][3].row_span, 3);

        // R=1, C=2, A=1, totals=1
        assert_eq!(view.width, 5);
        assert_eq!(view.header_widths(), vec![6, 6, 6]);
        assert!(view.is_rectangular());
    }

    #[test]
    fn test_several_cross_aggregates() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_values = vec!["v".to_string()];
        def.cross_aggregate = vec![
            AggregateSpec::new("amount", AggregateFn::Sum),
            AggregateSpec::new("v", AggregateFn::Max),
        ];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();
        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into()), ("amount__sum", 12i64.into()), ("v__max", 3i64.into())]]),
            column_results: rows(&[
                &[("c", 1i64.into()), ("amount__sum", 5i64.into()), ("v__max", 1i64.into())],
                &[("c", 2i64.into()), ("amount__sum", 7i64.into()), ("v__max", 3i64.into())],
            ]),
            cross_aggregate_results: [("amount__sum", CellValue::Integer(12)), ("v__max", CellValue::Integer(3))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        let top: Vec<&str> = view.headers[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(top, vec!["Group", "Group", "Column", "Amount Sum", "Value Max"]);
        assert_eq!(view.width, 5);
        assert_eq!(view.rows[0][3].text, "12");
        assert_eq!(view.rows[0][4].text, "3");

        // Each footer's grand total sits under its own annotation column
        assert_eq!(view.footers().len(), 2);
        assert_eq!(view.row_texts(1), vec!["Amount Sum", "5", "7", "12", ""]);
        assert_eq!(view.row_texts(2), vec!["Value Max", "1", "3", "", "3"]);
        assert_eq!(view.rows[1][4].kind, CellKind::Blank);
        assert!(view.rows[2][4].has_class("aggregate"));
        assert!(view.is_rectangular());
    }

    #[test]
    fn test_rectangular_with_every_layer() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.row_headers = vec!["g".to_string(), "v".to_string()];
        def.cell_values = vec!["v".to_string(), "amount".to_string()];
        def.cell_annotate = vec![AggregateSpec::new("amount", AggregateFn::Count)];
        def.cross_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        def.row_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Max)];
        def.column_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Min)];
        def.cross_annotate = vec![AggregateSpec::new("amount", AggregateFn::Avg)];
        def.row_annotate = vec![AggregateSpec::new("v", AggregateFn::Count)];
        def.column_annotate = vec![AggregateSpec::new("v", AggregateFn::Max)];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();

        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into())], &[("g", "B".into())], &[("g", "C".into())]]),
            column_results: rows(&[&[("c", 1i64.into())], &[("c", 2i64.into())]]),
            row_aggregate_results: [("amount__max", CellValue::Integer(9))].into_iter().collect(),
            ..Default::default()
        };
        let view = grid(&layout, &results);

        // R=2, C=2, A=4, totals=1
        assert_eq!(view.width, 9);
        assert!(view.is_rectangular());
        // 3 groups x 3 cell fields
        assert_eq!(view.body_row_count, 9);
        // cross agg + column agg + cross annotate + column annotate + totals
        assert_eq!(view.footers().len(), 5);

        assert_eq!(view.rows[0][0].row_span, 3);
        assert_eq!(view.rows[1][0].kind, CellKind::Spanned);
        assert_eq!(view.rows[1][4].kind, CellKind::Spanned);

        let totals = view.footers().last().unwrap();
        assert_eq!(totals[0].text, "Totals");
        assert_eq!(totals[0].col_span, 2);
        assert_eq!(totals[1].kind, CellKind::Spanned);
        // R + C + |cross_aggregate| + 0
        assert_eq!(totals[5].text, "9");
        assert_eq!(totals[8].kind, CellKind::Blank);
    }

    #[test]
    fn test_duplicate_cells_last_write_wins() {
        let schema = sale_schema();
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_values = vec!["v".to_string()];
        let layout = CrossTabLayout::resolve(&schema, &def).unwrap();
        let results = CrossTabResults {
            row_results: rows(&[&[("g", "A".into())]]),
            column_results: rows(&[&[("c", 1i64.into())]]),
            cell_results: rows(&[
                &[("g", "A".into()), ("c", 1i64.into()), ("v", 1i64.into())],
                &[("g", "A".into()), ("c", 1i64.into()), ("v", 2i64.into())],
            ]),
            ..Default::default()
        };
        let view = grid(&layout, &results);
        assert_eq!(view.duplicate_cells, 1);
        assert_eq!(view.rows[0][1].text, "2");
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let mut db = Database::new(sale_schema());
        let data = [(1, "A", 1, 3), (2, "B", 2, 4), (3, "A", 2, 5), (4, "C", 1, 6)];
        for (pk, g, c, amount) in data {
            db.insert(
                "sale",
                pk,
                [
                    ("g", CellValue::from(g)),
                    ("c", CellValue::Integer(c)),
                    ("amount", CellValue::Integer(amount)),
                ],
            )
            .unwrap();
        }
        let mut def = CrossTabDefinition::new("sale", "g", "c");
        def.cell_annotate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        def.cross_aggregate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        let layout = CrossTabLayout::resolve(db.schema(), &def).unwrap();
        let qs = QuerySet::all(&db, "sale").unwrap();

        let run = || {
            let (view, _) = calculate_crosstab(
                &qs,
                &layout,
                &SortState::default(),
                &RequestParams::new(),
                &CrossTabOptions::default(),
            )
            .unwrap();
            serde_json::to_string(&view).unwrap()
        };
        assert_eq!(run(), run());

        let (view, _) = calculate_crosstab(
            &qs,
            &layout,
            &SortState::default(),
            &RequestParams::new(),
            &CrossTabOptions::default(),
        )
        .unwrap();
        assert_eq!(view.row_texts(view.body_row_count), vec!["Amount Sum", "9", "9", "18"]);
    }
}

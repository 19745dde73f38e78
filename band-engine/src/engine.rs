//! FILENAME: band-engine/src/engine.rs
//! Band Engine - Turns a band layout and a query set into a BandView.
//!
//! Key differences from the cross-tab engine:
//! - A single grouping axis; no column groups
//! - Annotations sit next to the group labels instead of in a margin
//! - Detail bands list the member objects of each group

use std::sync::Arc;

use crosstab_engine::{annotations, dereference_values};
use engine::{EngineResult, Lookup, QuerySet, ResultRow, ViewCell};

use crate::definition::{BandLayout, DetailColumns};
use crate::view::{BandAggregate, BandRow, BandView};

/// Builds the URL of an object's detail page from `(model, pk)`.
pub type DetailsUrl = Arc<dyn Fn(&str, i64) -> String + Send + Sync>;

/// What a detail band needs beyond the band layout.
pub struct DetailOptions<'a> {
    pub columns: &'a DetailColumns,
    /// Keys whose cells link to the object.
    pub link_fields: &'a [String],
    pub details_url: &'a DetailsUrl,
}

/// Calculates a plain band report.
pub fn calculate_band(queryset: &QuerySet<'_>, layout: &BandLayout) -> EngineResult<BandView> {
    BandCalculator::new(queryset, layout, None, false).calculate()
}

/// Calculates a detail band report. With `show_details` false the detail
/// rows are skipped; headers still describe the detail columns.
pub fn calculate_detail_band(
    queryset: &QuerySet<'_>,
    layout: &BandLayout,
    details: &DetailOptions<'_>,
    show_details: bool,
) -> EngineResult<BandView> {
    BandCalculator::new(queryset, layout, Some(details), show_details).calculate()
}

fn header_cells(titles: &[String]) -> Vec<ViewCell> {
    titles.iter().map(|t| ViewCell::header(t.clone())).collect()
}

// ============================================================================
// BAND CALCULATOR
// ============================================================================

struct BandCalculator<'q, 'a> {
    queryset: &'a QuerySet<'q>,
    layout: &'a BandLayout,
    details: Option<&'a DetailOptions<'a>>,
    show_details: bool,
}

impl<'q, 'a> BandCalculator<'q, 'a> {
    fn new(
        queryset: &'a QuerySet<'q>,
        layout: &'a BandLayout,
        details: Option<&'a DetailOptions<'a>>,
        show_details: bool,
    ) -> Self {
        BandCalculator {
            queryset,
            layout,
            details,
            show_details,
        }
    }

    fn calculate(&self) -> EngineResult<BandView> {
        let layout = self.layout;
        let db = self.queryset.db();

        // Step 1: One row per group
        let annotate: Vec<_> = layout.annotate.iter().collect();
        let mut results = self.queryset.values_annotate(&layout.lookups, &annotations(&annotate))?;
        dereference_values(db, &layout.model, &layout.lookups, &mut results)?;

        // Step 2: Group rows, with details if requested
        let mut rows = Vec::with_capacity(results.len());
        for values in results {
            let cells = self.group_cells(&values);
            let details = match self.details {
                Some(options) if self.show_details => self.detail_rows(&values, options)?,
                _ => Vec::new(),
            };
            rows.push(BandRow { values, cells, details });
        }

        // Step 3: Whole-report aggregates
        let aggregate: Vec<_> = layout.aggregate.iter().collect();
        let totals = self.queryset.aggregate(&annotations(&aggregate))?;
        let aggregates = layout
            .aggregate
            .iter()
            .map(|a| BandAggregate {
                alias: a.alias.clone(),
                title: a.title.clone(),
                value: totals.get(&a.alias).clone(),
            })
            .collect();

        let mut headers = vec![ViewCell::header(layout.group_title.clone()).with_col_span(layout.lookups.len() as u32)];
        headers.extend(layout.annotate.iter().map(|a| ViewCell::header(a.title.clone())));

        let detail_headers = self
            .details
            .map(|options| header_cells(options.columns.titles()))
            .unwrap_or_default();
        let detail_count = self.details.map(|options| options.columns.len()).unwrap_or(0);

        Ok(BandView {
            headers,
            detail_headers,
            result_count: rows.len(),
            rows,
            aggregates,
            header_count: layout.lookups.len() + layout.annotate.len() + detail_count,
            show_details: self.details.is_some() && self.show_details,
        })
    }

    fn group_cells(&self, values: &ResultRow) -> Vec<ViewCell> {
        let layout = self.layout;
        let mut cells: Vec<ViewCell> = layout
            .lookups
            .iter()
            .map(|lookup| ViewCell::span_header(values.get(lookup).clone()))
            .collect();
        cells.extend(
            layout
                .annotate
                .iter()
                .map(|a| ViewCell::data(values.get(&a.alias).clone()).with_class("annotate")),
        );
        cells
    }

    /// Member objects of one group: the base set narrowed to the group's
    /// lookup values.
    fn detail_rows(&self, values: &ResultRow, options: &DetailOptions<'_>) -> EngineResult<Vec<Vec<ViewCell>>> {
        let db = self.queryset.db();
        let mut members = self.queryset.clone();
        for lookup in &self.layout.lookups {
            members = members.filter(Lookup::exact(lookup, values.get(lookup).clone()));
        }

        let keys = options.columns.keys();
        let mut rows = Vec::new();
        for record in members.records()? {
            let cells = options
                .columns
                .resolve(db, record)?
                .into_iter()
                .zip(keys)
                .map(|(value, key)| {
                    let cell = ViewCell::data(value);
                    if options.link_fields.contains(key) {
                        cell.with_link((options.details_url)(&self.layout.model, record.pk))
                    } else {
                        cell
                    }
                })
                .collect();
            rows.push(cells);
        }
        Ok(rows)
    }
}

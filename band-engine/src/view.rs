//! FILENAME: band-engine/src/view.rs
//! Band View - Renderable output.
//!
//! One row per group. Detail bands carry the member objects of each group
//! as nested rows, rendered under the group row.

use serde::Serialize;

use engine::{CellValue, ResultRow, ViewCell};

// ============================================================================
// ROWS
// ============================================================================

/// One group of a band report.
#[derive(Debug, Clone, Serialize)]
pub struct BandRow {
    /// Group values and annotation aliases, as queried.
    pub values: ResultRow,

    /// Group labels followed by annotation values.
    pub cells: Vec<ViewCell>,

    /// One row per member object. Empty for plain bands or when details
    /// are hidden.
    pub details: Vec<Vec<ViewCell>>,
}

/// A whole-report aggregate shown below the band.
#[derive(Debug, Clone, Serialize)]
pub struct BandAggregate {
    pub alias: String,
    pub title: String,
    pub value: CellValue,
}

// ============================================================================
// VIEW
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BandView {
    /// Group title followed by annotation titles.
    pub headers: Vec<ViewCell>,

    /// Titles of the detail columns (detail bands only).
    pub detail_headers: Vec<ViewCell>,

    pub rows: Vec<BandRow>,

    pub aggregates: Vec<BandAggregate>,

    /// Columns a template must reserve: group lookups, annotations and
    /// detail columns.
    pub header_count: usize,

    /// Number of groups.
    pub result_count: usize,

    /// Whether detail rows were computed for this request.
    pub show_details: bool,
}

impl BandView {
    /// Display text of every group row, for quick inspection.
    pub fn row_texts(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.cells.iter().map(|c| c.text.clone()).collect())
            .collect()
    }
}

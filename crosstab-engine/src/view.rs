//! FILENAME: crosstab-engine/src/view.rs
//! Cross-tab View - Renderable output.
//!
//! Header rows are ragged (they mirror the declared headers); body and
//! footer rows are flattened from a sparse grid and all share one width.

use serde::Serialize;

use engine::ViewCell;

/// The complete rendered cross-tab grid.
#[derive(Debug, Clone, Serialize)]
pub struct CrossTabView {
    /// Header row 0 (corner, row sort headers, column label, annotation
    /// titles, totals) followed by one row per column header field.
    pub headers: Vec<Vec<ViewCell>>,

    /// Body rows followed by footer rows.
    pub rows: Vec<Vec<ViewCell>>,

    /// Number of leading entries of `rows` that are body rows.
    pub body_row_count: usize,

    /// Width of every body and footer row.
    pub width: usize,

    /// Row-label columns (R).
    pub row_label_count: usize,

    /// Column groups (C).
    pub column_count: usize,

    /// Row-annotation columns (A).
    pub annotation_width: usize,

    pub has_totals_column: bool,

    /// Number of row groups.
    pub result_count: usize,

    /// Cell rows that landed on an intersection already taken. The last
    /// one wins.
    pub duplicate_cells: usize,
}

impl CrossTabView {
    /// True when every body and footer row is exactly `width` cells wide.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.width)
    }

    /// Columns covered by each header row, counting cells spanned down from
    /// the rows above. Every entry is `width + 1`: the corner sits left of
    /// the row-label columns.
    pub fn header_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.headers.len()];
        for (i, row) in self.headers.iter().enumerate() {
            for cell in row {
                let rows = cell.row_span.max(1) as usize;
                for width in widths.iter_mut().skip(i).take(rows) {
                    *width += cell.col_span as usize;
                }
            }
        }
        widths
    }

    pub fn body(&self) -> &[Vec<ViewCell>] {
        &self.rows[..self.body_row_count]
    }

    pub fn footers(&self) -> &[Vec<ViewCell>] {
        &self.rows[self.body_row_count..]
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&ViewCell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Display text of one row, for quick inspection.
    pub fn row_texts(&self, row: usize) -> Vec<String> {
        self.rows
            .get(row)
            .map(|cells| cells.iter().map(|c| c.text.clone()).collect())
            .unwrap_or_default()
    }
}

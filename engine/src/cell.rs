//! FILENAME: engine/src/cell.rs
//! PURPOSE: Renderable cells shared by every report view.
//! CONTEXT: A view is a list of header rows and body rows of `ViewCell`s.
//! Spanned placeholders occupy positions covered by a master cell with a
//! row or column span, so flattened rows stay rectangular.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

// ============================================================================
// CELL TYPES
// ============================================================================

/// The type of a cell in a report view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Column title, row label or footer title.
    Header,
    /// A value.
    Data,
    /// Filler for layout purposes.
    Blank,
    /// A row/column intersection with no value.
    Missing,
    /// Covered by a master cell's span; not rendered.
    Spanned,
}

/// Links attached to a sortable header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortLinks {
    /// Sorts by this field, flipping the direction if already active.
    pub url_toggle: String,
    /// Clears the sort.
    pub url_remove: String,
}

// ============================================================================
// VIEW CELL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewCell {
    pub kind: CellKind,

    /// The underlying value. Header titles are `Text`.
    pub value: CellValue,

    /// Pre-formatted display string.
    pub text: String,

    pub classes: BTreeSet<String>,

    /// True for row-label cells that span the body rows of one group.
    pub span: bool,

    pub row_span: u32,
    pub col_span: u32,

    pub sort: Option<SortLinks>,

    /// Target of the cell when it renders as a link (detail columns).
    pub link: Option<String>,
}

impl ViewCell {
    fn with_kind(kind: CellKind, value: CellValue) -> Self {
        ViewCell {
            kind,
            text: value.display(),
            value,
            classes: BTreeSet::new(),
            span: false,
            row_span: 1,
            col_span: 1,
            sort: None,
            link: None,
        }
    }

    /// Creates a value cell.
    pub fn data(value: CellValue) -> Self {
        Self::with_kind(CellKind::Data, value)
    }

    /// Creates a title cell.
    pub fn header(label: impl Into<String>) -> Self {
        Self::with_kind(CellKind::Header, CellValue::Text(label.into()))
    }

    /// Creates a header showing a group value (column group labels).
    pub fn value_header(value: CellValue) -> Self {
        Self::with_kind(CellKind::Header, value)
    }

    /// Creates a row-label cell for a group value.
    pub fn span_header(value: CellValue) -> Self {
        let mut cell = Self::value_header(value);
        cell.span = true;
        cell
    }

    /// Creates a value cell that spans the body rows of one group.
    pub fn span_data(value: CellValue) -> Self {
        let mut cell = Self::data(value);
        cell.span = true;
        cell
    }

    pub fn blank() -> Self {
        Self::with_kind(CellKind::Blank, CellValue::Empty)
    }

    pub fn missing() -> Self {
        Self::with_kind(CellKind::Missing, CellValue::Empty)
    }

    pub fn spanned() -> Self {
        Self::with_kind(CellKind::Spanned, CellValue::Empty)
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.insert(class.to_string());
        self
    }

    pub fn with_row_span(mut self, rows: u32) -> Self {
        self.row_span = rows;
        self
    }

    pub fn with_col_span(mut self, cols: u32) -> Self {
        self.col_span = cols;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn is_missing(&self) -> bool {
        self.kind == CellKind::Missing
    }

    pub fn is_spanned(&self) -> bool {
        self.kind == CellKind::Spanned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let cell = ViewCell::data(CellValue::Number(2.0)).with_class("aggregate");
        assert_eq!(cell.text, "2");
        assert!(cell.has_class("aggregate"));
        assert!(!cell.span);

        let label = ViewCell::span_header(CellValue::from("North")).with_row_span(3);
        assert_eq!(label.kind, CellKind::Header);
        assert!(label.span);
        assert_eq!(label.row_span, 3);

        assert!(ViewCell::missing().is_missing());
        assert!(ViewCell::spanned().is_spanned());
    }
}

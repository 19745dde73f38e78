//! FILENAME: engine/src/header.rs
//! Sortable column headers.

use crate::cell::{SortLinks, ViewCell};
use crate::params::{ParamValue, RequestParams, SortDirection, SortState, ORDER_TYPE_VAR, ORDER_VAR};

/// Builds a header cell for `field` with toggle/remove sort links.
/// Clicking an inactive header sorts ascending; clicking the active one
/// flips the direction.
pub fn sort_header(label: &str, field: &str, sort: &SortState, params: &RequestParams) -> ViewCell {
    let active = sort.is_active(field);
    let next = if active { sort.direction.toggle() } else { SortDirection::Asc };

    let url_toggle = params.query_string(
        &[
            (ORDER_VAR, ParamValue::set(field)),
            (ORDER_TYPE_VAR, ParamValue::set(next.as_str())),
        ],
        &[],
    );
    let url_remove = params.query_string(&[(ORDER_VAR, ParamValue::Remove), (ORDER_TYPE_VAR, ParamValue::Remove)], &[]);

    let mut cell = ViewCell::header(label).with_class("sortable");
    if active {
        cell = cell.with_class("sorted").with_class(sort.direction.class_name());
    }
    cell.sort = Some(SortLinks { url_toggle, url_remove });
    cell
}

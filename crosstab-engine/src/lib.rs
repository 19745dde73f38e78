//! FILENAME: crosstab-engine/src/lib.rs
//! Cross-tab report subsystem.
//!
//! This crate computes cross-tabulated reports on top of the `engine`
//! crate's query sets.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the report IS)
//! - `resolver`: Checked layout with aliases and titles
//! - `query`: Row, column and cell queries (WHAT we fetch)
//! - `dereference`: Relation keys to objects
//! - `engine`: Grid assembly (HOW we lay it out)
//! - `view`: Renderable output (WHAT we display)

pub mod definition;
pub mod dereference;
pub mod engine;
pub mod query;
pub mod resolver;
pub mod view;

pub use definition::*;
pub use dereference::dereference_values;
pub use self::engine::{assemble_grid, calculate_crosstab, value_at, CrossTabCalculator, CrossTabOptions};
pub use query::{assemble_queries, CrossTabResults};
pub use resolver::{annotations, resolve_aggregates, resolve_titles, CrossTabLayout, ResolvedAggregate};
pub use view::CrossTabView;

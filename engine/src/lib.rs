//! FILENAME: engine/src/lib.rs
//! PURPOSE: Shared substrate for the report engines.
//! CONTEXT: Values, the relational schema and in-memory database, query
//! sets with lookups and aggregates, request parameters and the cells
//! that report views are made of.

pub mod aggregate;
pub mod cell;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod header;
pub mod lookup;
pub mod params;
pub mod query;
pub mod schema;
pub mod value;

// Re-export commonly used types at the crate root
pub use aggregate::{AggregateAccumulator, AggregateFn};
pub use cell::{CellKind, SortLinks, ViewCell};
pub use dataset::{Database, PathValues, Record};
pub use error::{EngineError, EngineResult};
pub use grid::Grid;
pub use header::sort_header;
pub use lookup::{Lookup, LookupOp, LookupValue};
pub use params::{
    ParamValue, RequestParams, SortDirection, SortState, DETAILS_VAR, GROUP_BY_VAR, IGNORED_PARAMS,
    ORDER_TYPE_VAR, ORDER_VAR,
};
pub use query::{order_rows, Annotation, GroupKey, QuerySet, ResultRow};
pub use schema::{capfirst, FieldDef, FieldKind, ModelDef, Schema, ValueType, LOOKUP_SEP, PK_FIELD};
pub use value::{CellValue, ObjectRef, OrderedFloat, ValueKey};

//! FILENAME: band-engine/src/lib.rs
//! Band report subsystem.
//!
//! This crate computes band and detail-band reports. It depends on
//! `crosstab-engine` for group-by specs, aggregate resolution and the
//! dereferencer, and on `engine` for query sets and view cells.
//!
//! Layers:
//! - `definition`: Configuration and the detail column registry
//! - `view`: Renderable output (WHAT we display)
//! - `engine`: Calculation engine (HOW we calculate)

pub mod definition;
pub mod engine;
pub mod view;

pub use definition::*;
pub use self::engine::{calculate_band, calculate_detail_band, DetailOptions, DetailsUrl};
pub use view::*;

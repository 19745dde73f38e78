//! FILENAME: reporting/src/lib.rs
// PURPOSE: Report registry, per-request report construction and page views.
// CONTEXT: Sits on top of band-engine and crosstab-engine. A host builds a
// `ReportRegistry` at start-up and calls `report_list` / `view_report`.

pub mod config;
pub mod error;
pub mod filters;
pub mod logging;
pub mod registry;
pub mod report;
pub mod views;

pub use config::ReportingSettings;
pub use error::{ReportError, ReportResult};
pub use filters::{filter_specs, has_filters, FilterChoice, FilterSpec};
pub use logging::{close_log_file, get_log_path, init_log_file, next_seq, write_log};
pub use registry::{RegisteredReport, ReportGroup, ReportRegistry};
pub use report::{
    current_month, current_year, GroupByChoice, Report, ReportContent, ReportContext, ReportDefinition, ReportKind,
};
pub use views::{report_list, view_report, ReportListPage, ReportPage, LIST_TEMPLATE};

/// Opens the configured log file, if any.
pub fn init_logging(settings: &ReportingSettings) -> ReportResult<()> {
    if let Some(path) = &settings.log_file {
        let path = init_log_file(path)?;
        log_info!("INIT", "logging to {}", path.display());
    }
    Ok(())
}

//! FILENAME: reporting/src/views.rs
// PURPOSE: Page entry points a host binds to its routes.
// CONTEXT: Both functions return serializable page data; rendering the
// named template is left to the host.

use serde::Serialize;

use engine::{Database, RequestParams};

use crate::config::ReportingSettings;
use crate::error::ReportResult;
use crate::logging::{log_enter, log_error, log_exit};
use crate::registry::{ReportGroup, ReportRegistry};
use crate::report::{Report, ReportContext};

pub const LIST_TEMPLATE: &str = "reporting/list.html";

#[derive(Debug, Clone, Serialize)]
pub struct ReportListPage<'r> {
    pub template_name: &'static str,
    pub groups: Vec<ReportGroup<'r>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub slug: String,
    pub title: String,
    pub template_name: &'static str,
    pub context: ReportContext,
}

/// Groups of registered reports, cut down to `report_list_limit` if set.
pub fn report_list<'r>(registry: &'r ReportRegistry, settings: &ReportingSettings) -> ReportListPage<'r> {
    let groups = match settings.report_list_limit {
        Some(limit) => registry.groups_limited(limit),
        None => registry.groups(),
    };
    ReportListPage {
        template_name: LIST_TEMPLATE,
        groups,
    }
}

/// Builds the report registered as `slug` for one request.
pub fn view_report(
    registry: &ReportRegistry,
    db: &Database,
    slug: &str,
    query_string: &str,
    settings: &ReportingSettings,
) -> ReportResult<ReportPage> {
    log_enter!("VIEW", "view_report", "{} {}", slug, query_string);

    let registered = registry.get_report(slug)?;
    let params = RequestParams::from_query_string(query_string);
    let page = Report::new(&registered.definition, db, params, settings).and_then(|report| {
        Ok(ReportPage {
            slug: slug.to_string(),
            title: report.title().to_string(),
            template_name: report.template_name(),
            context: report.context()?,
        })
    });

    match &page {
        Ok(page) => log_exit!("VIEW", "view_report", "{} results", page.context.result_count),
        Err(e) => log_error!("VIEW", "view_report {} failed ({}): {}", slug, e.status_code(), e),
    }
    page
}

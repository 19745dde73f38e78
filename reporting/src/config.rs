//! FILENAME: reporting/src/config.rs
//! Host-level settings for the reporting layer, loaded from JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use band_engine::DetailsUrl;
use crosstab_engine::CrossTabOptions;

use crate::error::ReportResult;

fn default_totals_label() -> String {
    "Totals".to_string()
}

fn default_all_label() -> String {
    "All".to_string()
}

fn default_details_url_template() -> String {
    "/admin/{model}/{pk}/".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingSettings {
    /// Label of the cross-tab totals column and totals row.
    #[serde(default = "default_totals_label")]
    pub totals_label: String,

    /// Label of the choice that clears a list filter.
    #[serde(default = "default_all_label")]
    pub all_label: String,

    /// Approximate number of reports shown on the report list.
    #[serde(default)]
    pub report_list_limit: Option<usize>,

    /// Object detail URL; `{model}` and `{pk}` are substituted.
    #[serde(default = "default_details_url_template")]
    pub details_url_template: String,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        ReportingSettings {
            totals_label: default_totals_label(),
            all_label: default_all_label(),
            report_list_limit: None,
            details_url_template: default_details_url_template(),
            log_file: None,
        }
    }
}

impl ReportingSettings {
    pub fn from_json_str(json: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> ReportResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn details_url(&self, model: &str, pk: i64) -> String {
        fill_details_url(&self.details_url_template, model, pk)
    }

    /// Detail URL builder handed to the band engine.
    pub fn details_url_builder(&self) -> DetailsUrl {
        let template = self.details_url_template.clone();
        Arc::new(move |model: &str, pk: i64| fill_details_url(&template, model, pk))
    }

    pub fn crosstab_options(&self) -> CrossTabOptions {
        CrossTabOptions {
            totals_label: self.totals_label.clone(),
        }
    }
}

/// Substitutes `{model}` and `{pk}` in a details URL template.
fn fill_details_url(template: &str, model: &str, pk: i64) -> String {
    template.replace("{model}", model).replace("{pk}", &pk.to_string())
}

//! FILENAME: reporting/src/report.rs
//! Report definitions and per-request report construction.
//!
//! A `ReportDefinition` is registered once and never changes. A `Report` is
//! built per request from a definition, the database and the request's
//! parameters: it picks the group-by choice, reads the sort and details
//! flags, builds the list filters and computes the view.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use band_engine::{
    calculate_band, calculate_detail_band, BandDefinition, BandView, DetailBandDefinition, DetailOptions,
};
use crosstab_engine::{calculate_crosstab, CrossTabDefinition, CrossTabLayout, CrossTabResults, CrossTabView, FieldSpec};
use engine::{
    Database, EngineError, EngineResult, Lookup, ParamValue, QuerySet, RequestParams, Schema, SortState, DETAILS_VAR,
    GROUP_BY_VAR,
};

use crate::config::ReportingSettings;
use crate::error::ReportResult;
use crate::filters::{filter_specs, has_filters, FilterSpec};
use crate::logging::{log_enter, log_exit, log_info, log_warn};

// ============================================================================
// DEFINITION
// ============================================================================

/// The kind of report, carrying its engine definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportKind {
    Band(BandDefinition),
    DetailBand(DetailBandDefinition),
    CrossGrid(CrossTabDefinition),
}

impl ReportKind {
    pub fn model(&self) -> &str {
        match self {
            ReportKind::Band(def) => &def.model,
            ReportKind::DetailBand(def) => &def.band.model,
            ReportKind::CrossGrid(def) => &def.model,
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            ReportKind::Band(_) => "reporting/band.html",
            ReportKind::DetailBand(_) => "reporting/band_details.html",
            ReportKind::CrossGrid(_) => "reporting/grid.html",
        }
    }

    /// Group-by choices a reader can switch between. Cross grids have none.
    pub fn group_by(&self) -> &[FieldSpec] {
        match self {
            ReportKind::Band(def) => &def.group_by,
            ReportKind::DetailBand(def) => &def.band.group_by,
            ReportKind::CrossGrid(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub verbose_name: String,

    pub kind: ReportKind,

    /// Lookups always applied, as `path[__op]` -> raw value.
    #[serde(default)]
    pub filter: BTreeMap<String, String>,

    /// Paths offered as list filters.
    #[serde(default)]
    pub list_filter: Vec<String>,

    /// Date path whose lookups are dropped from `queryset(false)`.
    #[serde(default)]
    pub date_hierarchy: Option<String>,

    /// Parameters of the default query string.
    #[serde(skip)]
    pub defaults: Vec<(String, ParamValue)>,
}

impl ReportDefinition {
    pub fn new(verbose_name: &str, kind: ReportKind) -> Self {
        ReportDefinition {
            verbose_name: verbose_name.to_string(),
            kind,
            filter: BTreeMap::new(),
            list_filter: Vec::new(),
            date_hierarchy: None,
            defaults: Vec::new(),
        }
    }

    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filter.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_list_filter(mut self, path: &str) -> Self {
        self.list_filter.push(path.to_string());
        self
    }

    pub fn with_date_hierarchy(mut self, path: &str) -> Self {
        self.date_hierarchy = Some(path.to_string());
        self
    }

    pub fn with_default(mut self, key: &str, value: ParamValue) -> Self {
        self.defaults.push((key.to_string(), value));
        self
    }

    /// Base model of the report.
    pub fn model(&self) -> &str {
        self.kind.model()
    }

    pub fn template_name(&self) -> &'static str {
        self.kind.template_name()
    }

    /// Checks every declared path against the schema. Errors name the
    /// offending attribute.
    pub fn validate(&self, schema: &Schema) -> EngineResult<()> {
        match &self.kind {
            ReportKind::Band(def) => def.validate(schema)?,
            ReportKind::DetailBand(def) => def.validate(schema)?,
            ReportKind::CrossGrid(def) => {
                CrossTabLayout::resolve(schema, def)?;
            }
        }

        let model = self.model();
        for path in &self.list_filter {
            schema.get_field(model, path).map_err(|e| e.in_attribute("list_filter"))?;
        }
        if let Some(path) = &self.date_hierarchy {
            schema.get_field(model, path).map_err(|e| e.in_attribute("date_hierarchy"))?;
        }
        for (key, raw) in &self.filter {
            Lookup::parse(schema, model, key, raw).map_err(|e| e.in_attribute("filter"))?;
        }
        Ok(())
    }
}

/// Current year, for computed defaults.
pub fn current_year() -> String {
    chrono::Local::now().year().to_string()
}

/// Current month (1-12), for computed defaults.
pub fn current_month() -> String {
    chrono::Local::now().month().to_string()
}

// ============================================================================
// REPORT
// ============================================================================

/// One entry of the group-by switcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByChoice {
    pub selected: bool,
    pub query_string: String,
    pub display: String,
}

/// What a report computed for this request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportContent {
    Band(BandView),
    CrossGrid { view: CrossTabView, results: CrossTabResults },
}

impl ReportContent {
    pub fn result_count(&self) -> usize {
        match self {
            ReportContent::Band(view) => view.result_count,
            ReportContent::CrossGrid { view, .. } => view.result_count,
        }
    }

    pub fn as_band(&self) -> Option<&BandView> {
        match self {
            ReportContent::Band(view) => Some(view),
            ReportContent::CrossGrid { .. } => None,
        }
    }

    pub fn as_grid(&self) -> Option<&CrossTabView> {
        match self {
            ReportContent::CrossGrid { view, .. } => Some(view),
            ReportContent::Band(_) => None,
        }
    }
}

/// Serializable page context of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub title: String,
    pub result_count: usize,
    pub group_by_choices: Vec<GroupByChoice>,
    pub filter_specs: Vec<FilterSpec>,
    pub has_filters: bool,
    pub show_details: bool,
    pub sort: SortState,
    pub default_query_string: String,
    pub content: ReportContent,
}

pub struct Report<'a> {
    definition: &'a ReportDefinition,
    db: &'a Database,
    params: RequestParams,
    sort: SortState,
    selected_group_by: usize,
    show_details: bool,
    filter_specs: Vec<FilterSpec>,
    content: ReportContent,
}

impl<'a> Report<'a> {
    pub fn new(
        definition: &'a ReportDefinition,
        db: &'a Database,
        params: RequestParams,
        settings: &ReportingSettings,
    ) -> ReportResult<Self> {
        log_enter!("REPORT", "Report::new", "{}", definition.verbose_name);

        let sort = SortState::from_params(&params);
        let selected_group_by = params
            .get(GROUP_BY_VAR)
            .and_then(|g| definition.kind.group_by().iter().position(|spec| spec.param_value() == g))
            .unwrap_or(0);
        let show_details = params.get(DETAILS_VAR) != Some("0");

        let base = base_queryset(definition, db)?;
        let filter_specs = filter_specs(&base, &definition.list_filter, &params, &settings.all_label)?;

        let queryset = build_queryset(definition, db, &params, true)?;
        let content = compute_content(definition, &queryset, &params, &sort, selected_group_by, show_details, settings)?;

        log_exit!("REPORT", "Report::new", "{} results", content.result_count());
        Ok(Report {
            definition,
            db,
            params,
            sort,
            selected_group_by,
            show_details,
            filter_specs,
            content,
        })
    }

    pub fn definition(&self) -> &ReportDefinition {
        self.definition
    }

    pub fn title(&self) -> &str {
        &self.definition.verbose_name
    }

    pub fn template_name(&self) -> &'static str {
        self.definition.template_name()
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn show_details(&self) -> bool {
        self.show_details
    }

    pub fn selected_group_by(&self) -> Option<&FieldSpec> {
        self.definition.kind.group_by().get(self.selected_group_by)
    }

    pub fn filter_specs(&self) -> &[FilterSpec] {
        &self.filter_specs
    }

    pub fn has_filters(&self) -> bool {
        has_filters(&self.filter_specs)
    }

    pub fn content(&self) -> &ReportContent {
        &self.content
    }

    pub fn result_count(&self) -> usize {
        self.content.result_count()
    }

    /// The filtered base set. With `by_date` false, lookups under the date
    /// hierarchy path are left out.
    pub fn queryset(&self, by_date: bool) -> ReportResult<QuerySet<'a>> {
        build_queryset(self.definition, self.db, &self.params, by_date)
    }

    pub fn get_query_string<K: AsRef<str>>(&self, new: &[(K, ParamValue)], remove: &[&str]) -> String {
        self.params.query_string(new, remove)
    }

    pub fn default_query_string(&self) -> String {
        self.get_query_string(&self.definition.defaults, &[])
    }

    pub fn group_by_choices(&self) -> ReportResult<Vec<GroupByChoice>> {
        let schema = self.db.schema();
        let model = self.definition.model();
        self.definition
            .kind
            .group_by()
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                Ok(GroupByChoice {
                    selected: i == self.selected_group_by,
                    query_string: self.get_query_string(&[(GROUP_BY_VAR, ParamValue::set(spec.param_value()))], &[]),
                    display: spec.title(schema, model)?,
                })
            })
            .collect()
    }

    pub fn context(&self) -> ReportResult<ReportContext> {
        Ok(ReportContext {
            title: self.definition.verbose_name.clone(),
            result_count: self.result_count(),
            group_by_choices: self.group_by_choices()?,
            filter_specs: self.filter_specs.clone(),
            has_filters: self.has_filters(),
            show_details: self.show_details,
            sort: self.sort.clone(),
            default_query_string: self.default_query_string(),
            content: self.content.clone(),
        })
    }
}

// ============================================================================
// QUERY SETS
// ============================================================================

/// All objects of the base model narrowed by the static filter only.
fn base_queryset<'a>(definition: &ReportDefinition, db: &'a Database) -> ReportResult<QuerySet<'a>> {
    let model = definition.model();
    let mut queryset = QuerySet::all(db, model)?;
    for (key, raw) in &definition.filter {
        queryset = queryset.filter(Lookup::parse(db.schema(), model, key, raw)?);
    }
    Ok(queryset)
}

fn build_queryset<'a>(
    definition: &ReportDefinition,
    db: &'a Database,
    params: &RequestParams,
    by_date: bool,
) -> ReportResult<QuerySet<'a>> {
    let model = definition.model();
    let mut queryset = base_queryset(definition, db)?;
    for (key, raw) in params.lookups() {
        let date_lookup = definition
            .date_hierarchy
            .as_deref()
            .map_or(false, |path| key.starts_with(path));
        if date_lookup && !by_date {
            continue;
        }
        queryset = queryset.filter(Lookup::parse(db.schema(), model, key, raw)?);
    }
    Ok(queryset)
}

// ============================================================================
// CONTENT
// ============================================================================

fn selected_spec(group_by: &[FieldSpec], selected: usize) -> EngineResult<&FieldSpec> {
    group_by
        .get(selected)
        .ok_or_else(|| EngineError::ImproperlyConfigured("group_by: no group-by choice declared".to_string()))
}

fn compute_content(
    definition: &ReportDefinition,
    queryset: &QuerySet<'_>,
    params: &RequestParams,
    sort: &SortState,
    selected_group_by: usize,
    show_details: bool,
    settings: &ReportingSettings,
) -> ReportResult<ReportContent> {
    let schema = queryset.db().schema();
    match &definition.kind {
        ReportKind::Band(def) => {
            let layout = def.layout(schema, selected_spec(&def.group_by, selected_group_by)?)?;
            Ok(ReportContent::Band(calculate_band(queryset, &layout)?))
        }
        ReportKind::DetailBand(def) => {
            let layout = def.band.layout(schema, selected_spec(&def.band.group_by, selected_group_by)?)?;
            let columns = def.detail_columns(schema)?;
            let details_url = settings.details_url_builder();
            let options = DetailOptions {
                columns: &columns,
                link_fields: &def.detail_link_fields,
                details_url: &details_url,
            };
            Ok(ReportContent::Band(calculate_detail_band(queryset, &layout, &options, show_details)?))
        }
        ReportKind::CrossGrid(def) => {
            let layout = CrossTabLayout::resolve(schema, def)?;
            let (view, results) = calculate_crosstab(queryset, &layout, sort, params, &settings.crosstab_options())?;

            if let Some(field) = &sort.field {
                if !results.rows_sorted && !results.columns_sorted {
                    log_info!("REPORT", "ignoring sort on '{}': not a row or column field", field);
                }
            }
            if view.duplicate_cells > 0 {
                log_warn!(
                    "REPORT",
                    "{}: {} cell rows shared an intersection; the last one was kept",
                    definition.verbose_name,
                    view.duplicate_cells
                );
            }
            Ok(ReportContent::CrossGrid { view, results })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosstab_engine::AggregateSpec;
    use engine::{AggregateFn, CellValue, ModelDef};

    fn database() -> Database {
        let schema = Schema::new(vec![
            ModelDef::new("region", "region").scalar("name", "name").display_field("name"),
            ModelDef::new("sale", "sale")
                .scalar("amount", "amount")
                .scalar("product", "product")
                .scalar("sold_on", "sold on")
                .foreign_key("region", "region", "region"),
        ])
        .unwrap();
        let mut db = Database::new(schema);
        db.insert("region", 1, [("name", CellValue::from("North"))]).unwrap();
        db.insert("region", 2, [("name", CellValue::from("South"))]).unwrap();
        let sales = [
            (1, 1, "bolt", 10, "2024-01-15"),
            (2, 1, "nut", 4, "2024-02-03"),
            (3, 2, "bolt", 7, "2025-01-20"),
        ];
        for (pk, region, product, amount, sold_on) in sales {
            let date = chrono::NaiveDate::parse_from_str(sold_on, "%Y-%m-%d").unwrap();
            db.insert(
                "sale",
                pk,
                [
                    ("region", CellValue::Integer(region)),
                    ("product", CellValue::from(product)),
                    ("amount", CellValue::Integer(amount)),
                    ("sold_on", CellValue::Date(date)),
                ],
            )
            .unwrap();
        }
        db
    }

    fn band_report() -> ReportDefinition {
        let mut band = BandDefinition::new("sale", vec![FieldSpec::single("region"), FieldSpec::single("product")]);
        band.annotate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        ReportDefinition::new("Sales by region", ReportKind::Band(band))
            .with_list_filter("product")
            .with_date_hierarchy("sold_on")
            .with_default("sold_on__year", ParamValue::Computed(current_year))
            .with_default("o", ParamValue::set("amount_sum"))
    }

    #[test]
    fn test_group_by_selection() {
        let db = database();
        let def = band_report();
        let settings = ReportingSettings::default();

        let report = Report::new(&def, &db, RequestParams::new(), &settings).unwrap();
        assert_eq!(report.selected_group_by(), Some(&FieldSpec::single("region")));
        assert_eq!(report.template_name(), "reporting/band.html");

        let params = RequestParams::from_query_string("g=product");
        let report = Report::new(&def, &db, params, &settings).unwrap();
        let choices = report.group_by_choices().unwrap();
        assert_eq!(choices.len(), 2);
        assert!(!choices[0].selected);
        assert!(choices[1].selected);
        assert_eq!(choices[0].query_string, "?g=region");
        assert_eq!(choices[1].display, "Product");
        assert_eq!(report.result_count(), 2);
    }

    #[test]
    fn test_unknown_group_by_falls_back_to_first() {
        let db = database();
        let def = band_report();
        let params = RequestParams::from_query_string("g=nope");
        let report = Report::new(&def, &db, params, &ReportingSettings::default()).unwrap();
        assert_eq!(report.selected_group_by(), Some(&FieldSpec::single("region")));
    }

    #[test]
    fn test_queryset_by_date() {
        let db = database();
        let def = band_report();
        let params = RequestParams::from_query_string("sold_on__year=2024&amount__gte=5&o=amount");
        let report = Report::new(&def, &db, params, &ReportingSettings::default()).unwrap();

        assert_eq!(report.queryset(true).unwrap().len().unwrap(), 1);
        assert_eq!(report.queryset(false).unwrap().len().unwrap(), 2);
        assert_eq!(report.sort().field.as_deref(), Some("amount"));
    }

    #[test]
    fn test_static_filter_applies() {
        let db = database();
        let def = band_report().with_filter("product", "bolt");
        let report = Report::new(&def, &db, RequestParams::new(), &ReportingSettings::default()).unwrap();
        assert_eq!(report.queryset(true).unwrap().len().unwrap(), 2);
        // Only bolts remain, so the product filter offers one value.
        assert_eq!(report.filter_specs()[0].choices.len(), 2);
    }

    #[test]
    fn test_query_strings() {
        let db = database();
        let def = band_report();
        let params = RequestParams::from_query_string("X=5&Y=2&Z=3");
        let report = Report::new(&def, &db, params, &ReportingSettings::default());
        // X, Y and Z are not fields of a sale.
        assert!(report.is_err());

        let params = RequestParams::from_query_string("product=nut&g=region");
        let report = Report::new(&def, &db, params, &ReportingSettings::default()).unwrap();
        assert_eq!(
            report.get_query_string(&[("g", ParamValue::Remove)], &["product"]),
            "?"
        );
        let expected = format!("?g=region&o=amount_sum&product=nut&sold_on__year={}", current_year());
        assert_eq!(report.default_query_string(), expected);
    }

    #[test]
    fn test_bad_lookup_value_is_rejected() {
        let db = database();
        let def = band_report();
        let params = RequestParams::from_query_string("amount__gt=lots");
        let err = Report::new(&def, &db, params, &ReportingSettings::default()).err().unwrap();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_validate_names_attribute() {
        let db = database();
        let def = band_report().with_list_filter("colour");
        match def.validate(db.schema()) {
            Err(EngineError::ImproperlyConfigured(msg)) => assert!(msg.starts_with("list_filter")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(band_report().validate(db.schema()).is_ok());
    }

    #[test]
    fn test_current_month_is_a_month() {
        let month: u32 = current_month().parse().unwrap();
        assert!((1..=12).contains(&month));
        assert!(current_year().len() >= 4);
    }

    #[test]
    fn test_cross_grid_content() {
        let db = database();
        let mut grid = CrossTabDefinition::new("sale", "region", "product");
        grid.cell_annotate = vec![AggregateSpec::new("amount", AggregateFn::Sum)];
        let def = ReportDefinition::new("Grid", ReportKind::CrossGrid(grid));
        let params = RequestParams::from_query_string("o=unknown");
        let report = Report::new(&def, &db, params, &ReportingSettings::default()).unwrap();

        assert_eq!(report.template_name(), "reporting/grid.html");
        assert!(report.group_by_choices().unwrap().is_empty());
        let view = report.content().as_grid().unwrap();
        assert_eq!(view.result_count, 2);
        assert!(view.is_rectangular());
    }
}

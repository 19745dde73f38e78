//! FILENAME: reporting/src/registry.rs
//! The set of reports a host serves, grouped for the report list.

use std::collections::BTreeMap;

use serde::Serialize;

use engine::Schema;

use crate::error::{ReportError, ReportResult};
use crate::logging::{log_error, log_info};
use crate::report::ReportDefinition;

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredReport {
    pub slug: String,
    pub group: String,
    pub definition: ReportDefinition,
}

/// A group of reports, in slug order.
#[derive(Debug, Clone, Serialize)]
pub struct ReportGroup<'r> {
    pub name: &'r str,
    pub reports: Vec<&'r RegisteredReport>,
}

/// Built at start-up, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ReportRegistry {
    schema: Schema,
    reports: BTreeMap<String, RegisteredReport>,
    groups: BTreeMap<String, Vec<String>>,
}

impl ReportRegistry {
    pub fn new(schema: &Schema) -> Self {
        ReportRegistry {
            schema: schema.clone(),
            reports: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Validates and adds a report. Slugs are unique across groups.
    pub fn register(&mut self, slug: &str, group: &str, definition: ReportDefinition) -> ReportResult<()> {
        if self.reports.contains_key(slug) {
            log_error!("REGISTRY", "'{}' is already registered", slug);
            return Err(ReportError::DuplicateReport(slug.to_string()));
        }
        if let Err(e) = definition.validate(&self.schema) {
            log_error!("REGISTRY", "'{}' rejected: {}", slug, e);
            return Err(e.into());
        }

        log_info!("REGISTRY", "registered '{}' in group '{}'", slug, group);
        self.reports.insert(
            slug.to_string(),
            RegisteredReport {
                slug: slug.to_string(),
                group: group.to_string(),
                definition,
            },
        );
        let members = self.groups.entry(group.to_string()).or_default();
        members.push(slug.to_string());
        members.sort();
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_report(&self, slug: &str) -> ReportResult<&RegisteredReport> {
        self.reports
            .get(slug)
            .ok_or_else(|| ReportError::NoSuchReport(slug.to_string()))
    }

    pub fn get_group(&self, name: &str) -> ReportResult<ReportGroup<'_>> {
        let (name, slugs) = self
            .groups
            .get_key_value(name)
            .ok_or_else(|| ReportError::NoSuchGroup(name.to_string()))?;
        Ok(self.group(name, slugs))
    }

    pub fn groups(&self) -> Vec<ReportGroup<'_>> {
        self.groups.iter().map(|(name, slugs)| self.group(name, slugs)).collect()
    }

    /// All reports, in slug order.
    pub fn reports(&self) -> impl Iterator<Item = &RegisteredReport> {
        self.reports.values()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Whole groups until the running report count exceeds `limit`. The
    /// group that crosses the limit is included.
    pub fn groups_limited(&self, limit: usize) -> Vec<ReportGroup<'_>> {
        let mut shown = 0;
        let mut out = Vec::new();
        for group in self.groups() {
            if shown > limit {
                break;
            }
            shown += group.reports.len();
            out.push(group);
        }
        out
    }

    fn group<'r>(&'r self, name: &'r str, slugs: &[String]) -> ReportGroup<'r> {
        ReportGroup {
            name,
            reports: slugs.iter().filter_map(|slug| self.reports.get(slug)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;
    use band_engine::BandDefinition;
    use crosstab_engine::FieldSpec;
    use engine::{EngineError, ModelDef};

    fn schema() -> Schema {
        Schema::new(vec![ModelDef::new("sale", "sale").scalar("product", "product")]).unwrap()
    }

    fn report(path: &str) -> ReportDefinition {
        let band = BandDefinition::new("sale", vec![FieldSpec::single(path)]);
        ReportDefinition::new("Sales", ReportKind::Band(band))
    }

    fn registry(entries: &[(&str, &str)]) -> ReportRegistry {
        let mut registry = ReportRegistry::new(&schema());
        for (slug, group) in entries {
            registry.register(slug, group, report("product")).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry(&[("b", "sales"), ("a", "sales"), ("c", "stock")]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get_report("c").unwrap().group, "stock");

        let sales = registry.get_group("sales").unwrap();
        let slugs: Vec<&str> = sales.reports.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);

        let names: Vec<&str> = registry.groups().iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["sales", "stock"]);
        let all: Vec<&str> = registry.reports().map(|r| r.slug.as_str()).collect();
        assert_eq!(all, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_entries() {
        let registry = registry(&[("a", "sales")]);
        assert!(matches!(registry.get_report("zzz"), Err(ReportError::NoSuchReport(_))));
        assert!(matches!(registry.get_group("zzz"), Err(ReportError::NoSuchGroup(_))));
    }

    #[test]
    fn test_duplicate_and_invalid_reports_are_rejected() {
        let mut registry = registry(&[("a", "sales")]);
        let dup = registry.register("a", "other", report("product")).unwrap_err();
        assert!(matches!(dup, ReportError::DuplicateReport(_)));

        let bad = registry.register("b", "sales", report("colour")).unwrap_err();
        assert!(matches!(bad, ReportError::Engine(EngineError::ImproperlyConfigured(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_groups_limited_includes_crossing_group() {
        let registry = registry(&[("a1", "a"), ("a2", "a"), ("b1", "b"), ("b2", "b"), ("c1", "c")]);
        fn names(registry: &ReportRegistry, limit: usize) -> Vec<&str> {
            registry.groups_limited(limit).iter().map(|g| g.name).collect()
        }
        assert_eq!(names(&registry, 0), vec!["a"]);
        assert_eq!(names(&registry, 2), vec!["a", "b"]);
        assert_eq!(names(&registry, 3), vec!["a", "b"]);
        assert_eq!(names(&registry, 4), vec!["a", "b", "c"]);
    }
}

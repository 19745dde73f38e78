//! FILENAME: reporting/src/filters.rs
//! List filters: one choice list per `list_filter` path, built from the
//! distinct values found in the report's base query set.

use serde::Serialize;

use engine::{CellValue, EngineResult, ParamValue, QuerySet, RequestParams, LOOKUP_SEP};

/// One entry of a filter's choice list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChoice {
    pub selected: bool,
    pub query_string: String,
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSpec {
    pub path: String,
    pub title: String,
    pub choices: Vec<FilterChoice>,
}

impl FilterSpec {
    /// Builds the spec for `path`. Returns `None` when the base set holds no
    /// value for it.
    pub fn build(
        base: &QuerySet<'_>,
        path: &str,
        params: &RequestParams,
        all_label: &str,
    ) -> EngineResult<Option<FilterSpec>> {
        let db = base.db();
        let model = base.model();
        let field = db.schema().get_field(model, path)?;
        let related = field.related_model().map(str::to_string);

        let values: Vec<CellValue> = base
            .distinct_values(path)?
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Ok(None);
        }

        let exact_key = format!("{}{}exact", path, LOOKUP_SEP);
        let active = params.get(&exact_key).or_else(|| params.get(path));
        let remove = [path];

        let mut choices = Vec::with_capacity(values.len() + 1);
        choices.push(FilterChoice {
            selected: !params.iter().any(|(key, _)| key.starts_with(path)),
            query_string: params.query_string::<&str>(&[], &remove),
            display: all_label.to_string(),
        });

        for value in values {
            let value = match (&related, value.as_pk()) {
                (Some(related), Some(pk)) => CellValue::Object(db.object_ref(related, pk)?),
                (_, _) => value,
            };
            let key = param_text(&value);
            choices.push(FilterChoice {
                selected: active == Some(key.as_str()),
                query_string: params.query_string(&[(exact_key.as_str(), ParamValue::set(key.clone()))], &remove),
                display: value.display(),
            });
        }

        Ok(Some(FilterSpec {
            path: path.to_string(),
            title: db.schema().title_for_path(model, path)?,
            choices,
        }))
    }

    pub fn selected(&self) -> Option<&FilterChoice> {
        self.choices.iter().find(|c| c.selected)
    }
}

/// Filter specs for every path that has values.
pub fn filter_specs(
    base: &QuerySet<'_>,
    paths: &[String],
    params: &RequestParams,
    all_label: &str,
) -> EngineResult<Vec<FilterSpec>> {
    let mut specs = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(spec) = FilterSpec::build(base, path, params, all_label)? {
            specs.push(spec);
        }
    }
    Ok(specs)
}

pub fn has_filters(specs: &[FilterSpec]) -> bool {
    !specs.is_empty()
}

/// Text a value takes in a query string. Objects are referenced by key.
fn param_text(value: &CellValue) -> String {
    match value {
        CellValue::Object(obj) => obj.pk.to_string(),
        other => other.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{Database, ModelDef, Schema};

    fn database() -> Database {
        let schema = Schema::new(vec![
            ModelDef::new("customer", "customer").scalar("name", "name").display_field("name"),
            ModelDef::new("order", "order")
                .scalar("status", "status")
                .scalar("note", "note")
                .foreign_key("customer", "customer", "customer"),
        ])
        .unwrap();
        let mut db = Database::new(schema);
        db.insert("customer", 1, [("name", CellValue::from("ACME"))]).unwrap();
        db.insert("customer", 2, [("name", CellValue::from("Initech"))]).unwrap();
        for (pk, customer, status) in [(10, 1, "open"), (11, 2, "closed"), (12, 1, "open")] {
            db.insert(
                "order",
                pk,
                [("customer", CellValue::Integer(customer)), ("status", CellValue::from(status))],
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_choices_for_scalar_path() {
        let db = database();
        let qs = QuerySet::all(&db, "order").unwrap();
        let params = RequestParams::from_query_string("g=status&status__exact=open");
        let spec = FilterSpec::build(&qs, "status", &params, "All").unwrap().unwrap();

        assert_eq!(spec.title, "Status");
        let displays: Vec<&str> = spec.choices.iter().map(|c| c.display.as_str()).collect();
        assert_eq!(displays, vec!["All", "closed", "open"]);
        assert_eq!(spec.choices[0].query_string, "?g=status");
        assert!(!spec.choices[0].selected);
        assert_eq!(spec.choices[1].query_string, "?g=status&status__exact=closed");
        assert_eq!(spec.selected().map(|c| c.display.as_str()), Some("open"));
    }

    #[test]
    fn test_relation_choices_are_dereferenced() {
        let db = database();
        let qs = QuerySet::all(&db, "order").unwrap();
        let spec = FilterSpec::build(&qs, "customer", &RequestParams::new(), "Any").unwrap().unwrap();

        assert_eq!(spec.choices[0].display, "Any");
        assert!(spec.choices[0].selected);
        assert_eq!(spec.choices[1].display, "ACME");
        assert_eq!(spec.choices[1].query_string, "?customer__exact=1");
        assert_eq!(spec.choices[2].display, "Initech");
    }

    #[test]
    fn test_paths_without_values_are_dropped() {
        let db = database();
        let qs = QuerySet::all(&db, "order").unwrap();
        let paths = vec!["note".to_string(), "status".to_string()];
        let specs = filter_specs(&qs, &paths, &RequestParams::new(), "All").unwrap();
        assert_eq!(specs.len(), 1);
        assert!(has_filters(&specs));
        assert!(!has_filters(&[]));
    }
}

//! FILENAME: engine/src/params.rs
//! Request parameters, sort state and the query-string builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Selected group-by choice.
pub const GROUP_BY_VAR: &str = "g";
/// Active sort field.
pub const ORDER_VAR: &str = "o";
/// Sort direction, `asc` or `desc`.
pub const ORDER_TYPE_VAR: &str = "ot";
/// Details visibility; `0` hides detail rows.
pub const DETAILS_VAR: &str = "d";

/// Parameters that never become filter lookups.
pub const IGNORED_PARAMS: [&str; 4] = [GROUP_BY_VAR, ORDER_VAR, ORDER_TYPE_VAR, DETAILS_VAR];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything but `desc` reads as ascending.
    pub fn parse(s: &str) -> Self {
        if s == "desc" {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// CSS class of a sorted header.
    pub fn class_name(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ascending",
            SortDirection::Desc => "descending",
        }
    }
}

/// At most one field is sorted at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn from_params(params: &RequestParams) -> Self {
        SortState {
            field: params.get(ORDER_VAR).filter(|f| !f.is_empty()).map(str::to_string),
            direction: params.get(ORDER_TYPE_VAR).map(SortDirection::parse).unwrap_or_default(),
        }
    }

    pub fn is_active(&self, field: &str) -> bool {
        self.field.as_deref() == Some(field)
    }
}

/// Instruction for one key of a rebuilt query string.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Set(String),
    Remove,
    /// Evaluated when the query string is built (e.g. the current year).
    Computed(fn() -> String),
}

impl ParamValue {
    pub fn set(value: impl Into<String>) -> Self {
        ParamValue::Set(value.into())
    }
}

/// Parsed query string. Keys are unique; the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `a=1&b=x%20y`, with or without a leading `?`. `+` is a space.
    /// Pairs that do not decode are skipped.
    pub fn from_query_string(qs: &str) -> Self {
        let qs = qs.strip_prefix('?').unwrap_or(qs);
        let mut params = BTreeMap::new();
        for pair in qs.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode(key), decode(value)) else {
                continue;
            };
            params.insert(key, value);
        }
        RequestParams(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters that are filter lookups: everything except `g`/`o`/`ot`/`d`.
    pub fn lookups(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !IGNORED_PARAMS.contains(k))
    }

    /// Rebuilds the query string. Keys starting with any prefix in `remove`
    /// are dropped first, then `new` is applied. Keys come out sorted and
    /// URL-encoded behind a leading `?`.
    pub fn query_string<K: AsRef<str>>(&self, new: &[(K, ParamValue)], remove: &[&str]) -> String {
        let mut params = self.0.clone();
        params.retain(|key, _| !remove.iter().any(|prefix| key.starts_with(prefix)));

        for (key, value) in new {
            let key = key.as_ref();
            match value {
                ParamValue::Set(v) => {
                    params.insert(key.to_string(), v.clone());
                }
                ParamValue::Computed(f) => {
                    params.insert(key.to_string(), f());
                }
                ParamValue::Remove => {
                    params.remove(key);
                }
            }
        }

        let encoded: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("?{}", encoded.join("&"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RequestParams(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn decode(s: &str) -> Option<String> {
    urlencoding::decode(&s.replace('+', " ")).ok().map(|c| c.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_then_set() {
        let params = RequestParams::from_query_string("X=5&Y=2&Z=3");
        let qs = params.query_string(&[("Y", ParamValue::set("1"))], &["X"]);
        assert_eq!(qs, "?Y=1&Z=3");
    }

    #[test]
    fn test_remove_by_prefix_and_explicit_remove() {
        let params = RequestParams::from_query_string("?status__exact=open&status__in=a&o=amount&g=x");
        let qs = params.query_string(&[("o", ParamValue::Remove)], &["status"]);
        assert_eq!(qs, "?g=x");
        assert_eq!(params.query_string::<&str>(&[], &["g", "o", "status"]), "?");
    }

    #[test]
    fn test_computed_and_encoded_values() {
        fn year() -> String {
            "2024".to_string()
        }
        let params = RequestParams::new();
        let qs = params.query_string(
            &[("created__year", ParamValue::Computed(year)), ("name", ParamValue::set("a b&c"))],
            &[],
        );
        assert_eq!(qs, "?created__year=2024&name=a%20b%26c");
    }

    #[test]
    fn test_decoding_and_lookups() {
        let params = RequestParams::from_query_string("name=a+b%21&o=name&ot=desc&d=0");
        assert_eq!(params.get("name"), Some("a b!"));
        let lookups: Vec<_> = params.lookups().collect();
        assert_eq!(lookups, vec![("name", "a b!")]);

        let sort = SortState::from_params(&params);
        assert!(sort.is_active("name"));
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn test_double_toggle_is_identity() {
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            assert_eq!(direction.toggle().toggle(), direction);
        }
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
    }
}

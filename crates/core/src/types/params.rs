use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Query parameters with every value already coerced to its string form.
///
/// Entries are kept sorted by key, so two parameter sets built in different
/// insertion orders compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Build params from a JSON object; `None` for anything else
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self(
            object
                .iter()
                .map(|(key, value)| (key.clone(), coerce_value(value)))
                .collect(),
        ))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries in canonical (lexicographic key) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` serialization in canonical order
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// String form of a JSON value as a query parameter
fn coerce_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => coerce_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integral floats print without a fractional part
fn coerce_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = QueryParams::new().with("b", 2).with("a", 1);
        let b = QueryParams::new().with("a", 1).with("b", 2);
        assert_eq!(a, b);
        assert_eq!(a.to_query_string(), "a=1&b=2");
    }

    #[test]
    fn test_from_json_coerces_values() {
        let params = QueryParams::from_json(&json!({
            "page": 2,
            "ratio": 1.0,
            "half": 0.5,
            "active": true,
            "missing": null,
            "tags": ["x", 1, null],
            "nested": {"a": 1},
            "q": "rust lang"
        }))
        .unwrap();

        assert_eq!(params.get("page"), Some("2"));
        assert_eq!(params.get("ratio"), Some("1"));
        assert_eq!(params.get("half"), Some("0.5"));
        assert_eq!(params.get("active"), Some("true"));
        assert_eq!(params.get("missing"), Some("null"));
        assert_eq!(params.get("tags"), Some("x,1,"));
        assert_eq!(params.get("nested"), Some("[object Object]"));
        assert_eq!(params.get("q"), Some("rust lang"));
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(QueryParams::from_json(&json!([1, 2])).is_none());
        assert!(QueryParams::from_json(&json!("a=1")).is_none());
    }

    #[test]
    fn test_query_string_is_form_encoded() {
        let params = QueryParams::new().with("q", "rust lang").with("sym", "a&b=c");
        assert_eq!(params.to_query_string(), "q=rust+lang&sym=a%26b%3Dc");
    }

    #[test]
    fn test_later_insert_wins() {
        let params = QueryParams::new().with("a", 1).with("a", 2);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("a"), Some("2"));
    }
}

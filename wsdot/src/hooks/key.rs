//! Cache keys.

use std::fmt;

use serde_json::Value;

/// Identity of one cached query: `(api, function, input)`.
///
/// The input is stored as canonical JSON with object keys sorted at every
/// depth, so two inputs that differ only in key order share a key.
///
/// ## Examples
///
/// ```
/// use serde_json::json;
/// use wsdot::hooks::QueryKey;
///
/// let a = QueryKey::new("wsf-vessels", "vesselLocations", &json!({"b": 1, "a": 2}));
/// let b = QueryKey::new("wsf-vessels", "vesselLocations", &json!({"a": 2, "b": 1}));
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), r#"wsf-vessels/vesselLocations/{"a":2,"b":1}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    api: String,
    function_name: String,
    input: String,
}

impl QueryKey {
    /// Creates a key from its three components.
    pub fn new(api: impl Into<String>, function_name: impl Into<String>, input: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(input, &mut canonical);
        Self {
            api: api.into(),
            function_name: function_name.into(),
            input: canonical,
        }
    }

    /// The API name component.
    pub fn api(&self) -> &str {
        &self.api
    }

    /// The function name component.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// The canonical input JSON.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.api, self.function_name, self.input)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

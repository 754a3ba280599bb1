//! Request URL construction.
//!
//! A validated input becomes [`InputParams`]; [`build`] substitutes the
//! template tokens (`{VesselID}`) and appends every remaining parameter as a
//! query pair, in key order. The same params always produce the same URL.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Number, Value};
use url::Url;
use wsdot_define::{Shape, TemplatePart, parse_template};

use crate::date;
use crate::error::{ValidationError, ValidationIssue, ValidationStage};

/// Characters left alone inside a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One scalar request parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Text, substituted as-is (then percent-encoded).
    Str(String),
    /// Any JSON number, rendered with its JSON text.
    Number(Number),
    /// `true` or `false`.
    Bool(bool),
    /// An instant, rendered as a `/Date(ms)/` literal.
    Date(DateTime<Utc>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(d) => f.write_str(&date::encode(*d)),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

macro_rules! number_param {
    ($($ty:ty),+) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                Self::Number(value.into())
            }
        })+
    };
}

number_param!(i32, i64, u32, u64);

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Named, ordered request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputParams {
    params: BTreeMap<String, ParamValue>,
}

impl InputParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a validated input object.
    ///
    /// `null` members are dropped. String members whose field is a date
    /// shape are decoded so they render as date literals.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::Schema`] if `value` is not an object (or
    /// `null`), or if a member is an array or object.
    pub fn from_value(shape: &Shape, value: &Value) -> Result<Self, ValidationError> {
        let map = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(map) => map,
            _ => {
                return Err(ValidationError::single(
                    ValidationStage::Input,
                    "$",
                    "input must be an object",
                ));
            }
        };

        let mut params = Self::new();
        let mut issues = Vec::new();
        for (name, member) in map {
            let is_date = shape
                .field(name)
                .is_some_and(|f| matches!(f.shape.inner(), Shape::Date));
            let param = match member {
                Value::Null => continue,
                Value::String(s) if is_date => ParamValue::Date(date::decode(s)?),
                Value::String(s) => ParamValue::Str(s.clone()),
                Value::Number(n) => ParamValue::Number(n.clone()),
                Value::Bool(b) => ParamValue::Bool(*b),
                Value::Array(_) | Value::Object(_) => {
                    issues.push(ValidationIssue::new(
                        format!("$.{name}"),
                        "not representable as a URL parameter",
                    ));
                    continue;
                }
            };
            params.insert(name.clone(), param);
        }

        if issues.is_empty() {
            Ok(params)
        } else {
            Err(ValidationError::Schema {
                stage: ValidationStage::Input,
                issues,
            })
        }
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    /// Looks up a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` when there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Expands `template` against `base_url` and `params`.
///
/// ## Errors
///
/// - [`ValidationError::Descriptor`] for a malformed template
/// - [`ValidationError::MissingPathParam`] when a token has no value
/// - [`ValidationError::InvalidUrl`] when the result does not parse
///
/// ## Examples
///
/// ```
/// use wsdot::url_builder::{InputParams, build};
///
/// let mut params = InputParams::new();
/// params.insert("VesselID", 74);
/// let url = build("https://example.test/rest", "/vesselBasics/{VesselID}", &params).unwrap();
/// assert_eq!(url.as_str(), "https://example.test/rest/vesselBasics/74");
/// ```
pub fn build(base_url: &str, template: &str, params: &InputParams) -> Result<Url, ValidationError> {
    let mut path = String::with_capacity(template.len());
    let mut consumed = Vec::new();

    for part in parse_template(template)? {
        match part {
            TemplatePart::Literal(text) => path.push_str(text),
            TemplatePart::Param(name) => {
                let value = params
                    .get(name)
                    .ok_or_else(|| ValidationError::MissingPathParam {
                        param: name.to_string(),
                        template: template.to_string(),
                    })?;
                path.extend(utf8_percent_encode(&value.to_string(), PATH_SEGMENT));
                consumed.push(name);
            }
        }
    }

    let full = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&full).map_err(|source| ValidationError::InvalidUrl {
        url: full.clone(),
        source,
    })?;

    let mut remaining = params
        .iter()
        .filter(|(name, _)| !consumed.contains(name))
        .peekable();
    if remaining.peek().is_some() {
        let mut query = url.query_pairs_mut();
        for (name, value) in remaining {
            query.append_pair(name, &value.to_string());
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use wsdot_define::Field;

    const BASE: &str = "https://www.wsdot.wa.gov/ferries/api/vessels/rest";

    fn params(pairs: &[(&str, ParamValue)]) -> InputParams {
        let mut p = InputParams::new();
        for (k, v) in pairs {
            p.insert(*k, v.clone());
        }
        p
    }

    #[test]
    fn substitutes_path_token() {
        let url = build(BASE, "/vesselBasics/{VesselID}", &params(&[("VesselID", 74.into())])).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.wsdot.wa.gov/ferries/api/vessels/rest/vesselBasics/74"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let url = build("https://example.test/rest/", "/a", &InputParams::new()).unwrap();
        assert_eq!(url.as_str(), "https://example.test/rest/a");
    }

    #[test]
    fn leftover_params_become_sorted_query() {
        let p = params(&[
            ("TerminalID", 7.into()),
            ("Route", "sea-bi".into()),
            ("OnlyActive", true.into()),
        ]);
        let url = build("https://example.test/rest", "/schedule/{TerminalID}", &p).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/rest/schedule/7?OnlyActive=true&Route=sea-bi"
        );
    }

    #[test]
    fn no_params_means_no_query() {
        let url = build("https://example.test/rest", "/vessels", &InputParams::new()).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn tokens_are_percent_encoded() {
        let p = params(&[("Name", "Walla Walla/II".into())]);
        let url = build("https://example.test/rest", "/byName/{Name}", &p).unwrap();
        assert_eq!(url.path(), "/rest/byName/Walla%20Walla%2FII");
    }

    #[test]
    fn dates_render_as_literals() {
        let d = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let p = params(&[("TripDate", d.into()), ("Since", d.into())]);
        let url = build("https://example.test/rest", "/schedule/{TripDate}", &p).unwrap();
        assert_eq!(url.path(), "/rest/schedule/%2FDate%281700000000000%29%2F");
        assert_eq!(url.query(), Some("Since=%2FDate%281700000000000%29%2F"));
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = build(BASE, "/vesselBasics/{VesselID}", &InputParams::new()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingPathParam { ref param, .. } if param == "VesselID"));
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_template_is_reported() {
        let err = build(BASE, "/vesselBasics/{VesselID", &InputParams::new()).unwrap_err();
        assert!(matches!(err, ValidationError::Descriptor(_)));
    }

    #[test]
    fn from_value_drops_nulls_and_decodes_dates() {
        let shape = Shape::object([
            Field::new("TripDate", Shape::Date),
            Field::new("VesselID", Shape::Integer).nullable(),
        ]);
        let p = InputParams::from_value(
            &shape,
            &json!({"TripDate": "2023-11-14T22:13:20.000Z", "VesselID": null}),
        )
        .unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(
            p.get("TripDate").unwrap().to_string(),
            "/Date(1700000000000)/"
        );
    }

    #[test]
    fn from_value_rejects_nested_values() {
        let err = InputParams::from_value(&Shape::Any, &json!({"Ids": [1, 2]})).unwrap_err();
        assert_eq!(err.issues()[0].path, "$.Ids");
    }

    #[test]
    fn from_value_accepts_null_input() {
        assert!(InputParams::from_value(&Shape::Any, &Value::Null).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn same_params_same_url(
            id in any::<i64>(),
            name in "[ -~]{0,16}",
            flag in any::<bool>(),
        ) {
            let build_once = || {
                let mut p = InputParams::new();
                p.insert("Flag", flag);
                p.insert("Name", name.clone());
                p.insert("Id", id);
                build("https://example.test/rest", "/items/{Id}", &p).unwrap()
            };
            prop_assert_eq!(build_once(), build_once());
        }
    }
}

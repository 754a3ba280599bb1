//! Schema validation gate.
//!
//! Every value entering or leaving the pipeline passes through a
//! [`SchemaGate`]: caller input before the URL is built, and the response
//! body after transport. Validation is two passes:
//!
//! 1. Walk the raw JSON against its [`Shape`], collecting every mismatch with
//!    its JSON path and rewriting date leaves into canonical RFC 3339.
//! 2. Deserialize the coerced JSON into the Rust type with serde.
//!
//! Both passes recurse uniformly through arrays and nested objects.

use std::marker::PhantomData;

use serde_json::{Map, Value};
use wsdot_define::{Schema, Shape};

use crate::date;
use crate::error::{ApiError, RequestError, ValidationError, ValidationIssue, ValidationStage};

/// Outcome of [`SchemaGate::safe_parse`].
#[derive(Debug)]
pub enum SafeParse<T> {
    /// The value matched and was converted.
    Success(T),
    /// The value did not match.
    Failure(ValidationError),
}

impl<T> SafeParse<T> {
    /// Returns `true` on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the value, discarding any error.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<T, ValidationError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Validates raw JSON against a shape and converts it into `T`.
///
/// ## Examples
///
/// ```
/// use serde_json::json;
/// use wsdot::schema::SchemaGate;
///
/// let gate = SchemaGate::<Vec<i64>>::output();
/// assert_eq!(gate.parse(&json!([1, 2, 3])).unwrap(), vec![1, 2, 3]);
/// assert!(!gate.safe_parse(&json!(["x"])).is_success());
/// ```
#[derive(Debug)]
pub struct SchemaGate<T> {
    shape: Shape,
    stage: ValidationStage,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for SchemaGate<T> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            stage: self.stage,
            _type: PhantomData,
        }
    }
}

impl<T: Schema> SchemaGate<T> {
    /// Gate for caller input, using `T`'s own shape.
    pub fn input() -> Self {
        Self::with_shape(T::shape(), ValidationStage::Input)
    }

    /// Gate for response payloads, using `T`'s own shape.
    pub fn output() -> Self {
        Self::with_shape(T::shape(), ValidationStage::Output)
    }
}

impl<T: serde::de::DeserializeOwned> SchemaGate<T> {
    /// Gate with an explicit shape.
    ///
    /// Used by dynamic endpoints, where `T` is `serde_json::Value` and the
    /// descriptor's shape carries all the structure.
    pub fn with_shape(shape: Shape, stage: ValidationStage) -> Self {
        Self {
            shape,
            stage,
            _type: PhantomData,
        }
    }

    /// Returns the shape this gate checks against.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the pipeline side this gate guards.
    pub fn stage(&self) -> ValidationStage {
        self.stage
    }

    /// Runs the first pass only: returns the coerced JSON.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::Schema`] listing every mismatch.
    pub fn coerce(&self, value: &Value) -> Result<Value, ValidationError> {
        coerce(&self.shape, value, self.stage)
    }

    /// Runs both passes.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError::Schema`] for shape mismatches and for serde
    /// failures (reported at `$`).
    pub fn validate(&self, value: &Value) -> Result<T, ValidationError> {
        let coerced = self.coerce(value)?;
        serde_json::from_value(coerced)
            .map_err(|e| ValidationError::single(self.stage, "$", e.to_string()))
    }

    /// Runs both passes and classifies failures for the pipeline.
    ///
    /// On the output side, a payload that fails validation but looks like an
    /// echoed service error becomes [`RequestError::Api`].
    ///
    /// ## Errors
    ///
    /// Returns `API_ERROR` or `VALIDATION_ERROR` as described above.
    pub fn parse(&self, value: &Value) -> Result<T, RequestError> {
        self.validate(value).map_err(|err| match self.stage {
            ValidationStage::Output => match ApiError::from_payload(value) {
                Some(api) => api.into(),
                None => err.into(),
            },
            ValidationStage::Input => err.into(),
        })
    }

    /// Runs both passes without producing a pipeline error.
    pub fn safe_parse(&self, value: &Value) -> SafeParse<T> {
        match self.validate(value) {
            Ok(parsed) => SafeParse::Success(parsed),
            Err(err) => SafeParse::Failure(err),
        }
    }
}

/// Walks `value` against `shape`, returning the coerced value.
///
/// Date leaves are decoded with [`date::decode`] and rewritten as
/// [`date::to_canonical`]. Keys not named by an object shape are preserved.
///
/// ## Errors
///
/// Returns [`ValidationError::Schema`] with one issue per mismatch.
pub fn coerce(shape: &Shape, value: &Value, stage: ValidationStage) -> Result<Value, ValidationError> {
    let mut issues = Vec::new();
    let coerced = walk(shape, value, "$", &mut issues);
    if issues.is_empty() {
        Ok(coerced)
    } else {
        Err(ValidationError::Schema { stage, issues })
    }
}

fn walk(shape: &Shape, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Value {
    match (shape, value) {
        (Shape::Any, _) => value.clone(),
        (Shape::Optional(inner), _) => walk(inner, value, path, issues),
        (Shape::Nullable(_), Value::Null) => Value::Null,
        (Shape::Nullable(inner), _) => walk(inner, value, path, issues),

        (Shape::String, Value::String(_))
        | (Shape::Number, Value::Number(_))
        | (Shape::Boolean, Value::Bool(_)) => value.clone(),

        (Shape::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                value.clone()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
                    _ => mismatch(shape, value, path, issues),
                }
            }
        }

        (Shape::Date, Value::String(s)) => match date::decode(s) {
            Ok(d) => Value::String(date::to_canonical(d)),
            Err(_) => {
                issues.push(ValidationIssue::new(path, format!("invalid date {s:?}")));
                value.clone()
            }
        },

        (Shape::Array(element), Value::Array(items)) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| walk(element, item, &format!("{path}[{i}]"), issues))
                .collect(),
        ),

        (Shape::Object(fields), Value::Object(map)) => {
            let mut out: Map<String, Value> = map.clone();
            for field in fields {
                let field_path = format!("{path}.{}", field.name);
                match map.get(&field.name) {
                    Some(v) => {
                        out.insert(field.name.clone(), walk(&field.shape, v, &field_path, issues));
                    }
                    None if field.shape.is_optional() => {}
                    None => issues.push(ValidationIssue::new(field_path, "required field missing")),
                }
            }
            Value::Object(out)
        }

        _ => mismatch(shape, value, path, issues),
    }
}

fn mismatch(shape: &Shape, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Value {
    issues.push(ValidationIssue::new(
        path,
        format!("expected {}, got {}", shape.describe(), json_type(value)),
    ));
    value.clone()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

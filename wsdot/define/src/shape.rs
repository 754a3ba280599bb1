//! Runtime schema descriptors.
//!
//! A [`Shape`] describes the JSON structure an endpoint accepts or returns.
//! Unlike the Rust type alone, a shape knows which leaves carry dates in the
//! services' legacy date-literal encoding, which keys may be absent and which
//! values may be null. The runtime validation gate walks values against a
//! shape before handing them to serde.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Structure of a JSON value.
///
/// ## Examples
///
/// ```
/// use wsdot_define::{Field, Shape};
///
/// let vessel = Shape::object([
///     Field::new("VesselID", Shape::Integer),
///     Field::new("VesselName", Shape::String.nullable()),
///     Field::new("YearBuilt", Shape::Integer).optional(),
/// ]);
///
/// assert!(vessel.field("VesselName").unwrap().shape.accepts_null());
/// assert!(vessel.field("YearBuilt").unwrap().shape.is_optional());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A JSON string.
    String,
    /// A JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A date literal (`/Date(ms±zzzz)/`) or ISO-8601 string.
    Date,
    /// Any value; passed through unchecked.
    Any,
    /// A homogeneous array.
    Array(Box<Shape>),
    /// An object with named fields. Unlisted keys are ignored.
    Object(Vec<Field>),
    /// The key may be absent from its parent object.
    Optional(Box<Shape>),
    /// The value may be `null`.
    Nullable(Box<Shape>),
}

impl Shape {
    /// Creates an object shape from its fields.
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// Creates an array shape with the given element shape.
    pub fn array(element: Shape) -> Self {
        Self::Array(Box::new(element))
    }

    /// Marks this shape as allowed to be absent from its parent object.
    pub fn optional(self) -> Self {
        match self {
            Self::Optional(_) => self,
            other => Self::Optional(Box::new(other)),
        }
    }

    /// Marks this shape as allowed to be `null`.
    pub fn nullable(self) -> Self {
        match self {
            Self::Nullable(_) => self,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// Returns `true` if a key with this shape may be missing.
    pub fn is_optional(&self) -> bool {
        match self {
            Self::Optional(_) | Self::Any => true,
            Self::Nullable(inner) => inner.is_optional(),
            _ => false,
        }
    }

    /// Returns `true` if `null` is an acceptable value.
    pub fn accepts_null(&self) -> bool {
        match self {
            Self::Nullable(_) | Self::Any => true,
            Self::Optional(inner) => inner.accepts_null(),
            _ => false,
        }
    }

    /// Strips `Optional`/`Nullable` wrappers.
    pub fn inner(&self) -> &Shape {
        match self {
            Self::Optional(inner) | Self::Nullable(inner) => inner.inner(),
            other => other,
        }
    }

    /// Returns the fields of an object shape (after stripping modifiers).
    pub fn fields(&self) -> &[Field] {
        match self.inner() {
            Self::Object(fields) => fields,
            _ => &[],
        }
    }

    /// Looks up an object field by exact name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Returns the value used when a caller omits input entirely.
    ///
    /// Objects whose fields are all optional default to `{}`; nullable
    /// shapes default to `null`. Anything else has no default.
    pub fn default_value(&self) -> Option<serde_json::Value> {
        match self {
            Self::Any | Self::Nullable(_) => Some(serde_json::Value::Null),
            Self::Optional(inner) => inner.default_value(),
            Self::Object(fields) if fields.iter().all(|f| f.shape.is_optional()) => {
                Some(serde_json::Value::Object(serde_json::Map::new()))
            }
            _ => None,
        }
    }

    /// Short human-readable name used in validation messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Any => "any",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Optional(inner) | Self::Nullable(inner) => inner.describe(),
        }
    }
}

/// A named member of an object [`Shape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Exact JSON key (case-sensitive).
    pub name: String,
    /// Shape of the value under this key.
    pub shape: Shape,
}

impl Field {
    /// Creates a required field.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Makes the field optional (may be absent).
    pub fn optional(mut self) -> Self {
        self.shape = self.shape.optional();
        self
    }

    /// Makes the field nullable (may be `null`).
    pub fn nullable(mut self) -> Self {
        self.shape = self.shape.nullable();
        self
    }
}

/// A Rust type with a runtime [`Shape`].
///
/// Implemented by every endpoint input and output type. The runtime gate
/// validates raw JSON against [`Schema::shape`] and then deserializes it
/// into `Self`.
pub trait Schema: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the shape describing this type's JSON form.
    fn shape() -> Shape;
}

/// Input type for endpoints that take no parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoInput {}

impl Schema for NoInput {
    fn shape() -> Shape {
        Shape::Object(Vec::new())
    }
}

impl<T: Schema> Schema for Vec<T> {
    fn shape() -> Shape {
        Shape::array(T::shape())
    }
}

impl<T: Schema> Schema for Option<T> {
    fn shape() -> Shape {
        T::shape().nullable()
    }
}

impl Schema for DateTime<Utc> {
    fn shape() -> Shape {
        Shape::Date
    }
}

impl Schema for serde_json::Value {
    fn shape() -> Shape {
        Shape::Any
    }
}

macro_rules! leaf_schema {
    ($shape:ident => $($ty:ty),+) => {
        $(impl Schema for $ty {
            fn shape() -> Shape {
                Shape::$shape
            }
        })+
    };
}

leaf_schema!(String => String);
leaf_schema!(Boolean => bool);
leaf_schema!(Integer => i32, i64, u32, u64);
leaf_schema!(Number => f64);

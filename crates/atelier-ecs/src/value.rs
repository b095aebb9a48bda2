//! The closed value model for component fields.
//!
//! Every component field holds a [`Value`]: a tagged variant over the closed
//! set `{int, float, string, bool, vector2, vector3}`. Textual type tags are
//! how on-disk schemas name these variants; [`Value::default_for`] and
//! [`Value::from_doc`] turn a tag (plus, for the latter, a JSON fragment)
//! into a runtime value, and [`Value::to_doc`] is the inverse.

use std::fmt;

use serde_json::Value as Json;

use crate::math::{Vec2, Vec3};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed component field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Text(String),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
}

impl Value {
    /// The canonical type tag of this value.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::Bool(_) => "bool",
            Value::Vec2(_) => "vector2",
            Value::Vec3(_) => "vector3",
        }
    }

    /// Returns the zero value of the given type tag.
    ///
    /// Tags accept an upper- or lowercase first character; the remainder must
    /// already be lowercase (`Integer` works, `INTEGER` does not).
    pub fn default_for(tag: &str) -> Result<Value, EcsError> {
        match canonical_tag(tag) {
            Some("int") => Ok(Value::Int(0)),
            Some("float") => Ok(Value::Float(0.0)),
            Some("string") => Ok(Value::Text(String::new())),
            Some("bool") => Ok(Value::Bool(false)),
            Some("vector2") => Ok(Value::Vec2(Vec2::ZERO)),
            Some("vector3") => Ok(Value::Vec3(Vec3::ZERO)),
            _ => Err(EcsError::UnknownType {
                tag: tag.to_owned(),
            }),
        }
    }

    /// Coerces a JSON fragment to the value named by `tag`.
    ///
    /// Scalars come from the matching JSON scalar; vectors come from two- or
    /// three-element arrays of numbers.
    pub fn from_doc(doc: &Json, tag: &str) -> Result<Value, EcsError> {
        let shape_error = || EcsError::ValueShape {
            expected: tag.to_owned(),
            doc: doc.to_string(),
        };

        match canonical_tag(tag) {
            Some("int") => doc
                .as_i64()
                .map(|v| Value::Int(v as i32))
                .ok_or_else(shape_error),
            Some("float") => doc
                .as_f64()
                .map(|v| Value::Float(v as f32))
                .ok_or_else(shape_error),
            Some("string") => doc
                .as_str()
                .map(|v| Value::Text(v.to_owned()))
                .ok_or_else(shape_error),
            Some("bool") => doc.as_bool().map(Value::Bool).ok_or_else(shape_error),
            Some("vector2") => {
                let [x, y] = number_array::<2>(doc).ok_or_else(shape_error)?;
                Ok(Value::Vec2(Vec2::new(x, y)))
            }
            Some("vector3") => {
                let [x, y, z] = number_array::<3>(doc).ok_or_else(shape_error)?;
                Ok(Value::Vec3(Vec3::new(x, y, z)))
            }
            _ => Err(EcsError::UnknownType {
                tag: tag.to_owned(),
            }),
        }
    }

    /// Serializes the value to its JSON representation. Inverse of
    /// [`Value::from_doc`] for the value's own tag.
    pub fn to_doc(&self) -> Json {
        match self {
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v),
            Value::Text(v) => Json::from(v.clone()),
            Value::Bool(v) => Json::from(*v),
            Value::Vec2(v) => serde_json::json!([v.x, v.y]),
            Value::Vec3(v) => serde_json::json!([v.x, v.y, v.z]),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Vec2(v) => write!(f, "{v}"),
            Value::Vec3(v) => write!(f, "{v}"),
        }
    }
}

/// Reads a fixed-size array of numbers out of a JSON array fragment.
fn number_array<const N: usize>(doc: &Json) -> Option<[f32; N]> {
    let items = doc.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()? as f32;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// Normalizes a textual type tag to its canonical form.
///
/// Only the first character is case-folded; the remainder must already be
/// lowercase. Returns `None` for tags outside the closed set.
pub(crate) fn canonical_tag(tag: &str) -> Option<&'static str> {
    let folded = fold_first(tag);
    match folded.as_str() {
        "int" | "integer" => Some("int"),
        "float" => Some("float"),
        "str" | "string" => Some("string"),
        "bool" | "boolean" => Some("bool"),
        "vector2" => Some("vector2"),
        "vector3" => Some("vector3"),
        _ => None,
    }
}

fn fold_first(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

/// Conversion between [`Value`] and the concrete Rust types of the closed
/// set. This is what backs the generic `get::<T>` accessors: the variant is
/// selected at compile time by the requested `T`.
pub trait FieldValue: Default {
    /// Extracts `Self` when the variant matches, `None` otherwise.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wraps `self` back into a [`Value`].
    fn into_value(self) -> Value;
}

macro_rules! impl_field_value {
    ($ty:ty, $variant:ident) => {
        impl FieldValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_field_value!(i32, Int);
impl_field_value!(f32, Float);
impl_field_value!(String, Text);
impl_field_value!(bool, Bool);
impl_field_value!(Vec2, Vec2);
impl_field_value!(Vec3, Vec3);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! State Values
//!
//! The dynamic values stored in state objects. Scalars compare by value;
//! objects compare by identity, because the hook registry is keyed by the
//! identity of the object a property was read from.

use std::fmt;

use super::object::Object;

/// A property key on a state object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a mapping.
    Field(String),

    /// A position in a sequence.
    Index(usize),

    /// The number of entries. Every object owns this key.
    Length,
}

impl Key {
    /// Build a field key.
    pub fn field(name: impl Into<String>) -> Self {
        Key::Field(name.into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// A value held by a state object.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Snapshot this value as plain JSON. Reads are not recorded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => object.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Numbers with no fractional part that fit exactly in an `i64`.
fn integral(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15).then_some(n as i64)
}

/// Text rendering used for text nodes and attribute values.
///
/// `Null` renders as the empty string. Integral numbers render without a
/// fractional part. Objects render as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Value::String(s) => f.write_str(s),
            Value::Object(object) => write!(f, "{}", object.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(object.clone())
    }
}

/// Composite JSON becomes an [`Object`]; its nested composites stay plain
/// until they are first read.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            composite => Object::from_plain(composite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Value::from(5).to_string(), "5");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::new_map();
        let b = Object::new_map();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn json_scalars_and_composites() {
        assert_eq!(Value::from(json!(3)), Value::Number(3.0));
        assert_eq!(Value::from(json!(null)), Value::Null);
        let value = Value::from(json!({ "a": [1, 2] }));
        let object = value.as_object().expect("composite json becomes an object");
        assert_eq!(object.to_json(), json!({ "a": [1, 2] }));
        assert_eq!(Value::from(json!(5)).to_json(), json!(5));
        assert_eq!(Value::from(2.5).to_json(), json!(2.5));
        assert_eq!(Value::from(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn key_display() {
        assert_eq!(Key::from("name").to_string(), "name");
        assert_eq!(Key::from(3usize).to_string(), "3");
        assert_eq!(Key::Length.to_string(), "length");
    }
}

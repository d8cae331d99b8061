//! Dynamic values flowing through patterns, arguments and parse results.
//!
//! Input units and coerced argument values share one representation:
//! [`Value::Str`] is a text unit, every other variant is treated as an opaque
//! unit by the token cursor. [`Element`] models vendor payloads such as
//! images or mentions that never take part in text splitting.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// An opaque, non-text input element.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Element, TypeTag, Value};
///
/// let at = Value::from(Element::new("at", serde_json::json!({"target": 42})));
/// assert_eq!(at.type_tag(), TypeTag::Element("at".into()));
/// assert!(!at.is_text());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element kind (e.g. `"image"`, `"at"`).
    pub kind: String,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Element {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent value; produced by the `Empty` default marker.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Text. The only kind of unit the token cursor splits.
    Str(String),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Element(Element),
}

/// Runtime type tag used as a pattern's `origin` and in accept lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// Admits every value.
    Any,
    Null,
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    List,
    Map,
    /// An element of the named kind.
    Element(String),
}

impl TypeTag {
    /// Returns true if `value` has this runtime type.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            TypeTag::Any => true,
            other => value.type_tag() == *other,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeTag::Any => "any",
            TypeTag::Null => "null",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::DateTime => "datetime",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Element(kind) => kind,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::DateTime(_) => TypeTag::DateTime,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Element(e) => TypeTag::Element(e.kind.clone()),
        }
    }

    /// Returns the text if this is a text unit.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// True for the empty-text sentinel returned by an exhausted cursor.
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts a JSON document into a value tree.
    ///
    /// Integral numbers that fit in `i64` become [`Value::Int`], all other
    /// numbers [`Value::Float`].
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            Value::Element(e) => write!(f, "[{}:{}]", e.kind, e.data),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Value::Element(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_admits() {
        assert!(TypeTag::Any.admits(&Value::Int(1)));
        assert!(TypeTag::Int.admits(&Value::Int(1)));
        assert!(!TypeTag::Int.admits(&Value::from("1")));
        let img = Value::from(Element::new("image", serde_json::Value::Null));
        assert!(TypeTag::Element("image".into()).admits(&img));
        assert!(!TypeTag::Element("at".into()).admits(&img));
    }

    #[test]
    fn test_from_json_numbers() {
        let v = Value::from_json(serde_json::json!([1, 2.5, "x", {"k": true}]));
        let items = v.as_list().unwrap();
        assert_eq!(items[0], Value::Int(1));
        assert_eq!(items[1], Value::Float(2.5));
        assert_eq!(items[2], Value::from("x"));
        assert_eq!(
            items[3].as_map().unwrap().get("k"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_display() {
        let v = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(v.to_string(), "[1, a]");
        assert!(Value::from("").is_empty_text());
    }
}

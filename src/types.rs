//! Types module: defines field data types, runtime values and combinators.
//!
//! This module provides the DataType, ElementType, Value and Combinator types shared by
//! every other part of the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Element type of an array field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    String,
    Number,
    Date,
    Boolean,
    /// Free-form JSON objects, parsed permissively.
    Object,
}

impl ElementType {
    pub fn name(self) -> &'static str {
        match self {
            ElementType::String => "string",
            ElementType::Number => "number",
            ElementType::Date => "date",
            ElementType::Boolean => "boolean",
            ElementType::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ElementType::String),
            "number" => Some(ElementType::Number),
            "date" => Some(ElementType::Date),
            "boolean" => Some(ElementType::Boolean),
            "object" => Some(ElementType::Object),
            _ => None,
        }
    }
}

/// Declared data type of a field. Arrays carry their element type, so an element type
/// can only exist on array fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
    Array(ElementType),
}

impl DataType {
    /// The editor-facing name of the type (`"array"` for every array).
    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
            DataType::Array(_) => "array",
        }
    }

    pub fn element_type(self) -> Option<ElementType> {
        match self {
            DataType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Resolves a `(dataType, elementType?)` pair as the editor sends it.
    /// Arrays without an element type hold strings. Returns `None` for unrecognized names.
    pub fn from_names(data_type: &str, element_type: Option<&str>) -> Option<Self> {
        match data_type {
            "string" => Some(DataType::String),
            "number" => Some(DataType::Number),
            "date" => Some(DataType::Date),
            "boolean" => Some(DataType::Boolean),
            "array" => match element_type {
                None => Some(DataType::Array(ElementType::String)),
                Some(name) => ElementType::from_name(name).map(DataType::Array),
            },
            _ => None,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, DataType::Array(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Array(elem) => write!(f, "array<{}>", elem.name()),
            other => f.write_str(other.name()),
        }
    }
}

/// A runtime value, either stored in a record or carried by a rule.
///
/// Serialized untagged so records read naturally as JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the runtime shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Formats a number the way a browser's `String(n)` does for the common cases:
/// integral values print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        // covers -0
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// The string form of a value: arrays join their elements with `,`, nulls inside
/// arrays print empty, objects print as `[object Object]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_null() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
        }
    }
}

/// Boolean joiner between sibling rules, groups, or top-level groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn toggled(self) -> Self {
        match self {
            Combinator::And => Combinator::Or,
            Combinator::Or => Combinator::And,
        }
    }

    pub fn sql_keyword(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

//! Rows, values and row shapes.
//!
//! A [`Row`] is a positional tuple of [`Value`]s. Its meaning (names and types)
//! lives in a separate, immutable [`RowShape`] shared by every row that flows
//! through one connection, so rows themselves stay small and cheap to clone.

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The type of a field in a [`RowShape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
}

impl ValueType {
    /// The value a missing or empty field takes for this type.
    #[must_use]
    pub fn empty_value(self) -> Value {
        match self {
            ValueType::String => Value::String(String::new()),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Number => "Number",
            ValueType::Boolean => "Boolean",
            ValueType::Date => "Date",
        };
        f.write_str(s)
    }
}

/// A single typed value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    Date(NaiveDateTime),
    String(String),
}

impl Value {
    /// Shorthand for a string value.
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(v.0),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Renders the value the way text output stages write it. `Null` renders empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", if *b { "Y" } else { "N" }),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{}", v.0),
            Value::Date(d) => write!(f, "{}", d.format("%Y/%m/%d %H:%M:%S%.3f")),
            Value::String(s) => f.write_str(s),
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

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(OrderedFloat(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// An ordered, fixed-length tuple of values.
pub type Row = Vec<Value>;

/// Name and type of one field in a [`RowShape`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub value_type: ValueType,
}

impl FieldMeta {
    pub fn new<S: Into<String>>(name: S, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Immutable field layout shared by all rows of one connection.
///
/// Cloning is cheap; the field list is reference counted.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RowShape {
    fields: Arc<[FieldMeta]>,
}

impl RowShape {
    pub fn new(fields: Vec<FieldMeta>) -> Self {
        Self {
            fields: fields.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Position of the field called `name`, if any.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// A new shape with `extra` appended after the existing fields.
    #[must_use]
    pub fn extended(&self, extra: impl IntoIterator<Item = FieldMeta>) -> Self {
        let mut fields = self.fields.to_vec();
        fields.extend(extra);
        Self::new(fields)
    }

    /// Field names in order, as used for header lines.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

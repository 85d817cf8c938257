//! Attribute values carried by entities.
//!
//! `Value` is the dynamic representation; `AttributeValue` is the typed bridge
//! used by [`Field`](crate::types::Field) handles.

use crate::types::Pid;
use serde::{Deserialize, Serialize};

///
/// Value
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<Self>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for `Null` and for an empty list.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.is_empty(),
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Flatten into a list of items; scalars become a single-item list.
    #[must_use]
    pub fn to_items(&self) -> Vec<Self> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Text items as identifiers; non-text items are skipped.
    #[must_use]
    pub fn to_pids(&self) -> Vec<Pid> {
        self.to_items()
            .into_iter()
            .filter_map(|item| match item {
                Self::Text(text) if !text.is_empty() => Some(Pid::new(text)),
                _ => None,
            })
            .collect()
    }

    /// Render a scalar for index documents.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null | Self::List(_) => None,
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&Pid> for Value {
    fn from(value: &Pid) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

///
/// AttributeValue
///
/// Typed conversion between a Rust value and the dynamic [`Value`] stored on
/// an entity.
///

pub trait AttributeValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

impl AttributeValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_string)
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl AttributeValue for Pid {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().filter(|t| !t.is_empty()).map(Self::new)
    }

    fn into_value(self) -> Value {
        Value::Text(self.into_string())
    }
}

impl AttributeValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl AttributeValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl<T: AttributeValue> AttributeValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.to_items().iter().map(T::from_value).collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(AttributeValue::into_value).collect())
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, AttributeValue::into_value)
    }
}

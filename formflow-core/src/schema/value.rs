//! Field Values
//!
//! The values a form holds while it is being filled in. Text inputs, dates
//! and single choices hold text; multi-choice groups hold a list of the
//! selected options. A field with no entry in [`Values`] is unset.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::FieldId;

/// Current values of a form, keyed by field id, in insertion order.
pub type Values = IndexMap<FieldId, FieldValue>;

/// A single field value.
///
/// Serialised untagged, so the persisted form is plain JSON:
/// `true`, `42`, `"text"` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Empty string or empty list. `false` and `0` are not empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Like [`is_empty`](Self::is_empty) but whitespace-only text also counts.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            other => other.is_empty(),
        }
    }

    /// Text, finite numbers and booleans. Lists are not scalars.
    pub fn is_scalar(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Text(_) | Self::Bool(_) => true,
            Self::List(_) => false,
        }
    }

    /// Length used by the length rules: characters for text, entries for lists.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::Text(s) => Some(s.chars().count()),
            Self::List(items) => Some(items.len()),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Render a number the way a form shows it: integral values have no
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

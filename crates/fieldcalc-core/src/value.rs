//! Row value types

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::date;

/// Represents the value stored under a field in a row
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value
    #[default]
    Null,

    /// Boolean value
    Boolean(bool),

    /// Numeric value
    Number(f64),

    /// Text value
    Text(String),

    /// Date value (an instant in UTC)
    Date(DateTime<Utc>),

    /// Error left behind by a formula field that failed to compute
    Error(FormulaError),
}

impl FieldValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        FieldValue::Text(s.into())
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<FormulaError> {
        match self {
            FieldValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Get the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::Date(_) => "date",
            FieldValue::Error(_) => "error",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, ""),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", date::format_iso(d)),
            FieldValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::text(s)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

impl From<FormulaError> for FieldValue {
    fn from(e: FormulaError) -> Self {
        FieldValue::Error(e)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Evaluation-time error sentinels
///
/// These are values, not failures of the engine: a formula that compiled but
/// could not be computed for a particular row yields one of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaError {
    /// #FIELD! - Referenced field does not exist
    #[error("#FIELD!")]
    FieldMissing,
    /// #ERROR! - Generic failure (bad formula, unknown function, bad arguments)
    #[error("#ERROR!")]
    Generic,
    /// #DIV/0! - Division by zero
    #[error("#DIV/0!")]
    DivideByZero,
    /// #VALUE! - Operand could not be coerced to the required type
    #[error("#VALUE!")]
    ValueTypeMismatch,
}

impl FormulaError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaError::FieldMissing => "#FIELD!",
            FormulaError::Generic => "#ERROR!",
            FormulaError::DivideByZero => "#DIV/0!",
            FormulaError::ValueTypeMismatch => "#VALUE!",
        }
    }
}

/// A single row: field name to stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: AHashMap<String, FieldValue>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under an exact field name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Store a value, replacing any previous one
    pub fn insert<S: Into<String>, V: Into<FieldValue>>(&mut self, name: S, value: V) {
        self.values.insert(name.into(), value.into());
    }

    /// Check whether a field has a stored value (null counts as stored)
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of stored fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over stored values (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>, V: Into<FieldValue>> FromIterator<(S, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

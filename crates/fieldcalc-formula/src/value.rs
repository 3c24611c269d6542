//! Formula value type and coercions

use std::fmt;

use chrono::{DateTime, Utc};
use fieldcalc_core::{date, FieldType, FieldValue};

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
}

impl FormulaValue {
    /// Convert to number using script-number rules
    ///
    /// Null and blank text are 0, booleans are 1/0, dates are epoch
    /// milliseconds, text must be a clean decimal. `None` means the value
    /// has no numeric reading.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FormulaValue::Null => 0.0,
            FormulaValue::Boolean(b) => f64::from(u8::from(*b)),
            FormulaValue::Number(n) => *n,
            FormulaValue::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    parse_decimal(s)?
                }
            }
            FormulaValue::Date(d) => date::timestamp_millis(d),
        };
        if n.is_nan() {
            None
        } else {
            Some(n)
        }
    }

    /// Number parsed from text only when the text is a clean decimal
    pub fn as_clean_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) if !n.is_nan() => Some(*n),
            FormulaValue::String(s) => parse_decimal(s.trim()),
            _ => None,
        }
    }

    /// Interpret as a date, if possible
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FormulaValue::Date(d) => Some(*d),
            FormulaValue::String(s) => date::parse_date(s),
            _ => None,
        }
    }

    /// Truthiness: null, false, 0, NaN and empty text are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            FormulaValue::Null => false,
            FormulaValue::Boolean(b) => *b,
            FormulaValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FormulaValue::String(s) => !s.is_empty(),
            FormulaValue::Date(_) => true,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FormulaValue::Null)
    }

    /// Convert to string for text operations and display
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Null => String::new(),
            FormulaValue::Boolean(b) => b.to_string(),
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Date(d) => date::format_iso(d),
        }
    }

    /// Coerce a stored row value according to the field's declared type
    ///
    /// Stored errors are not handled here; the evaluator propagates them.
    pub fn from_field(value: &FieldValue, field_type: &FieldType) -> FormulaValue {
        let value = match value {
            FieldValue::Null | FieldValue::Error(_) => return FormulaValue::Null,
            other => FormulaValue::from(other.clone()),
        };

        if field_type.is_numeric() {
            FormulaValue::Number(value.as_number().unwrap_or(0.0))
        } else if field_type.is_boolean() {
            FormulaValue::Boolean(value.is_truthy())
        } else if field_type.is_date() {
            match value {
                FormulaValue::Date(d) => FormulaValue::Date(d),
                FormulaValue::Number(n) => date::from_timestamp_millis(n)
                    .map(FormulaValue::Date)
                    .unwrap_or(FormulaValue::Null),
                other => other
                    .as_date()
                    .map(FormulaValue::Date)
                    .unwrap_or(FormulaValue::Null),
            }
        } else {
            FormulaValue::String(value.as_string())
        }
    }
}

/// Parse trimmed decimal text (`12`, `-3.5`, `.5`, `1e3`); rejects words like `inf`
fn parse_decimal(s: &str) -> Option<f64> {
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    s.parse().ok()
}

/// Format like a script runtime: integral values print without a fraction
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<FieldValue> for FormulaValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null | FieldValue::Error(_) => FormulaValue::Null,
            FieldValue::Boolean(b) => FormulaValue::Boolean(b),
            FieldValue::Number(n) => FormulaValue::Number(n),
            FieldValue::Text(s) => FormulaValue::String(s),
            FieldValue::Date(d) => FormulaValue::Date(d),
        }
    }
}

impl From<FormulaValue> for FieldValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Null => FieldValue::Null,
            FormulaValue::Boolean(b) => FieldValue::Boolean(b),
            FormulaValue::Number(n) => FieldValue::Number(n),
            FormulaValue::String(s) => FieldValue::Text(s),
            FormulaValue::Date(d) => FieldValue::Date(d),
        }
    }
}

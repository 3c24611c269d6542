//! JSON input and output for the CLI

use anyhow::{bail, Context, Result};
use fieldcalc::date::format_iso;
use fieldcalc::{FieldDescriptor, FieldType, FieldValue, Row};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Table schema file: `{ "fields": [ { "name", "type", "formula"? } ] }`
#[derive(Debug, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Parse a schema document
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid schema JSON")
    }
}

/// Convert a JSON value into a stored field value
///
/// Arrays and objects are kept as their JSON text.
pub fn to_field_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

/// Convert a field value to JSON; errors become their sentinel text
pub fn from_field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Date(d) => Value::String(format_iso(d)),
        FieldValue::Error(e) => Value::String(e.as_str().to_string()),
    }
}

/// Build a row from a JSON object
pub fn to_row(object: &Map<String, Value>) -> Row {
    object
        .iter()
        .map(|(name, value)| (name.clone(), to_field_value(value)))
        .collect()
}

/// Render a row as a JSON object
pub fn from_row(row: &Row) -> Value {
    let object: Map<String, Value> = row
        .iter()
        .map(|(name, value)| (name.to_string(), from_field_value(value)))
        .collect();
    Value::Object(object)
}

/// Parse rows given as a JSON array of objects or as JSON lines
pub fn parse_rows(text: &str) -> Result<Vec<Row>> {
    let trimmed = text.trim_start();

    if trimmed.starts_with('[') {
        let objects: Vec<Map<String, Value>> =
            serde_json::from_str(trimmed).context("Invalid JSON array of rows")?;
        return Ok(objects.iter().map(to_row).collect());
    }

    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line)
            .with_context(|| format!("Invalid JSON on line {}", line_no + 1))?
        {
            Value::Object(object) => rows.push(to_row(&object)),
            other => bail!(
                "Line {} is not a JSON object: {}",
                line_no + 1,
                other
            ),
        }
    }
    Ok(rows)
}

/// Parse a single row object
pub fn parse_row(text: &str) -> Result<Row> {
    let object: Map<String, Value> =
        serde_json::from_str(text).context("Row must be a JSON object")?;
    Ok(to_row(&object))
}

/// Field catalog guessed from a row's values when no schema is given
pub fn infer_fields(row: &Row) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = row
        .iter()
        .map(|(name, value)| {
            let field_type = match value {
                FieldValue::Number(_) => FieldType::Number,
                FieldValue::Boolean(_) => FieldType::Boolean,
                FieldValue::Date(_) => FieldType::DateTime,
                _ => FieldType::Text,
            };
            log::debug!(
                "inferred {} field {:?} from a {} value",
                field_type,
                name,
                value.type_name()
            );
            FieldDescriptor::new(name, field_type)
        })
        .collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    fields
}

//! Field catalog types
//!
//! A table is described by an ordered list of [`FieldDescriptor`]s. The formula
//! engine only needs each field's name and declared type; formula fields also
//! carry their expression text.

use ahash::AHashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Declared type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "String", into = "String")
)]
pub enum FieldType {
    Text,
    LongText,
    Number,
    Percent,
    Currency,
    Rating,
    Duration,
    AutoNumber,
    Boolean,
    Date,
    DateTime,
    CreatedTime,
    LastModifiedTime,
    Email,
    Url,
    Phone,
    SingleSelect,
    Formula,
    /// Any type the engine has no special coercion for
    Other(String),
}

impl FieldType {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::LongText => "long_text",
            FieldType::Number => "number",
            FieldType::Percent => "percent",
            FieldType::Currency => "currency",
            FieldType::Rating => "rating",
            FieldType::Duration => "duration",
            FieldType::AutoNumber => "autonumber",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::CreatedTime => "created_time",
            FieldType::LastModifiedTime => "last_modified_time",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Phone => "phone",
            FieldType::SingleSelect => "single_select",
            FieldType::Formula => "formula",
            FieldType::Other(name) => name.as_str(),
        }
    }

    /// Numeric family: values are parsed to numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Number
                | FieldType::Percent
                | FieldType::Currency
                | FieldType::Rating
                | FieldType::Duration
                | FieldType::AutoNumber
        )
    }

    /// Boolean family: values are coerced by truthiness
    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldType::Boolean)
    }

    /// Date family: values become dates
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            FieldType::Date
                | FieldType::DateTime
                | FieldType::CreatedTime
                | FieldType::LastModifiedTime
        )
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "text" | "single_line_text" => FieldType::Text,
            "long_text" | "longtext" | "multiline_text" => FieldType::LongText,
            "number" => FieldType::Number,
            "percent" => FieldType::Percent,
            "currency" => FieldType::Currency,
            "rating" => FieldType::Rating,
            "duration" => FieldType::Duration,
            "autonumber" | "auto_number" => FieldType::AutoNumber,
            "boolean" | "checkbox" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" | "date_time" => FieldType::DateTime,
            "created_time" => FieldType::CreatedTime,
            "last_modified_time" => FieldType::LastModifiedTime,
            "email" => FieldType::Email,
            "url" => FieldType::Url,
            "phone" | "phone_number" => FieldType::Phone,
            "single_select" | "select" => FieldType::SingleSelect,
            "formula" => FieldType::Formula,
            _ => FieldType::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(field_type) => field_type,
            Err(never) => match never {},
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and declared type of a field, plus the expression of formula fields
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub field_type: FieldType,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub formula: Option<String>,
}

impl FieldDescriptor {
    /// Create a plain (stored) field
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            formula: None,
        }
    }

    /// Create a formula field
    pub fn formula<S: Into<String>, F: Into<String>>(name: S, formula: F) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Formula,
            formula: Some(formula.into()),
        }
    }

    /// Check if this is a formula-typed field
    pub fn is_formula(&self) -> bool {
        self.field_type == FieldType::Formula
    }

    /// Case-insensitive name match
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Validated, ordered field catalog with case-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
    by_name: AHashMap<String, usize>,
}

impl FieldCatalog {
    /// Build a catalog, rejecting empty and duplicate names
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let mut by_name = AHashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(Error::EmptyFieldName);
            }
            if by_name.insert(field.name.to_lowercase(), idx).is_some() {
                return Err(Error::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields, by_name })
    }

    /// Look up a field by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.fields[idx])
    }

    /// Look up a field by name, failing when absent
    pub fn require(&self, name: &str) -> Result<&FieldDescriptor> {
        self.find(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// All fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Formula fields in declaration order
    pub fn formula_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_formula())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::ops::Deref for FieldCatalog {
    type Target = [FieldDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_type_names() {
        assert_eq!("number".parse::<FieldType>().unwrap(), FieldType::Number);
        assert_eq!("Checkbox".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!("long text".parse::<FieldType>().unwrap(), FieldType::LongText);
        assert_eq!(
            "attachment".parse::<FieldType>().unwrap(),
            FieldType::Other("attachment".into())
        );
        assert_eq!(FieldType::from("currency".to_string()), FieldType::Currency);
        assert_eq!(String::from(FieldType::SingleSelect), "single_select");
    }

    #[test]
    fn test_field_type_families() {
        assert!(FieldType::Percent.is_numeric());
        assert!(FieldType::Currency.is_numeric());
        assert!(!FieldType::Text.is_numeric());
        assert!(FieldType::Boolean.is_boolean());
        assert!(FieldType::Date.is_date());
        assert!(!FieldType::Formula.is_date());
    }

    #[test]
    fn test_catalog_lookup_is_case_insensitive() {
        let catalog = FieldCatalog::new(vec![
            FieldDescriptor::new("Unit Price", FieldType::Currency),
            FieldDescriptor::formula("Total", "{Unit Price} * 2"),
        ])
        .unwrap();

        assert_eq!(catalog.find("unit price").unwrap().name, "Unit Price");
        assert!(catalog.find("Missing").is_none());
        assert!(matches!(
            catalog.require("Missing"),
            Err(Error::UnknownField(name)) if name == "Missing"
        ));
        assert_eq!(catalog.formula_fields().count(), 1);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let result = FieldCatalog::new(vec![
            FieldDescriptor::new("Name", FieldType::Text),
            FieldDescriptor::new("NAME", FieldType::Text),
        ]);
        assert!(matches!(result, Err(Error::DuplicateField(name)) if name == "NAME"));

        let result = FieldCatalog::new(vec![FieldDescriptor::new("  ", FieldType::Text)]);
        assert!(matches!(result, Err(Error::EmptyFieldName)));
    }

    #[test]
    fn test_descriptor_name_match() {
        let field = FieldDescriptor::new("Qty", FieldType::Number);
        assert!(field.matches_name("QTY"));
        assert!(!field.matches_name("Quantity"));
        assert!(!field.is_formula());
    }
}

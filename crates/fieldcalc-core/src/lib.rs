//! # fieldcalc-core
//!
//! Core data structures for the fieldcalc virtual-field engine.
//!
//! This crate provides the fundamental types used throughout fieldcalc:
//! - [`FieldValue`] and [`Row`] - Stored row values keyed by field name
//! - [`FieldType`], [`FieldDescriptor`] and [`FieldCatalog`] - A table's field catalog
//! - [`FormulaError`] - The four evaluation-time error sentinels
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_core::{FieldCatalog, FieldDescriptor, FieldType, FieldValue, Row};
//!
//! let catalog = FieldCatalog::new(vec![
//!     FieldDescriptor::new("Qty", FieldType::Number),
//!     FieldDescriptor::formula("Total", "{Qty} * 2"),
//! ])
//! .unwrap();
//! assert!(catalog.find("qty").is_some());
//!
//! let mut row = Row::new();
//! row.insert("Qty", 4.0);
//! assert_eq!(row.get("Qty"), Some(&FieldValue::Number(4.0)));
//! ```

pub mod date;
pub mod error;
pub mod field;
pub mod value;

pub use error::{Error, Result};
pub use field::{FieldCatalog, FieldDescriptor, FieldType};
pub use value::{FieldValue, FormulaError, Row};

//! # fieldcalc
//!
//! Spreadsheet-style formulas for computed ("virtual") fields in table rows.
//!
//! A formula such as `IF({Qty} > 10, {Price} * 0.9, {Price})` is tokenized,
//! parsed into an AST and evaluated against one row and the table's field
//! catalog. Evaluation never fails loudly: a row that cannot be computed
//! yields one of four error sentinels (`#FIELD!`, `#ERROR!`, `#DIV/0!`,
//! `#VALUE!`) that flow through enclosing expressions like values.
//!
//! ## Features
//!
//! - Field references by name (`{Unit Price}`) or bare identifier (`Qty`)
//! - Arithmetic, comparison and short-circuiting logical operators
//! - Text, math, control and date functions
//! - Per-row computation of every formula field, in declared or dependency order
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let fields = vec![
//!     FieldDescriptor::new("Name", FieldType::Text),
//!     FieldDescriptor::new("Qty", FieldType::Number),
//!     FieldDescriptor::formula("Label", "CONCAT(UPPER({Name}), \" x\", Qty)"),
//!     FieldDescriptor::formula("Ratio", "10 / {Qty}"),
//! ];
//!
//! let row: Row = vec![
//!     ("Name", FieldValue::from("bolt")),
//!     ("Qty", FieldValue::from(0)),
//! ]
//! .into_iter()
//! .collect();
//!
//! let computed = compute_formula_fields(&row, &fields[2..], &fields);
//! assert_eq!(computed.get("Label"), Some(&FieldValue::from("BOLT x0")));
//! assert_eq!(computed.get("Ratio").map(|v| v.to_string()), Some("#DIV/0!".to_string()));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{
    compute_formula_fields, CalculationOptions, CalculationStats, ComputedRow, EvaluationOrder,
    RowCalculator,
};

// Re-export core types
pub use fieldcalc_core::{
    date, Error, FieldCatalog, FieldDescriptor, FieldType, FieldValue, FormulaError, Result, Row,
};

// Re-export formula types
pub use fieldcalc_formula::{
    evaluate, evaluate_formula, parse_formula, tokenize, validate_formula, EvalResult,
    EvaluationContext, FormulaExpr, FormulaValue, SyntaxError, Token, TokenKind,
};

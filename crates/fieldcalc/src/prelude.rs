//! Prelude module - common imports for fieldcalc users
//!
//! ```rust
//! use fieldcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    compute_formula_fields,
    CalculationOptions,
    CalculationStats,
    ComputedRow,
    EvaluationOrder,
    RowCalculator,

    // Catalog and row types
    FieldCatalog,
    FieldDescriptor,
    FieldType,
    FieldValue,
    Row,

    // Formula types
    evaluate_formula,
    parse_formula,
    EvaluationContext,
    FormulaError,
    FormulaValue,
    SyntaxError,

    // Error types
    Error,
    Result,
};

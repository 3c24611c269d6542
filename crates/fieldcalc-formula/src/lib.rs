//! # fieldcalc-formula
//!
//! Formula engine for fieldcalc virtual fields.
//!
//! This crate provides:
//! - Tokenizing (text → tokens)
//! - Parsing (tokens → AST) with precedence climbing
//! - Evaluation (AST + row → value or error sentinel)
//! - Built-in functions (text, math, control, date)
//! - Field dependency tracking between formula fields
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_core::{FieldDescriptor, FieldType, Row};
//! use fieldcalc_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
//!
//! let fields = vec![FieldDescriptor::new("Qty", FieldType::Number)];
//! let row: Row = vec![("Qty", 4.0)].into_iter().collect();
//! let ctx = EvaluationContext::new(&row, &fields);
//!
//! let ast = parse_formula("{Qty} * 2").unwrap();
//! assert_eq!(evaluate(&ast, &ctx), Ok(FormulaValue::Number(8.0)));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod tokenizer;
pub mod value;

pub use ast::{BinaryOperator, FormulaExpr, LogicalOperator, UnaryOperator};
pub use error::{ParseResult, SyntaxError};
pub use evaluator::{evaluate, evaluate_formula, EvalResult, EvaluationContext};
pub use fieldcalc_core::FormulaError;
pub use parser::{parse, parse_formula, validate_formula};
pub use tokenizer::{tokenize, LogicalKeyword, Token, TokenKind};
pub use value::FormulaValue;

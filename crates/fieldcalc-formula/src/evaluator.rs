//! Formula evaluator
//!
//! Walks a [`FormulaExpr`] against one row and produces a value or one of the
//! [`FormulaError`] sentinels. Evaluation never fails any other way: an
//! internal fault is reported as [`FormulaError::Generic`].

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use fieldcalc_core::{FieldDescriptor, FieldValue, FormulaError, Row};

use crate::ast::{BinaryOperator, FormulaExpr, LogicalOperator, UnaryOperator};
use crate::functions;
use crate::parser::parse_formula;
use crate::value::FormulaValue;

/// Result of evaluating a formula or sub-expression
pub type EvalResult<T = FormulaValue> = std::result::Result<T, FormulaError>;

/// Context for formula evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Current row values, keyed by field name
    pub row: &'a Row,
    /// The table's field catalog
    pub fields: &'a [FieldDescriptor],
    /// Pinned clock for NOW()/TODAY(); the system clock when unset
    pub now: Option<DateTime<Utc>>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(row: &'a Row, fields: &'a [FieldDescriptor]) -> Self {
        Self {
            row,
            fields,
            now: None,
        }
    }

    /// Pin the clock seen by NOW() and TODAY()
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Current instant
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Find a field by name (case-insensitive)
    pub fn find_field(&self, name: &str) -> Option<&'a FieldDescriptor> {
        self.fields.iter().find(|f| f.matches_name(name))
    }

    /// Resolve a field reference to a value coerced by the field's type
    pub fn resolve_field(&self, name: &str) -> EvalResult {
        let field = self
            .find_field(name)
            .ok_or(FormulaError::FieldMissing)?;

        match self.row.get(&field.name) {
            None | Some(FieldValue::Null) => Ok(FormulaValue::Null),
            Some(FieldValue::Error(e)) => Err(*e),
            Some(value) => Ok(FormulaValue::from_field(value, &field.field_type)),
        }
    }
}

/// Evaluate a formula expression
///
/// # Example
/// ```rust
/// use fieldcalc_core::{FormulaError, Row};
/// use fieldcalc_formula::{evaluate, parse_formula, EvaluationContext};
///
/// let row = Row::new();
/// let ctx = EvaluationContext::new(&row, &[]);
/// let ast = parse_formula("10 / 0").unwrap();
/// assert_eq!(evaluate(&ast, &ctx), Err(FormulaError::DivideByZero));
/// ```
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> EvalResult {
    panic::catch_unwind(AssertUnwindSafe(|| eval_expr(expr, ctx))).unwrap_or_else(|_| {
        log::error!("internal fault during formula evaluation");
        Err(FormulaError::Generic)
    })
}

/// Parse and evaluate formula text; syntax errors become [`FormulaError::Generic`]
pub fn evaluate_formula(formula: &str, ctx: &EvaluationContext) -> EvalResult {
    let ast = parse_formula(formula).map_err(|e| {
        log::debug!("formula {:?} failed to parse: {}", formula, e);
        FormulaError::Generic
    })?;
    evaluate(&ast, ctx)
}

fn eval_expr(expr: &FormulaExpr, ctx: &EvaluationContext) -> EvalResult {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),

        // === References ===
        FormulaExpr::FieldReference(name) => ctx.resolve_field(name),

        // === Operators ===
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::LogicalOp { op, left, right } => evaluate_logical_op(*op, left, right, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> EvalResult {
    let val = eval_expr(operand, ctx)?;

    match op {
        UnaryOperator::Negate => {
            let n = val.as_number().ok_or(FormulaError::ValueTypeMismatch)?;
            Ok(FormulaValue::Number(-n))
        }
        UnaryOperator::Not => Ok(FormulaValue::Boolean(!val.is_truthy())),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> EvalResult {
    // Evaluate operands first; errors propagate before any comparison or coercion
    let left_val = eval_expr(left, ctx)?;
    let right_val = eval_expr(right, ctx)?;

    if op.is_comparison() {
        return Ok(FormulaValue::Boolean(compare_values(
            op, &left_val, &right_val,
        )));
    }

    let l = left_val
        .as_number()
        .ok_or(FormulaError::ValueTypeMismatch)?;
    let r = right_val
        .as_number()
        .ok_or(FormulaError::ValueTypeMismatch)?;

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(FormulaError::DivideByZero);
            }
            l / r
        }
        _ => return Err(FormulaError::Generic),
    };

    Ok(FormulaValue::Number(result))
}

/// Evaluate AND / OR with short-circuiting
///
/// Errors from either operand propagate; the right operand is only evaluated
/// when the left one does not decide the result.
fn evaluate_logical_op(
    op: LogicalOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> EvalResult {
    let left_truthy = eval_expr(left, ctx)?.is_truthy();

    match (op, left_truthy) {
        (LogicalOperator::And, false) => Ok(FormulaValue::Boolean(false)),
        (LogicalOperator::Or, true) => Ok(FormulaValue::Boolean(true)),
        _ => Ok(FormulaValue::Boolean(eval_expr(right, ctx)?.is_truthy())),
    }
}

/// Compare two values
///
/// Null handling comes first: two nulls are equal under `=`/`==`, and any
/// other comparison involving null is false. Otherwise the first applicable
/// rule wins: both dates, then numeric, then lexicographic text.
fn compare_values(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> bool {
    let is_equality = matches!(op, BinaryOperator::Equal | BinaryOperator::StrictEqual);

    match (left.is_null(), right.is_null()) {
        (true, true) => return is_equality,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }

    let ordering = if let (Some(l), Some(r)) = (left.as_date(), right.as_date()) {
        Some(l.cmp(&r))
    } else if let Some((l, r)) = numeric_operands(left, right) {
        l.partial_cmp(&r)
    } else {
        Some(left.as_string().cmp(&right.as_string()))
    };

    // An operand without a numeric reading is unordered: only != holds
    let Some(ordering) = ordering else {
        return op == BinaryOperator::NotEqual;
    };

    match op {
        BinaryOperator::Equal | BinaryOperator::StrictEqual => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// Equality under `=` semantics
pub(crate) fn values_equal(left: &FormulaValue, right: &FormulaValue) -> bool {
    compare_values(BinaryOperator::Equal, left, right)
}

/// Numeric comparison applies when either side is a number or both sides
/// are clean decimal text
fn numeric_operands(left: &FormulaValue, right: &FormulaValue) -> Option<(f64, f64)> {
    let either_numeric =
        matches!(left, FormulaValue::Number(_)) || matches!(right, FormulaValue::Number(_));

    if either_numeric {
        return Some((
            left.as_number().unwrap_or(f64::NAN),
            right.as_number().unwrap_or(f64::NAN),
        ));
    }

    Some((left.as_clean_number()?, right.as_clean_number()?))
}

/// Evaluate a function call
fn evaluate_function(name: &str, args: &[FormulaExpr], ctx: &EvaluationContext) -> EvalResult {
    let registry = functions::registry();

    let func = registry.get(name).ok_or_else(|| {
        log::debug!("unknown function {}", name);
        FormulaError::Generic
    })?;

    // Evaluate arguments; the first error wins before arity is checked
    let evaluated_args = args
        .iter()
        .map(|arg| eval_expr(arg, ctx))
        .collect::<EvalResult<Vec<_>>>()?;

    // Check argument count
    let count = evaluated_args.len();
    if count < func.min_args || func.max_args.map_or(false, |max| count > max) {
        log::debug!(
            "{} called with {} arguments (expected {}..{})",
            name,
            count,
            func.min_args,
            func.max_args.map_or("*".to_string(), |max| max.to_string())
        );
        return Err(FormulaError::Generic);
    }

    log::trace!("dispatching {} with {:?}", name, evaluated_args);
    (func.implementation)(&evaluated_args, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcalc_core::FieldType;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> EvalResult {
        let row = Row::new();
        let ctx = EvaluationContext::new(&row, &[]);
        evaluate(&parse_formula(formula).unwrap(), &ctx)
    }

    fn eval_with(formula: &str, fields: &[FieldDescriptor], row: &Row) -> EvalResult {
        let ctx = EvaluationContext::new(row, fields);
        evaluate(&parse_formula(formula).unwrap(), &ctx)
    }

    fn num(n: f64) -> EvalResult {
        Ok(FormulaValue::Number(n))
    }

    fn boolean(b: bool) -> EvalResult {
        Ok(FormulaValue::Boolean(b))
    }

    fn sample() -> (Vec<FieldDescriptor>, Row) {
        let fields = vec![
            FieldDescriptor::new("Qty", FieldType::Number),
            FieldDescriptor::new("Name", FieldType::Text),
            FieldDescriptor::new("Done", FieldType::Boolean),
            FieldDescriptor::new("Due", FieldType::Date),
            FieldDescriptor::new("Notes", FieldType::LongText),
            FieldDescriptor::new("Broken", FieldType::Formula),
        ];
        let mut row = Row::new();
        row.insert("Qty", 4);
        row.insert("Name", "Widget");
        row.insert("Done", 1);
        row.insert("Due", "2024-03-01");
        row.insert("Broken", FormulaError::DivideByZero);
        (fields, row)
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1 + 2"), num(3.0));
        assert_eq!(eval("10 - 3"), num(7.0));
        assert_eq!(eval("4 * 5"), num(20.0));
        assert_eq!(eval("20 / 8"), num(2.5));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(eval("2 + 3 * 4"), num(14.0));
        assert_eq!(eval("(2 + 3) * 4"), num(20.0));
        assert_eq!(eval("10 - 3 - 2"), num(5.0));
        assert_eq!(eval("-2 * -3"), num(6.0));
    }

    #[test]
    fn test_evaluate_arithmetic_coercion() {
        assert_eq!(eval("\"2\" + 3"), num(5.0));
        assert_eq!(eval("TRUE + 1"), num(2.0));
        assert_eq!(eval("\"abc\" + 1"), Err(FormulaError::ValueTypeMismatch));
        assert_eq!(eval("-\"abc\""), Err(FormulaError::ValueTypeMismatch));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(eval("10 / 0"), Err(FormulaError::DivideByZero));
        assert_eq!(eval("10 / (2 - 2)"), Err(FormulaError::DivideByZero));
        // Error propagates through enclosing operations
        assert_eq!(eval("1 + 10 / 0 * 3"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("5 > 3"), boolean(true));
        assert_eq!(eval("5 = 5"), boolean(true));
        assert_eq!(eval("5 == 5"), boolean(true));
        assert_eq!(eval("5 != 5"), boolean(false));
        assert_eq!(eval("5 <= 5"), boolean(true));
        assert_eq!(eval("5 >= 6"), boolean(false));
        assert_eq!(eval("\"b\" > \"a\""), boolean(true));
        assert_eq!(eval("\"B\" > \"a\""), boolean(false));
    }

    #[test]
    fn test_numeric_looking_strings_compare_numerically() {
        assert_eq!(eval("\"10\" > \"9\""), boolean(true));
        assert_eq!(eval("\"10\" = 10"), boolean(true));
        assert_eq!(eval("\"abc\" > 1"), boolean(false));
        assert_eq!(eval("\"abc\" < 1"), boolean(false));
        assert_eq!(eval("\"abc\" != 1"), boolean(true));
    }

    #[test]
    fn test_date_comparison_wins() {
        assert_eq!(eval("\"2024-03-01\" < \"2024-12-01\""), boolean(true));
        assert_eq!(
            eval("\"2024-03-01T00:00:00Z\" = \"2024-03-01\""),
            boolean(true)
        );
        let (fields, row) = sample();
        assert_eq!(
            eval_with("{Due} > \"2024-02-28\"", &fields, &row),
            boolean(true)
        );
    }

    #[test]
    fn test_null_comparisons() {
        let (fields, row) = sample();
        // Notes is declared but has no value
        assert_eq!(eval_with("{Notes} = {Notes}", &fields, &row), boolean(true));
        assert_eq!(eval_with("{Notes} == BLANK()", &fields, &row), boolean(true));
        assert_eq!(eval_with("{Notes} != {Notes}", &fields, &row), boolean(false));
        assert_eq!(eval_with("{Notes} = 0", &fields, &row), boolean(false));
        assert_eq!(eval_with("{Notes} < 1", &fields, &row), boolean(false));
        assert_eq!(eval_with("{Notes} != 1", &fields, &row), boolean(false));
    }

    #[test]
    fn test_field_resolution() {
        let (fields, row) = sample();
        assert_eq!(eval_with("{Qty} * 2", &fields, &row), num(8.0));
        assert_eq!(eval_with("qty * 2", &fields, &row), num(8.0));
        assert_eq!(eval_with("{QTY} + 1", &fields, &row), num(5.0));
        assert_eq!(
            eval_with("{Missing} * 2", &fields, &row),
            Err(FormulaError::FieldMissing)
        );
        assert_eq!(
            eval_with("{Name}", &fields, &row),
            Ok(FormulaValue::String("Widget".into()))
        );
        assert_eq!(eval_with("{Done}", &fields, &row), boolean(true));
        assert_eq!(eval_with("{Notes}", &fields, &row), Ok(FormulaValue::Null));
    }

    #[test]
    fn test_stored_error_propagates() {
        let (fields, row) = sample();
        assert_eq!(
            eval_with("{Broken} + 1", &fields, &row),
            Err(FormulaError::DivideByZero)
        );
    }

    #[test]
    fn test_error_propagates_through_comparison() {
        let (fields, row) = sample();
        assert_eq!(
            eval_with("{Missing} = 1", &fields, &row),
            Err(FormulaError::FieldMissing)
        );
        assert_eq!(eval("1 / 0 > 1"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_logical_short_circuit() {
        assert_eq!(eval("OR(TRUE, 1 / 0)"), boolean(true));
        assert_eq!(eval("TRUE OR {Missing}"), boolean(true));
        assert_eq!(eval("AND(FALSE, 1 / 0)"), boolean(false));
        assert_eq!(eval("0 AND NOPE()"), boolean(false));
    }

    #[test]
    fn test_logical_propagates_left_errors() {
        assert_eq!(eval("OR(1 / 0, TRUE)"), Err(FormulaError::DivideByZero));
        assert_eq!(eval("AND(\"x\" * 1, TRUE)"), Err(FormulaError::ValueTypeMismatch));
        assert_eq!(eval("TRUE AND 1 / 0"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_logical_values() {
        assert_eq!(eval("AND(1, \"x\")"), boolean(true));
        assert_eq!(eval("OR(0, \"\")"), boolean(false));
        assert_eq!(eval("NOT 0"), boolean(true));
        assert_eq!(eval("NOT(\"text\")"), boolean(false));
        assert_eq!(eval("1 < 2 AND 3 < 4 OR FALSE"), boolean(true));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(eval("NOPE(1, 2)"), Err(FormulaError::Generic));
    }

    #[test]
    fn test_function_argument_errors_short_circuit() {
        assert_eq!(eval("UPPER(1 / 0)"), Err(FormulaError::DivideByZero));
        assert_eq!(
            eval("CONCAT(\"a\", \"b\" * 2, 1 / 0)"),
            Err(FormulaError::ValueTypeMismatch)
        );
    }

    #[test]
    fn test_function_arity() {
        assert_eq!(eval("UPPER()"), Err(FormulaError::Generic));
        assert_eq!(eval("LEN(\"a\", \"b\")"), Err(FormulaError::Generic));
        // Argument errors surface before the arity check
        assert_eq!(eval("LEN(1 / 0, \"b\")"), Err(FormulaError::DivideByZero));
        assert_eq!(eval("UPPER(1 / 0, 1)"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_evaluate_formula_maps_syntax_errors() {
        let row = Row::new();
        let ctx = EvaluationContext::new(&row, &[]);
        assert_eq!(evaluate_formula("1 +", &ctx), Err(FormulaError::Generic));
        assert_eq!(evaluate_formula("", &ctx), Err(FormulaError::Generic));
        assert_eq!(evaluate_formula("1 + 1", &ctx), num(2.0));
    }

    #[test]
    fn test_error_text_literal_is_a_string() {
        assert_eq!(
            eval("\"#ERROR!\""),
            Ok(FormulaValue::String("#ERROR!".into()))
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let (fields, row) = sample();
        let now = fieldcalc_core::date::parse_date("2024-06-01T12:00:00Z").unwrap();
        let ctx = EvaluationContext::new(&row, &fields).with_now(now);
        let ast = parse_formula("IF({Qty} > 2, CONCAT({Name}, \"-\", {Qty} / 3), NOW())").unwrap();

        let first = evaluate(&ast, &ctx);
        let second = evaluate(&ast, &ctx);
        assert_eq!(first, second);
        if let (Ok(FormulaValue::String(a)), Ok(FormulaValue::String(b))) = (&first, &second) {
            assert_eq!(a.as_bytes(), b.as_bytes());
        } else {
            panic!("Expected strings, got {:?}", first);
        }
    }
}

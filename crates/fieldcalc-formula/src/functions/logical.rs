//! Control functions

use crate::evaluator::{values_equal, EvalResult, EvaluationContext};
use crate::value::FormulaValue;

/// IF(condition, value_if_true, [value_if_false])
///
/// Both branches have already been evaluated; an error in either one
/// surfaces before IF runs.
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let condition = args.first().map_or(false, FormulaValue::is_truthy);
    let chosen = if condition { args.get(1) } else { args.get(2) };
    Ok(chosen.cloned().unwrap_or(FormulaValue::Null))
}

/// SWITCH(expression, pattern, result, [pattern, result]..., [default])
pub fn fn_switch(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let Some((expression, rest)) = args.split_first() else {
        return Ok(FormulaValue::Null);
    };

    let mut pairs = rest.chunks_exact(2);
    for pair in pairs.by_ref() {
        if values_equal(expression, &pair[0]) {
            return Ok(pair[1].clone());
        }
    }

    // A trailing odd argument is the default
    Ok(pairs
        .remainder()
        .first()
        .cloned()
        .unwrap_or(FormulaValue::Null))
}

/// BLANK()
pub fn fn_blank(_args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{evaluate_formula, FormulaError};
    use fieldcalc_core::Row;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> EvalResult {
        let row = Row::new();
        let ctx = EvaluationContext::new(&row, &[]);
        evaluate_formula(formula, &ctx)
    }

    fn s(text: &str) -> FormulaValue {
        FormulaValue::String(text.into())
    }

    #[test]
    fn test_if() {
        assert_eq!(eval("IF(1 > 0, \"yes\", \"no\")"), Ok(s("yes")));
        assert_eq!(eval("IF(\"\", \"yes\", \"no\")"), Ok(s("no")));
        assert_eq!(eval("IF(FALSE, \"yes\")"), Ok(FormulaValue::Null));
    }

    #[test]
    fn test_if_evaluates_both_branches() {
        assert_eq!(
            eval("IF(TRUE, 1, 1 / 0)"),
            Err(FormulaError::DivideByZero)
        );
    }

    #[test]
    fn test_switch() {
        assert_eq!(eval("SWITCH(2, 1, \"one\", 2, \"two\")"), Ok(s("two")));
        assert_eq!(
            eval("SWITCH(\"x\", \"a\", 1, \"b\", 2, \"other\")"),
            Ok(s("other"))
        );
        assert_eq!(eval("SWITCH(9, 1, \"one\")"), Ok(FormulaValue::Null));
        // Numeric-looking text matches numbers
        assert_eq!(eval("SWITCH(\"2\", 2, \"two\")"), Ok(s("two")));
        assert_eq!(eval("SWITCH(BLANK(), BLANK(), \"empty\")"), Ok(s("empty")));
    }

    #[test]
    fn test_blank() {
        assert_eq!(eval("BLANK()"), Ok(FormulaValue::Null));
        assert_eq!(eval("BLANK(1)"), Err(FormulaError::Generic));
    }
}

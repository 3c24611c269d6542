//! Math functions

use fieldcalc_core::FormulaError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::{number_arg, optional_number_arg, text_arg};
use crate::evaluator::{EvalResult, EvaluationContext};
use crate::value::FormulaValue;

/// Largest scale a decimal can hold
const MAX_DECIMAL_DIGITS: i32 = 28;

/// Collect every argument as a number
fn numbers(args: &[FormulaValue]) -> EvalResult<Vec<f64>> {
    (0..args.len()).map(|i| number_arg(args, i)).collect()
}

/// Round half away from zero on the decimal representation
///
/// `2.675` rounds to `2.68` even though the nearest binary float is slightly
/// below it.
fn round_half_away(number: f64, digits: i32) -> f64 {
    if !number.is_finite() || digits > MAX_DECIMAL_DIGITS {
        return number;
    }
    // Shortest round-trip text keeps the digits the user wrote
    let Ok(decimal) = number.to_string().parse::<Decimal>() else {
        return number;
    };

    let rounded = if digits >= 0 {
        decimal.round_dp_with_strategy(digits as u32, RoundingStrategy::MidpointAwayFromZero)
    } else {
        let places = digits.unsigned_abs();
        let scale = 10_i128
            .checked_pow(places)
            .and_then(|p| Decimal::try_from_i128_with_scale(p, 0).ok());
        let Some(scale) = scale else {
            return round_to_power_of_ten(number, digits);
        };
        let Some(shifted) = decimal.checked_div(scale) else {
            return number;
        };
        let Some(rounded) = shifted
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(scale)
        else {
            return round_to_power_of_ten(number, digits);
        };
        rounded
    };

    rounded.to_f64().unwrap_or(number)
}

/// Float fallback for negative digits beyond the decimal range
fn round_to_power_of_ten(number: f64, digits: i32) -> f64 {
    let scale = 10_f64.powi(digits.saturating_neg());
    if !scale.is_finite() || number.abs() < 0.5 * scale {
        return 0.0;
    }
    (number / scale).round() * scale
}

/// Round to a multiple of `significance` using `op` (floor or ceil)
fn round_to_multiple(number: f64, significance: f64, op: fn(f64) -> f64) -> f64 {
    let significance = significance.abs();
    if significance == 0.0 {
        return 0.0;
    }
    // Snap only float noise such as 0.3 / 0.1 = 2.9999999999999996
    let quotient = number / significance;
    let nearest = quotient.round();
    if (quotient - nearest).abs() <= quotient.abs() * 4.0 * f64::EPSILON {
        return nearest * significance;
    }
    op(quotient) * significance
}

/// ROUND(number, [num_digits])
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let number = number_arg(args, 0)?;
    let digits = optional_number_arg(args, 1, 0.0)?.trunc() as i32;
    Ok(FormulaValue::Number(round_half_away(number, digits)))
}

/// FLOOR(number, [significance])
pub fn fn_floor(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let number = number_arg(args, 0)?;
    let significance = optional_number_arg(args, 1, 1.0)?;
    Ok(FormulaValue::Number(round_to_multiple(
        number,
        significance,
        f64::floor,
    )))
}

/// CEILING(number, [significance])
pub fn fn_ceiling(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let number = number_arg(args, 0)?;
    let significance = optional_number_arg(args, 1, 1.0)?;
    Ok(FormulaValue::Number(round_to_multiple(
        number,
        significance,
        f64::ceil,
    )))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(number_arg(args, 0)?.abs()))
}

/// MOD(number, divisor)
///
/// The result takes the sign of the divisor.
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let number = number_arg(args, 0)?;
    let divisor = number_arg(args, 1)?;

    if divisor == 0.0 {
        return Err(FormulaError::DivideByZero);
    }

    Ok(FormulaValue::Number(
        number - divisor * (number / divisor).floor(),
    ))
}

/// SUM(number, ...)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(numbers(args)?.iter().sum()))
}

/// MIN(number, ...)
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let min = numbers(args)?.into_iter().fold(f64::INFINITY, f64::min);
    Ok(FormulaValue::Number(min))
}

/// MAX(number, ...)
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let max = numbers(args)?.into_iter().fold(f64::NEG_INFINITY, f64::max);
    Ok(FormulaValue::Number(max))
}

/// AVERAGE(number, ...)
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let values = numbers(args)?;
    if values.is_empty() {
        return Err(FormulaError::DivideByZero);
    }
    Ok(FormulaValue::Number(
        values.iter().sum::<f64>() / values.len() as f64,
    ))
}

/// VALUE(text) - reads numbers written with grouping, currency or percent
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    if let Some(FormulaValue::Number(n)) = args.first() {
        return Ok(FormulaValue::Number(*n));
    }

    let text = text_arg(args, 0);
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | ' '))
        .collect();

    let (digits, scale) = match cleaned.strip_suffix('%') {
        Some(rest) => (rest, 0.01),
        None => (cleaned.as_str(), 1.0),
    };

    FormulaValue::String(digits.to_string())
        .as_clean_number()
        .map(|n| FormulaValue::Number(n * scale))
        .ok_or(FormulaError::ValueTypeMismatch)
}

//! Text functions

use fieldcalc_core::FormulaError;

use super::{number_arg, optional_number_arg, text_arg};
use crate::evaluator::{EvalResult, EvaluationContext};
use crate::value::FormulaValue;

/// Longest text REPT will build
const MAX_TEXT_LENGTH: usize = 32_767;

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn take_mid(s: &str, start_1based: usize, n: usize) -> String {
    if start_1based == 0 {
        return String::new();
    }
    s.chars().skip(start_1based - 1).take(n).collect()
}

/// Non-negative character count, truncated toward zero
fn count_arg(args: &[FormulaValue], index: usize, default: f64) -> EvalResult<usize> {
    let n = optional_number_arg(args, index, default)?.trunc();
    if n < 0.0 {
        return Err(FormulaError::ValueTypeMismatch);
    }
    Ok(n as usize)
}

/// CONCAT(value, ...)
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let joined: String = args.iter().map(FormulaValue::as_string).collect();
    Ok(FormulaValue::String(joined))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::String(text_arg(args, 0).to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::String(text_arg(args, 0).to_lowercase()))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let num_chars = count_arg(args, 1, 1.0)?;
    Ok(FormulaValue::String(take_left(&text_arg(args, 0), num_chars)))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let num_chars = count_arg(args, 1, 1.0)?;
    Ok(FormulaValue::String(take_right(&text_arg(args, 0), num_chars)))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let start = number_arg(args, 1)?.trunc();
    let count = number_arg(args, 2)?.trunc();

    if start < 1.0 || count < 0.0 {
        return Err(FormulaError::ValueTypeMismatch);
    }

    Ok(FormulaValue::String(take_mid(
        &text_arg(args, 0),
        start as usize,
        count as usize,
    )))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(text_arg(args, 0).chars().count() as f64))
}

/// TRIM(text) - strips leading and trailing whitespace
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::String(text_arg(args, 0).trim().to_string()))
}

/// FIND(needle, haystack, [start_num])
///
/// Returns the 1-based character position of `needle`, or 0 when it does not
/// occur at or after `start_num`. Matching is case-sensitive.
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let needle = text_arg(args, 0);
    let haystack = text_arg(args, 1);
    let start = optional_number_arg(args, 2, 1.0)?.trunc();

    if start < 1.0 {
        return Err(FormulaError::ValueTypeMismatch);
    }

    let skip = start as usize - 1;
    let Some((byte_offset, _)) = haystack.char_indices().nth(skip) else {
        // Start beyond the end only matches an empty needle right at the end
        let len = haystack.chars().count();
        let position = if needle.is_empty() && skip == len {
            start
        } else {
            0.0
        };
        return Ok(FormulaValue::Number(position));
    };

    let position = haystack[byte_offset..]
        .find(&needle)
        .map(|found| {
            let chars_before = haystack[..byte_offset + found].chars().count();
            (chars_before + 1) as f64
        })
        .unwrap_or(0.0);

    Ok(FormulaValue::Number(position))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let text = text_arg(args, 0);
    let old_text = text_arg(args, 1);
    let new_text = text_arg(args, 2);

    if old_text.is_empty() {
        return Ok(FormulaValue::String(text));
    }

    if args.len() < 4 {
        return Ok(FormulaValue::String(text.replace(&old_text, &new_text)));
    }

    let instance = number_arg(args, 3)?.trunc();
    if instance < 1.0 {
        return Err(FormulaError::ValueTypeMismatch);
    }

    let result = match text.match_indices(&old_text).nth(instance as usize - 1) {
        Some((offset, _)) => {
            let mut replaced = String::with_capacity(text.len() + new_text.len());
            replaced.push_str(&text[..offset]);
            replaced.push_str(&new_text);
            replaced.push_str(&text[offset + old_text.len()..]);
            replaced
        }
        None => text,
    };

    Ok(FormulaValue::String(result))
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let text = text_arg(args, 0);
    let times = count_arg(args, 1, 0.0)?;

    if text.chars().count().saturating_mul(times) > MAX_TEXT_LENGTH {
        return Err(FormulaError::ValueTypeMismatch);
    }

    Ok(FormulaValue::String(text.repeat(times)))
}

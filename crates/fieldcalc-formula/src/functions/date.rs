//! Date functions
//!
//! Dates are UTC instants. Arguments that are not dates (or date text) are
//! `#VALUE!`.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use fieldcalc_core::{date, FormulaError};
use lazy_regex::regex_replace_all;

use super::{date_arg, number_arg, text_arg};
use crate::evaluator::{EvalResult, EvaluationContext};
use crate::value::FormulaValue;

const MILLIS_PER_SECOND: f64 = 1_000.0;
const MILLIS_PER_MINUTE: f64 = 60.0 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: f64 = 60.0 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: f64 = 24.0 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: f64 = 7.0 * MILLIS_PER_DAY;

/// Offsets beyond this leave the representable date range
const MAX_OFFSET_MILLIS: f64 = 1e17;

/// Unit accepted by DATEADD and DATETIME_DIFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

impl DateUnit {
    /// Parse a unit name; `M` is months and `m` is minutes
    pub fn parse(unit: &str) -> Option<Self> {
        let unit = unit.trim();
        if unit == "M" {
            return Some(DateUnit::Months);
        }
        let unit = match unit.to_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => DateUnit::Milliseconds,
            "s" | "sec" | "secs" | "second" | "seconds" => DateUnit::Seconds,
            "m" | "min" | "mins" | "minute" | "minutes" => DateUnit::Minutes,
            "h" | "hr" | "hrs" | "hour" | "hours" => DateUnit::Hours,
            "d" | "day" | "days" => DateUnit::Days,
            "w" | "wk" | "week" | "weeks" => DateUnit::Weeks,
            "mo" | "mon" | "month" | "months" => DateUnit::Months,
            "q" | "quarter" | "quarters" => DateUnit::Quarters,
            "y" | "yr" | "yrs" | "year" | "years" => DateUnit::Years,
            _ => return None,
        };
        Some(unit)
    }

    /// Length in milliseconds for fixed-length units
    fn fixed_millis(self) -> Option<f64> {
        match self {
            DateUnit::Milliseconds => Some(1.0),
            DateUnit::Seconds => Some(MILLIS_PER_SECOND),
            DateUnit::Minutes => Some(MILLIS_PER_MINUTE),
            DateUnit::Hours => Some(MILLIS_PER_HOUR),
            DateUnit::Days => Some(MILLIS_PER_DAY),
            DateUnit::Weeks => Some(MILLIS_PER_WEEK),
            DateUnit::Months | DateUnit::Quarters | DateUnit::Years => None,
        }
    }

    /// Length in months for calendar units
    fn months(self) -> i64 {
        match self {
            DateUnit::Quarters => 3,
            DateUnit::Years => 12,
            _ => 1,
        }
    }
}

fn unit_arg(args: &[FormulaValue], index: usize, default: DateUnit) -> EvalResult<DateUnit> {
    if index >= args.len() {
        return Ok(default);
    }
    DateUnit::parse(&text_arg(args, index)).ok_or(FormulaError::ValueTypeMismatch)
}

/// Add whole calendar months, clamping to the end of shorter months
fn add_months(date: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// Whole calendar months from `start` to `end`, truncated toward zero
fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let mut months = i64::from(end.year() - start.year()) * 12
        + i64::from(end.month()) - i64::from(start.month());

    // Drop a month that has not fully elapsed
    match add_months(start, months) {
        Some(shifted) if months > 0 && shifted > end => months -= 1,
        Some(shifted) if months < 0 && shifted < end => months += 1,
        _ => {}
    }
    months
}

/// DATEADD(date, count, unit)
pub fn fn_dateadd(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let date = date_arg(args, 0)?;
    let count = number_arg(args, 1)?;
    let unit = unit_arg(args, 2, DateUnit::Days)?;

    let shifted = match unit.fixed_millis() {
        Some(millis) => {
            let offset = (count * millis).trunc();
            if !(offset.abs() < MAX_OFFSET_MILLIS) {
                return Err(FormulaError::ValueTypeMismatch);
            }
            date.checked_add_signed(Duration::milliseconds(offset as i64))
        }
        None => add_months(date, (count.trunc() as i64).saturating_mul(unit.months())),
    };

    shifted
        .map(FormulaValue::Date)
        .ok_or(FormulaError::ValueTypeMismatch)
}

/// DATETIME_DIFF(date1, date2, [unit])
///
/// `date1 - date2` in whole units, truncated toward zero.
pub fn fn_datetime_diff(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let end = date_arg(args, 0)?;
    let start = date_arg(args, 1)?;
    let unit = unit_arg(args, 2, DateUnit::Seconds)?;

    let diff = match unit.fixed_millis() {
        Some(millis) => {
            let elapsed = (end - start).num_milliseconds() as f64;
            (elapsed / millis).trunc()
        }
        None => (months_between(start, end) / unit.months()) as f64,
    };

    Ok(FormulaValue::Number(diff))
}

/// DATETIME_FORMAT(date, [format])
///
/// Supported tokens: `YYYY YY MMMM MMM MM M DD D dddd ddd HH H hh h mm ss SSS A a`.
/// Text inside `[...]` is copied literally. Without a format the date is
/// rendered as ISO-8601.
pub fn fn_datetime_format(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    let date = date_arg(args, 0)?;

    if args.len() < 2 {
        return Ok(FormulaValue::String(date::format_iso(&date)));
    }

    let pattern = text_arg(args, 1);
    Ok(FormulaValue::String(format_date(&date, &pattern)))
}

fn format_date(date: &DateTime<Utc>, pattern: &str) -> String {
    let hour12 = match date.hour() % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if date.hour() < 12 { "AM" } else { "PM" };

    regex_replace_all!(
        r"\[[^\]]*\]|YYYY|YY|MMMM|MMM|MM|M|DD|D|dddd|ddd|HH|H|hh|h|mm|ss|SSS|A|a",
        pattern,
        |token: &str| match token {
            "YYYY" => format!("{:04}", date.year()),
            "YY" => format!("{:02}", date.year().rem_euclid(100)),
            "MMMM" => date.format("%B").to_string(),
            "MMM" => date.format("%b").to_string(),
            "MM" => format!("{:02}", date.month()),
            "M" => date.month().to_string(),
            "DD" => format!("{:02}", date.day()),
            "D" => date.day().to_string(),
            "dddd" => date.format("%A").to_string(),
            "ddd" => date.format("%a").to_string(),
            "HH" => format!("{:02}", date.hour()),
            "H" => date.hour().to_string(),
            "hh" => format!("{:02}", hour12),
            "h" => hour12.to_string(),
            "mm" => format!("{:02}", date.minute()),
            "ss" => format!("{:02}", date.second()),
            "SSS" => format!("{:03}", date.timestamp_subsec_millis()),
            "A" => meridiem.to_string(),
            "a" => meridiem.to_lowercase(),
            literal => literal
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
        }
    )
    .into_owned()
}

/// YEAR(date)
pub fn fn_year(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(f64::from(date_arg(args, 0)?.year())))
}

/// MONTH(date)
pub fn fn_month(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(f64::from(date_arg(args, 0)?.month())))
}

/// DAY(date)
pub fn fn_day(args: &[FormulaValue], _ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Number(f64::from(date_arg(args, 0)?.day())))
}

/// NOW()
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> EvalResult {
    Ok(FormulaValue::Date(ctx.now()))
}

/// TODAY() - midnight UTC of the current day
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> EvalResult {
    let midnight = ctx
        .now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or(FormulaError::Generic)?;
    Ok(FormulaValue::Date(Utc.from_utc_datetime(&midnight)))
}

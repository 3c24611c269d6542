//! Built-in formula functions

pub mod date;
pub mod logical;
pub mod math;
pub mod text;

use std::sync::OnceLock;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use fieldcalc_core::FormulaError;

use crate::evaluator::{EvalResult, EvaluationContext};
use crate::value::FormulaValue;

/// Function implementation signature
///
/// Arguments arrive fully evaluated; an argument that failed never reaches
/// the implementation.
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> EvalResult;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Result depends on the clock
    pub volatile: bool,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The process-wide registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Check if an (uppercase) identifier names a built-in function
pub fn is_function_name(name: &str) -> bool {
    registry().contains(name)
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_text_functions();
        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        match self.functions.get(name) {
            Some(def) => Some(def),
            None => self.functions.get(name.to_uppercase().as_str()),
        }
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn define(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        });
    }

    fn register_text_functions(&mut self) {
        self.define("CONCAT", 0, None, text::fn_concat);
        self.define("UPPER", 1, Some(1), text::fn_upper);
        self.define("LOWER", 1, Some(1), text::fn_lower);
        self.define("LEFT", 1, Some(2), text::fn_left);
        self.define("RIGHT", 1, Some(2), text::fn_right);
        self.define("MID", 3, Some(3), text::fn_mid);
        self.define("LEN", 1, Some(1), text::fn_len);
        self.define("TRIM", 1, Some(1), text::fn_trim);
        self.define("FIND", 2, Some(3), text::fn_find);
        self.define("SUBSTITUTE", 3, Some(4), text::fn_substitute);
        self.define("REPT", 2, Some(2), text::fn_rept);
    }

    fn register_math_functions(&mut self) {
        self.define("ROUND", 1, Some(2), math::fn_round);
        self.define("FLOOR", 1, Some(2), math::fn_floor);
        self.define("CEILING", 1, Some(2), math::fn_ceiling);
        self.define("ABS", 1, Some(1), math::fn_abs);
        self.define("MOD", 2, Some(2), math::fn_mod);
        self.define("SUM", 1, None, math::fn_sum);
        self.define("MIN", 1, None, math::fn_min);
        self.define("MAX", 1, None, math::fn_max);
        self.define("AVERAGE", 1, None, math::fn_average);
        self.define("VALUE", 1, Some(1), math::fn_value);
    }

    fn register_logical_functions(&mut self) {
        self.define("IF", 2, Some(3), logical::fn_if);
        self.define("SWITCH", 3, None, logical::fn_switch);
        self.define("BLANK", 0, Some(0), logical::fn_blank);
    }

    fn register_date_functions(&mut self) {
        self.define("DATEADD", 3, Some(3), date::fn_dateadd);
        self.define("DATETIME_DIFF", 2, Some(3), date::fn_datetime_diff);
        self.define("DATETIME_FORMAT", 1, Some(2), date::fn_datetime_format);
        self.define("YEAR", 1, Some(1), date::fn_year);
        self.define("MONTH", 1, Some(1), date::fn_month);
        self.define("DAY", 1, Some(1), date::fn_day);

        // NOW (volatile)
        self.register(FunctionDef {
            name: "NOW",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_now,
            volatile: true,
        });

        // TODAY (volatile)
        self.register(FunctionDef {
            name: "TODAY",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_today,
            volatile: true,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// === Argument helpers ===

/// Required numeric argument; text without a numeric reading is `#VALUE!`
pub(crate) fn number_arg(args: &[FormulaValue], index: usize) -> EvalResult<f64> {
    args.get(index)
        .ok_or(FormulaError::Generic)?
        .as_number()
        .ok_or(FormulaError::ValueTypeMismatch)
}

/// Optional numeric argument with a default when absent
pub(crate) fn optional_number_arg(
    args: &[FormulaValue],
    index: usize,
    default: f64,
) -> EvalResult<f64> {
    if index < args.len() {
        number_arg(args, index)
    } else {
        Ok(default)
    }
}

/// Argument as text (absent reads as empty)
pub(crate) fn text_arg(args: &[FormulaValue], index: usize) -> String {
    args.get(index).map(FormulaValue::as_string).unwrap_or_default()
}

/// Required date argument; an unparsable date is `#VALUE!`
pub(crate) fn date_arg(args: &[FormulaValue], index: usize) -> EvalResult<DateTime<Utc>> {
    args.get(index)
        .ok_or(FormulaError::Generic)?
        .as_date()
        .ok_or(FormulaError::ValueTypeMismatch)
}

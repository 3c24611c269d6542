//! Row calculation engine
//!
//! Computes every formula field of a row. Each formula is compiled once, then
//! evaluated against an accumulator row that starts as a copy of the input,
//! so a formula field can read formula fields computed before it in the same
//! pass. A field that fails to parse or evaluate stores its error and never
//! stops the fields after it.
//!
//! # Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let fields = vec![
//!     FieldDescriptor::new("Price", FieldType::Currency),
//!     FieldDescriptor::new("Qty", FieldType::Number),
//!     FieldDescriptor::formula("Subtotal", "{Price} * {Qty}"),
//!     FieldDescriptor::formula("Total", "ROUND({Subtotal} * 1.2, 2)"),
//! ];
//! let row: Row = vec![("Price", 9.99), ("Qty", 3.0)].into_iter().collect();
//!
//! let calculator = RowCalculator::new(&fields, CalculationOptions::default());
//! let computed = calculator.compute(&row);
//! assert_eq!(computed.row.get("Total"), Some(&FieldValue::Number(35.96)));
//! assert_eq!(computed.stats.fields_calculated, 2);
//! ```

use chrono::{DateTime, Utc};
use fieldcalc_formula::dependency::{DependencyGraph, FieldKey};

use crate::{
    evaluate, parse_formula, EvaluationContext, FieldDescriptor, FieldValue, FormulaError,
    FormulaExpr, Row,
};

/// Order in which formula fields are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationOrder {
    /// The order the formula fields are given in; a formula that reads a
    /// formula field declared after it sees that field's input value
    #[default]
    Declared,
    /// Formula fields are computed after the formula fields they reference;
    /// fields on a reference cycle compute to `#ERROR!`
    Dependency,
}

/// Options for row calculation
#[derive(Debug, Clone, Default)]
pub struct CalculationOptions {
    /// Formula field ordering
    pub order: EvaluationOrder,
    /// Clock for NOW() and TODAY(); the system clock is read once per row when unset
    pub now: Option<DateTime<Utc>>,
}

impl CalculationOptions {
    /// Compute formula fields in dependency order
    pub fn dependency_order(mut self) -> Self {
        self.order = EvaluationOrder::Dependency;
        self
    }

    /// Pin the clock seen by NOW() and TODAY()
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Statistics from computing one row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Number of formula fields
    pub formula_count: usize,
    /// Number of formulas evaluated
    pub fields_calculated: usize,
    /// Number of formula fields that produced an error
    pub errors: usize,
    /// Number of formula fields with blank formula text
    pub blank: usize,
    /// Number of formula fields on a reference cycle
    pub circular_references: usize,
}

/// A computed row and the statistics of its computation
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRow {
    pub row: Row,
    pub stats: CalculationStats,
}

/// A formula field compiled ahead of row computation
#[derive(Debug)]
enum CompiledFormula {
    /// Missing or whitespace-only formula text
    Blank,
    /// Formula text that does not parse
    Invalid,
    /// Parsed expression
    Parsed(FormulaExpr),
}

#[derive(Debug)]
struct CompiledField {
    name: String,
    formula: CompiledFormula,
    circular: bool,
}

/// Computes the formula fields of rows that share one field catalog
#[derive(Debug)]
pub struct RowCalculator {
    fields: Vec<FieldDescriptor>,
    /// Formula fields in evaluation order
    plan: Vec<CompiledField>,
    options: CalculationOptions,
}

impl RowCalculator {
    /// Create a calculator for every formula-typed field in the catalog
    pub fn new(fields: &[FieldDescriptor], options: CalculationOptions) -> Self {
        let formula_fields: Vec<FieldDescriptor> =
            fields.iter().filter(|f| f.is_formula()).cloned().collect();
        Self::with_formula_fields(&formula_fields, fields, options)
    }

    /// Create a calculator for an explicit list of formula fields
    pub fn with_formula_fields(
        formula_fields: &[FieldDescriptor],
        fields: &[FieldDescriptor],
        options: CalculationOptions,
    ) -> Self {
        let compiled = formula_fields.iter().map(compile_field).collect();

        let plan = match options.order {
            EvaluationOrder::Declared => compiled,
            EvaluationOrder::Dependency => dependency_plan(compiled),
        };

        Self {
            fields: fields.to_vec(),
            plan,
            options,
        }
    }

    /// Number of formula fields computed per row
    pub fn formula_count(&self) -> usize {
        self.plan.len()
    }

    /// Names of the formula fields in evaluation order
    pub fn evaluation_order(&self) -> impl Iterator<Item = &str> {
        self.plan.iter().map(|f| f.name.as_str())
    }

    /// Compute all formula fields of a row
    pub fn compute(&self, row: &Row) -> ComputedRow {
        let now = self.options.now.unwrap_or_else(Utc::now);
        let mut computed = row.clone();
        let mut stats = CalculationStats {
            formula_count: self.plan.len(),
            ..Default::default()
        };

        for field in &self.plan {
            let value = match &field.formula {
                CompiledFormula::Blank => {
                    stats.blank += 1;
                    FieldValue::Null
                }
                CompiledFormula::Invalid => FieldValue::Error(FormulaError::Generic),
                CompiledFormula::Parsed(_) if field.circular => {
                    stats.circular_references += 1;
                    FieldValue::Error(FormulaError::Generic)
                }
                CompiledFormula::Parsed(ast) => {
                    let ctx = EvaluationContext::new(&computed, &self.fields).with_now(now);
                    stats.fields_calculated += 1;
                    match evaluate(ast, &ctx) {
                        Ok(value) => value.into(),
                        Err(e) => FieldValue::Error(e),
                    }
                }
            };

            if let Some(error) = value.get_error() {
                log::debug!("formula field {:?} computed {}", field.name, error);
                stats.errors += 1;
            }
            computed.insert(field.name.clone(), value);
        }

        ComputedRow {
            row: computed,
            stats,
        }
    }
}

fn compile_field(field: &FieldDescriptor) -> CompiledField {
    let text = field.formula.as_deref().unwrap_or("");

    let formula = if text.trim().is_empty() {
        CompiledFormula::Blank
    } else {
        match parse_formula(text) {
            Ok(ast) => CompiledFormula::Parsed(ast),
            Err(e) => {
                log::debug!("formula field {:?} does not parse: {}", field.name, e);
                CompiledFormula::Invalid
            }
        }
    };

    CompiledField {
        name: field.name.clone(),
        formula,
        circular: false,
    }
}

/// Reorder compiled fields so referenced formula fields come first
fn dependency_plan(compiled: Vec<CompiledField>) -> Vec<CompiledField> {
    let graph = DependencyGraph::from_formulas(compiled.iter().filter_map(|f| match &f.formula {
        CompiledFormula::Parsed(ast) => Some((f.name.as_str(), ast)),
        _ => None,
    }));

    let keys: Vec<FieldKey> = compiled.iter().map(|f| FieldKey::new(&f.name)).collect();
    let order = graph.calculation_order(&keys);

    let mut pending: Vec<Option<CompiledField>> = compiled.into_iter().map(Some).collect();
    let mut plan = Vec::with_capacity(pending.len());

    for key in &order {
        let circular = graph.has_circular_reference(key);
        if circular {
            let readers: Vec<&str> = graph.get_dependents(key).map(FieldKey::as_str).collect();
            log::warn!(
                "formula field {:?} is part of a reference cycle (read by {:?})",
                key.as_str(),
                readers
            );
        }

        for (slot, slot_key) in pending.iter_mut().zip(&keys) {
            if slot_key != key {
                continue;
            }
            if let Some(mut field) = slot.take() {
                field.circular = circular;
                plan.push(field);
            }
        }
    }

    plan
}

/// Compute formula fields in the given order
///
/// Returns a copy of `row` with every formula field's value (or error) added.
/// Blank formulas produce null; formulas that fail to parse produce `#ERROR!`.
pub fn compute_formula_fields(
    row: &Row,
    formula_fields: &[FieldDescriptor],
    fields: &[FieldDescriptor],
) -> Row {
    RowCalculator::with_formula_fields(formula_fields, fields, CalculationOptions::default())
        .compute(row)
        .row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;
    use pretty_assertions::assert_eq;

    fn catalog() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("Qty", FieldType::Number),
            FieldDescriptor::formula("Double", "{Qty} * 2"),
            FieldDescriptor::formula("Quad", "{Double} * 2"),
        ]
    }

    fn row() -> Row {
        vec![("Qty", 3.0)].into_iter().collect()
    }

    #[test]
    fn test_compute_declared_order() {
        let computed = RowCalculator::new(&catalog(), CalculationOptions::default()).compute(&row());
        assert_eq!(computed.row.get("Double"), Some(&FieldValue::Number(6.0)));
        assert_eq!(computed.row.get("Quad"), Some(&FieldValue::Number(12.0)));
        assert_eq!(
            computed.stats,
            CalculationStats {
                formula_count: 2,
                fields_calculated: 2,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_input_row_is_not_modified() {
        let input = row();
        let _ = compute_formula_fields(&input, &catalog()[1..], &catalog());
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_dependency_order_plan() {
        let fields = vec![
            FieldDescriptor::new("Qty", FieldType::Number),
            FieldDescriptor::formula("Quad", "{Double} * 2"),
            FieldDescriptor::formula("Double", "{Qty} * 2"),
        ];
        let calculator = RowCalculator::new(&fields, CalculationOptions::default().dependency_order());
        assert_eq!(
            calculator.evaluation_order().collect::<Vec<_>>(),
            vec!["Double", "Quad"]
        );
    }

    #[test]
    fn test_blank_and_invalid_formulas() {
        let fields = vec![
            FieldDescriptor::formula("Empty", "   "),
            FieldDescriptor::new("Unset", FieldType::Formula),
            FieldDescriptor::formula("Broken", "1 +"),
        ];
        let computed = RowCalculator::new(&fields, CalculationOptions::default()).compute(&Row::new());
        assert_eq!(computed.row.get("Empty"), Some(&FieldValue::Null));
        assert_eq!(computed.row.get("Unset"), Some(&FieldValue::Null));
        assert_eq!(
            computed.row.get("Broken"),
            Some(&FieldValue::Error(FormulaError::Generic))
        );
        assert_eq!(computed.stats.blank, 2);
        assert_eq!(computed.stats.errors, 1);
        assert_eq!(computed.stats.fields_calculated, 0);
    }
}

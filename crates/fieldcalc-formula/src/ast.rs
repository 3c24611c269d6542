//! Formula Abstract Syntax Tree types

use std::fmt;

use ahash::AHashSet;

use crate::functions;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal (TRUE / FALSE)
    Boolean(bool),

    // === References ===
    /// Field reference, braced (`{Unit Price}`) or bare (`Qty`)
    FieldReference(String),

    // === Operators ===
    /// Prefix operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },
    /// Arithmetic or comparison operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Short-circuiting AND / OR
    LogicalOp {
        op: LogicalOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Names of every field this expression references, in first-seen order
    ///
    /// Names are deduplicated case-insensitively; the first spelling wins.
    pub fn field_references(&self) -> Vec<String> {
        let mut seen = AHashSet::new();
        let mut refs = Vec::new();
        self.collect_field_references(&mut seen, &mut refs);
        refs
    }

    /// Whether the expression calls a function whose result depends on the clock
    pub fn is_volatile(&self) -> bool {
        match self {
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::FieldReference(_) => false,
            FormulaExpr::UnaryOp { operand, .. } => operand.is_volatile(),
            FormulaExpr::BinaryOp { left, right, .. } | FormulaExpr::LogicalOp { left, right, .. } => {
                left.is_volatile() || right.is_volatile()
            }
            FormulaExpr::Function { name, args } => {
                functions::registry().get(name).map_or(false, |f| f.volatile)
                    || args.iter().any(FormulaExpr::is_volatile)
            }
        }
    }

    fn collect_field_references(&self, seen: &mut AHashSet<String>, refs: &mut Vec<String>) {
        match self {
            FormulaExpr::Number(_) | FormulaExpr::String(_) | FormulaExpr::Boolean(_) => {}
            FormulaExpr::FieldReference(name) => {
                if seen.insert(name.to_lowercase()) {
                    refs.push(name.clone());
                }
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_field_references(seen, refs),
            FormulaExpr::BinaryOp { left, right, .. } | FormulaExpr::LogicalOp { left, right, .. } => {
                left.collect_field_references(seen, refs);
                right.collect_field_references(seen, refs);
            }
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_field_references(seen, refs);
                }
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    /// `=`
    Equal,
    /// `==`
    StrictEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    /// Operator from its source symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "=" => BinaryOperator::Equal,
            "==" => BinaryOperator::StrictEqual,
            "!=" => BinaryOperator::NotEqual,
            "<" => BinaryOperator::LessThan,
            "<=" => BinaryOperator::LessEqual,
            ">" => BinaryOperator::GreaterThan,
            ">=" => BinaryOperator::GreaterEqual,
            _ => return None,
        })
    }

    /// Source symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::StrictEqual => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    /// Binding strength; higher binds tighter. All operators are left-associative.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::StrictEqual
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 3,
            BinaryOperator::Add | BinaryOperator::Subtract => 4,
            BinaryOperator::Multiply | BinaryOperator::Divide => 5,
        }
    }

    /// Check if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical (short-circuiting) operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// Binding strength; OR binds loosest of all operators
    pub fn precedence(&self) -> u8 {
        match self {
            LogicalOperator::Or => 1,
            LogicalOperator::And => 2,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(name: &str) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::FieldReference(name.into()))
    }

    #[test]
    fn test_precedence_table() {
        assert!(LogicalOperator::Or.precedence() < LogicalOperator::And.precedence());
        assert!(LogicalOperator::And.precedence() < BinaryOperator::Equal.precedence());
        assert!(BinaryOperator::GreaterEqual.precedence() < BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Subtract.precedence() < BinaryOperator::Divide.precedence());
        assert!(BinaryOperator::NotEqual.is_comparison());
        assert!(!BinaryOperator::Multiply.is_comparison());
    }

    #[test]
    fn test_symbol_round_trip() {
        for symbol in ["+", "-", "*", "/", "=", "==", "!=", "<", "<=", ">", ">="] {
            let op = BinaryOperator::from_symbol(symbol).unwrap();
            assert_eq!(op.symbol(), symbol);
        }
        assert_eq!(BinaryOperator::from_symbol("<>"), None);
    }

    #[test]
    fn test_field_references_dedup() {
        let expr = FormulaExpr::Function {
            name: "IF".into(),
            args: vec![
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::GreaterThan,
                    left: field("Qty"),
                    right: Box::new(FormulaExpr::Number(0.0)),
                },
                FormulaExpr::LogicalOp {
                    op: LogicalOperator::And,
                    left: field("qty"),
                    right: field("Price"),
                },
                FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: field("Discount"),
                },
            ],
        };

        assert_eq!(expr.field_references(), vec!["Qty", "Price", "Discount"]);
    }

    #[test]
    fn test_is_volatile() {
        let parse = |text: &str| crate::parser::parse_formula(text).unwrap();

        assert!(parse("NOW()").is_volatile());
        assert!(parse("DATETIME_DIFF({Due}, TODAY(), \"days\") > 3").is_volatile());
        assert!(parse("NOT YEAR(NOW()) = 2024").is_volatile());
        assert!(!parse("{Qty} * 2").is_volatile());
        assert!(!parse("NOPE(1)").is_volatile());
    }
}

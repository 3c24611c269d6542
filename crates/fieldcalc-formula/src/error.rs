//! Formula syntax errors
//!
//! Structural problems (a formula that cannot be compiled at all) are reported
//! through [`SyntaxError`]. Row-level evaluation failures never use this type;
//! they are [`FormulaError`](fieldcalc_core::FormulaError) sentinels.

use thiserror::Error;

/// Result type for tokenizing and parsing
pub type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Errors that can occur while tokenizing or parsing a formula
///
/// Positions are byte offsets into the formula text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    /// No token rule matches the character
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    /// `{` without a matching `}`
    #[error("Unterminated field reference starting at position {position}")]
    UnterminatedFieldReference { position: usize },

    /// Formula is empty or only whitespace
    #[error("Formula is empty")]
    EmptyFormula,

    /// Token cannot start or continue an expression here
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    /// Formula ended in the middle of an expression
    #[error("Unexpected end of formula at position {position}")]
    UnexpectedEnd { position: usize },

    /// A specific token was required
    #[error("Expected {expected} but found '{found}' at position {position}")]
    ExpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },

    /// A complete expression was followed by more tokens
    #[error("Unexpected token '{token}' after expression at position {position}")]
    TrailingToken { token: String, position: usize },
}

impl SyntaxError {
    /// Byte offset of the failure (0 for an empty formula)
    pub fn position(&self) -> usize {
        match self {
            SyntaxError::EmptyFormula => 0,
            SyntaxError::UnexpectedCharacter { position, .. }
            | SyntaxError::UnterminatedFieldReference { position }
            | SyntaxError::UnexpectedToken { position, .. }
            | SyntaxError::UnexpectedEnd { position }
            | SyntaxError::ExpectedToken { position, .. }
            | SyntaxError::TrailingToken { position, .. } => *position,
        }
    }

    /// Check if this is the dedicated empty-formula error
    pub fn is_empty_formula(&self) -> bool {
        matches!(self, SyntaxError::EmptyFormula)
    }
}

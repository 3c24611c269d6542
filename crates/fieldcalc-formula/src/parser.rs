//! Formula parser
//!
//! A precedence-climbing parser over the token list produced by the tokenizer.
//! Binary and logical operators are resolved by threading a minimum precedence
//! through [`FormulaParser::parse_expression`]; primaries (literals, references,
//! calls, groups, prefix operators) are handled by recursive descent.
//!
//! Precedence (lowest to highest), all left-associative:
//! 1. `OR`
//! 2. `AND`
//! 3. Comparison: `= == != < > <= >=`
//! 4. Additive: `+ -`
//! 5. Multiplicative: `* /`
//!
//! Prefix `-` and `NOT` bind tighter than any binary operator.

use crate::ast::{BinaryOperator, FormulaExpr, LogicalOperator, UnaryOperator};
use crate::error::{ParseResult, SyntaxError};
use crate::tokenizer::{tokenize, LogicalKeyword, Token, TokenKind};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use fieldcalc_formula::parse_formula;
///
/// let ast = parse_formula("1 + 2").unwrap();
/// let ast = parse_formula("IF({Qty} > 0, \"Yes\", \"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> ParseResult<FormulaExpr> {
    let tokens = tokenize(formula)?;
    parse(&tokens)
}

/// Check a formula for syntax errors without evaluating it
pub fn validate_formula(formula: &str) -> ParseResult<()> {
    parse_formula(formula).map(|_| ())
}

/// Parse a token list (terminated by an end token) into an AST
pub fn parse(tokens: &[Token]) -> ParseResult<FormulaExpr> {
    let mut parser = FormulaParser::new(tokens);

    if parser.current().is_end() {
        return Err(SyntaxError::EmptyFormula);
    }

    let expr = parser.parse_expression(1)?;

    // Make sure we consumed all input
    let trailing = parser.current();
    if !trailing.is_end() {
        return Err(SyntaxError::TrailingToken {
            token: trailing.text.clone(),
            position: trailing.position,
        });
    }

    Ok(expr)
}

/// Infix operator as seen by the precedence loop
enum InfixOperator {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

impl InfixOperator {
    fn precedence(&self) -> u8 {
        match self {
            InfixOperator::Binary(op) => op.precedence(),
            InfixOperator::Logical(op) => op.precedence(),
        }
    }
}

struct FormulaParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let end_position = tokens
            .last()
            .map(|t| t.position + t.text.len())
            .unwrap_or(0);
        Self {
            tokens,
            pos: 0,
            end: Token {
                kind: TokenKind::End,
                text: String::new(),
                position: end_position,
            },
        }
    }

    // === Token cursor ===

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.end)
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&self.end)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: &TokenKind, description: &'static str) -> ParseResult<()> {
        let token = self.current();
        if &token.kind == expected {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::ExpectedToken {
                expected: description,
                found: token.to_string(),
                position: token.position,
            })
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.current();
        if token.is_end() {
            SyntaxError::UnexpectedEnd {
                position: token.position,
            }
        } else {
            SyntaxError::UnexpectedToken {
                token: token.text.clone(),
                position: token.position,
            }
        }
    }

    fn current_infix(&self) -> Option<InfixOperator> {
        match &self.current().kind {
            TokenKind::Operator(op) => Some(InfixOperator::Binary(*op)),
            TokenKind::Logical(LogicalKeyword::And) => {
                Some(InfixOperator::Logical(LogicalOperator::And))
            }
            TokenKind::Logical(LogicalKeyword::Or) => {
                Some(InfixOperator::Logical(LogicalOperator::Or))
            }
            _ => None,
        }
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self, min_precedence: u8) -> ParseResult<FormulaExpr> {
        let mut left = self.parse_primary()?;

        while let Some(op) = self.current_infix() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }

            self.advance();
            // precedence + 1 keeps every operator left-associative
            let right = self.parse_expression(precedence + 1)?;

            left = match op {
                InfixOperator::Binary(op) => FormulaExpr::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                InfixOperator::Logical(op) => FormulaExpr::LogicalOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> ParseResult<FormulaExpr> {
        match self.current().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(FormulaExpr::Number(n))
            }

            TokenKind::String(s) => {
                self.advance();
                Ok(FormulaExpr::String(s))
            }

            TokenKind::Boolean(b) => {
                self.advance();
                Ok(FormulaExpr::Boolean(b))
            }

            TokenKind::FieldReference { name, braced } => {
                // A bare identifier followed by '(' is a call to a function we don't know
                if !braced && self.peek(1).kind == TokenKind::LParen {
                    self.advance();
                    return self.parse_function_call(name.to_uppercase());
                }
                self.advance();
                Ok(FormulaExpr::FieldReference(name))
            }

            TokenKind::FunctionName(name) => {
                self.advance();
                self.parse_function_call(name)
            }

            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression(1)?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }

            TokenKind::Operator(BinaryOperator::Subtract) => {
                self.advance();
                let operand = self.parse_primary()?;
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }

            TokenKind::Logical(LogicalKeyword::Not) => {
                self.advance();
                let operand = self.parse_primary()?;
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }

            TokenKind::Logical(LogicalKeyword::And) if self.peek(1).kind == TokenKind::LParen => {
                self.advance();
                self.parse_logical_call(LogicalOperator::And)
            }

            TokenKind::Logical(LogicalKeyword::Or) if self.peek(1).kind == TokenKind::LParen => {
                self.advance();
                self.parse_logical_call(LogicalOperator::Or)
            }

            _ => Err(self.unexpected()),
        }
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<FormulaExpr>> {
        self.expect(&TokenKind::LParen, "'('")?;

        let mut args = Vec::new();

        if self.current().kind != TokenKind::RParen {
            args.push(self.parse_expression(1)?);

            while self.current().kind == TokenKind::Comma {
                self.advance();
                args.push(self.parse_expression(1)?);
            }
        }

        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_function_call(&mut self, name: String) -> ParseResult<FormulaExpr> {
        let args = self.parse_arguments()?;
        Ok(FormulaExpr::Function { name, args })
    }

    /// `AND(a, b, c)` becomes `(a AND b) AND c`
    fn parse_logical_call(&mut self, op: LogicalOperator) -> ParseResult<FormulaExpr> {
        let open_position = self.current().position;
        let mut args = self.parse_arguments()?.into_iter();

        let first = args.next().ok_or_else(|| SyntaxError::UnexpectedToken {
            token: ")".to_string(),
            position: open_position + 1,
        })?;

        // A lone argument is combined with the operator's identity
        let second = args.next().unwrap_or(FormulaExpr::Boolean(op == LogicalOperator::And));

        let mut expr = FormulaExpr::LogicalOp {
            op,
            left: Box::new(first),
            right: Box::new(second),
        };
        for arg in args {
            expr = FormulaExpr::LogicalOp {
                op,
                left: Box::new(expr),
                right: Box::new(arg),
            };
        }

        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::Number(n))
    }

    fn field(name: &str) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::FieldReference(name.into()))
    }

    fn binary(op: BinaryOperator, left: Box<FormulaExpr>, right: Box<FormulaExpr>) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::BinaryOp { op, left, right })
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(
            parse_formula("\"Hello\"").unwrap(),
            FormulaExpr::String("Hello".into())
        );
        assert_eq!(parse_formula("TRUE").unwrap(), FormulaExpr::Boolean(true));
    }

    #[test]
    fn test_parse_precedence() {
        // 2 + (3 * 4)
        assert_eq!(
            parse_formula("2 + 3 * 4").unwrap(),
            *binary(
                BinaryOperator::Add,
                num(2.0),
                binary(BinaryOperator::Multiply, num(3.0), num(4.0))
            )
        );

        // (2 + 3) * 4
        assert_eq!(
            parse_formula("(2 + 3) * 4").unwrap(),
            *binary(
                BinaryOperator::Multiply,
                binary(BinaryOperator::Add, num(2.0), num(3.0)),
                num(4.0)
            )
        );
    }

    #[test]
    fn test_parse_left_associativity() {
        assert_eq!(
            parse_formula("10 - 3 - 2").unwrap(),
            *binary(
                BinaryOperator::Subtract,
                binary(BinaryOperator::Subtract, num(10.0), num(3.0)),
                num(2.0)
            )
        );
        assert_eq!(
            parse_formula("8 / 4 / 2").unwrap(),
            *binary(
                BinaryOperator::Divide,
                binary(BinaryOperator::Divide, num(8.0), num(4.0)),
                num(2.0)
            )
        );
    }

    #[test]
    fn test_parse_comparison_below_arithmetic() {
        assert_eq!(
            parse_formula("{a} + 1 >= {b} * 2").unwrap(),
            *binary(
                BinaryOperator::GreaterEqual,
                binary(BinaryOperator::Add, field("a"), num(1.0)),
                binary(BinaryOperator::Multiply, field("b"), num(2.0))
            )
        );
    }

    #[test]
    fn test_parse_logical_precedence() {
        // a OR (b AND c)
        let ast = parse_formula("a OR b AND c").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::LogicalOp {
                op: LogicalOperator::Or,
                left: field("a"),
                right: Box::new(FormulaExpr::LogicalOp {
                    op: LogicalOperator::And,
                    left: field("b"),
                    right: field("c"),
                }),
            }
        );

        // (x > 1) AND (y < 2)
        let ast = parse_formula("x > 1 AND y < 2").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::LogicalOp {
                op: LogicalOperator::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(
            parse_formula("-5").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: num(5.0),
            }
        );

        // Unary minus binds tighter than multiplication: (-2) * 3
        assert_eq!(
            parse_formula("-2 * 3").unwrap(),
            *binary(
                BinaryOperator::Multiply,
                Box::new(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: num(2.0),
                }),
                num(3.0)
            )
        );

        assert_eq!(
            parse_formula("--1").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: num(1.0),
                }),
            }
        );
    }

    #[test]
    fn test_parse_not() {
        let expected = FormulaExpr::UnaryOp {
            op: UnaryOperator::Not,
            operand: field("Done"),
        };
        assert_eq!(parse_formula("NOT {Done}").unwrap(), expected);
        assert_eq!(parse_formula("NOT({Done})").unwrap(), expected);
    }

    #[test]
    fn test_parse_function() {
        let ast = parse_formula("concat(\"a\", {b}, 3)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "CONCAT");
            assert_eq!(args.len(), 3);
        } else {
            panic!("Expected Function");
        }

        assert_eq!(
            parse_formula("NOW()").unwrap(),
            FormulaExpr::Function {
                name: "NOW".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_parse_nested_function() {
        let ast = parse_formula("IF(LEN({Name}) > 3, UPPER({Name}), LOWER({Name}))").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "IF");
            assert_eq!(args.len(), 3);
            assert!(matches!(&args[1], FormulaExpr::Function { name, .. } if name == "UPPER"));
        } else {
            panic!("Expected Function");
        }
    }

    #[test]
    fn test_parse_unknown_function_call() {
        assert_eq!(
            parse_formula("NOPE(1, 2)").unwrap(),
            FormulaExpr::Function {
                name: "NOPE".into(),
                args: vec![FormulaExpr::Number(1.0), FormulaExpr::Number(2.0)],
            }
        );
    }

    #[test]
    fn test_parse_logical_call_form() {
        assert_eq!(
            parse_formula("OR(a, b, c)").unwrap(),
            FormulaExpr::LogicalOp {
                op: LogicalOperator::Or,
                left: Box::new(FormulaExpr::LogicalOp {
                    op: LogicalOperator::Or,
                    left: field("a"),
                    right: field("b"),
                }),
                right: field("c"),
            }
        );

        assert_eq!(
            parse_formula("AND(a)").unwrap(),
            FormulaExpr::LogicalOp {
                op: LogicalOperator::And,
                left: field("a"),
                right: Box::new(FormulaExpr::Boolean(true)),
            }
        );

        assert!(matches!(
            parse_formula("AND()"),
            Err(SyntaxError::UnexpectedToken { position: 4, .. })
        ));
    }

    #[test]
    fn test_parse_empty_formula() {
        assert_eq!(parse_formula(""), Err(SyntaxError::EmptyFormula));
        assert_eq!(parse_formula("   "), Err(SyntaxError::EmptyFormula));
        assert_eq!(validate_formula(""), Err(SyntaxError::EmptyFormula));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_formula("1 +"),
            Err(SyntaxError::UnexpectedEnd { position: 3 })
        );
        assert_eq!(
            parse_formula("(1 + 2"),
            Err(SyntaxError::ExpectedToken {
                expected: "')'",
                found: "end of formula".into(),
                position: 6,
            })
        );
        assert_eq!(
            parse_formula("1 2"),
            Err(SyntaxError::TrailingToken {
                token: "2".into(),
                position: 2,
            })
        );
        assert_eq!(
            parse_formula("* 2"),
            Err(SyntaxError::UnexpectedToken {
                token: "*".into(),
                position: 0,
            })
        );
        assert!(matches!(
            parse_formula("UPPER"),
            Err(SyntaxError::ExpectedToken { expected: "'('", .. })
        ));
        assert!(matches!(
            parse_formula("IF(1,,2)"),
            Err(SyntaxError::UnexpectedToken { position: 5, .. })
        ));
    }

    #[test]
    fn test_validate_formula() {
        assert_eq!(validate_formula("{Qty} * 2"), Ok(()));

        let err = validate_formula("{Qty} * * 2").unwrap_err();
        assert_eq!(err.position(), 8);
        assert_eq!(err.to_string(), "Unexpected token '*' at position 8");
    }

    #[test]
    fn test_parse_pre_tokenized() {
        let tokens = tokenize("{a} = 'x'").unwrap();
        assert_eq!(
            parse(&tokens).unwrap(),
            *binary(
                BinaryOperator::Equal,
                field("a"),
                Box::new(FormulaExpr::String("x".into()))
            )
        );
        // A token list without an explicit end token is still terminated
        assert_eq!(parse(&tokens[..1]).unwrap(), *field("a"));
        assert_eq!(parse(&[]), Err(SyntaxError::EmptyFormula));
    }
}

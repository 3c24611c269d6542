//! Formula tokenizer
//!
//! Scans formula text into a flat list of [`Token`]s terminated by a single
//! [`TokenKind::End`]. Every token keeps its exact source lexeme and byte
//! offset so diagnostics can point at it.
//!
//! Recognized lexemes:
//! - Numbers: digits with at most one decimal point (`42`, `3.5`, `.5`)
//! - Strings: `"..."` or `'...'` with `\n`, `\t` and pass-through escapes
//! - Field references: `{Any Text}`, trimmed
//! - Operators: `+ - * / = == != < <= > >=`
//! - Keywords: `AND OR NOT TRUE FALSE` and function names (case-insensitive)
//! - Any other identifier is a bare field reference

use std::fmt;

use crate::ast::BinaryOperator;
use crate::error::{ParseResult, SyntaxError};
use crate::functions;

/// Logical keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKeyword {
    And,
    Or,
    Not,
}

/// Token classification and decoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    /// Unescaped string contents
    String(String),
    /// `braced` is false for the bare-identifier fallback
    FieldReference { name: String, braced: bool },
    Operator(BinaryOperator),
    Logical(LogicalKeyword),
    Boolean(bool),
    /// Uppercased function name
    FunctionName(String),
    LParen,
    RParen,
    Comma,
    End,
}

/// A single token with its source lexeme and byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    /// Check if this is the end-of-input token
    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::End => write!(f, "end of formula"),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// Tokenize a formula
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{tokenize, TokenKind};
///
/// let tokens = tokenize("{Qty} >= 2").unwrap();
/// assert_eq!(tokens.len(), 4);
/// assert_eq!(tokens[1].text, ">=");
/// assert_eq!(tokens[3].kind, TokenKind::End);
/// ```
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(input);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.next_token()?;
        let done = token.is_end();
        tokens.push(token);
        if done {
            break;
        }
    }

    Ok(tokens)
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();

        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(self.token(TokenKind::End, start)),
        };

        match c {
            '(' => {
                self.advance();
                Ok(self.token(TokenKind::LParen, start))
            }
            ')' => {
                self.advance();
                Ok(self.token(TokenKind::RParen, start))
            }
            ',' => {
                self.advance();
                Ok(self.token(TokenKind::Comma, start))
            }
            '{' => self.scan_field_reference(),
            '"' | '\'' => Ok(self.scan_string(c)),
            // Two-character operators must be checked before single-character ones
            '>' | '<' | '=' | '!' if self.peek_char_at(1) == Some('=') => {
                self.advance();
                self.advance();
                self.operator(start)
            }
            '>' | '<' | '=' | '+' | '-' | '*' | '/' => {
                self.advance();
                self.operator(start)
            }
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_identifier()),
            _ => Err(SyntaxError::UnexpectedCharacter {
                character: c,
                position: start,
            }),
        }
    }

    fn operator(&self, start: usize) -> ParseResult<Token> {
        let symbol = &self.input[start..self.pos];
        let op = BinaryOperator::from_symbol(symbol).ok_or_else(|| {
            SyntaxError::UnexpectedToken {
                token: symbol.to_string(),
                position: start,
            }
        })?;
        Ok(self.token(TokenKind::Operator(op), start))
    }

    fn scan_number(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        let mut seen_dot = false;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        let value: f64 = text.parse().map_err(|_| SyntaxError::UnexpectedToken {
            token: text.to_string(),
            position: start,
        })?;
        Ok(self.token(TokenKind::Number(value), start))
    }

    fn scan_string(&mut self, quote: char) -> Token {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    log::debug!("unterminated string starting at position {}", start);
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => s.push(other),
                        None => break,
                    }
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }

        self.token(TokenKind::String(s), start)
    }

    fn scan_field_reference(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        let body_start = start + 1;

        let close = self.input[body_start..]
            .find('}')
            .ok_or(SyntaxError::UnterminatedFieldReference { position: start })?;

        let name = self.input[body_start..body_start + close].trim().to_string();
        self.pos = body_start + close + 1;

        Ok(self.token(TokenKind::FieldReference { name, braced: true }, start))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        let upper = text.to_uppercase();

        let kind = match upper.as_str() {
            "AND" => TokenKind::Logical(LogicalKeyword::And),
            "OR" => TokenKind::Logical(LogicalKeyword::Or),
            "NOT" => TokenKind::Logical(LogicalKeyword::Not),
            "TRUE" => TokenKind::Boolean(true),
            "FALSE" => TokenKind::Boolean(false),
            _ if functions::is_function_name(&upper) => TokenKind::FunctionName(upper),
            // Unbraced identifiers fall back to field references
            _ => TokenKind::FieldReference {
                name: text.to_string(),
                braced: false,
            },
        };

        self.token(kind, start)
    }

    // === Helper methods ===

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.input[start..self.pos].to_string(),
            position: start,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

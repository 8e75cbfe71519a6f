// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric expression language.
//!
//! ```text
//! expr   := term   (('+'|'-') term)*
//! term   := factor (('*'|'/') factor)*
//! factor := number | ident | '(' expr ')'
//! ident  := [A-Za-z_][A-Za-z0-9_]*
//! number := [-]?[0-9]+('.'[0-9]+)?
//! ```
//!
//! Recursive descent, left-associative within a precedence level. The only
//! parser state is a cursor into the token stream; evaluation is a straight
//! fold over the tree.

use thiserror::Error;

use crate::provider::MetricSource;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Metric(String),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parse and evaluation errors. Positions are byte offsets into the input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number {raw:?} at position {pos}")]
    InvalidNumber { raw: String, pos: usize },

    #[error("expected {expected} at position {pos}")]
    Expected { expected: &'static str, pos: usize },

    #[error("unterminated parenthesis opened at position {pos}")]
    UnterminatedParen { pos: usize },

    #[error("unexpected trailing input at position {pos}")]
    TrailingInput { pos: usize },

    #[error("empty expression")]
    Empty,

    #[error("division by zero")]
    DivisionByZero,

    #[error("metric not available: {0}")]
    MetricNotAvailable(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Expr {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, cursor: 0, input_len: input.len() };
        let expr = parser.parse_expr()?;
        if let Some((_, pos)) = parser.peek() {
            return Err(ExprError::TrailingInput { pos });
        }
        Ok(expr)
    }

    /// Evaluate against a metric provider. Fails on division by zero or a
    /// metric the provider cannot supply.
    pub fn eval(&self, source: &dyn MetricSource) -> Result<f64, ExprError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Metric(name) => {
                source.get(name).ok_or_else(|| ExprError::MetricNotAvailable(name.clone()))
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = lhs.eval(source)?;
                let right = rhs.eval(source)?;
                match op {
                    BinOp::Add => Ok(left + right),
                    BinOp::Sub => Ok(left - right),
                    BinOp::Mul => Ok(left * right),
                    BinOp::Div => {
                        if right == 0.0 {
                            Err(ExprError::DivisionByZero)
                        } else {
                            Ok(left / right)
                        }
                    }
                }
            }
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        match ch {
            ' ' | '\t' | '\n' | '\r' => pos += 1,
            '+' => {
                tokens.push((Token::Plus, pos));
                pos += 1;
            }
            '-' => {
                tokens.push((Token::Minus, pos));
                pos += 1;
            }
            '*' => {
                tokens.push((Token::Star, pos));
                pos += 1;
            }
            '/' => {
                tokens.push((Token::Slash, pos));
                pos += 1;
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                pos += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                pos += 1;
            }
            '0'..='9' => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos < bytes.len() && bytes[pos] == b'.' {
                    pos += 1;
                    let frac_start = pos;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    if pos == frac_start {
                        return Err(ExprError::InvalidNumber {
                            raw: input[start..pos].to_string(),
                            pos: start,
                        });
                    }
                }
                let raw = &input[start..pos];
                let value = raw.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
                    raw: raw.to_string(),
                    pos: start,
                })?;
                tokens.push((Token::Number(value), start));
            }
            'A'..='Z' | 'a'..='z' | '_' => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                tokens.push((Token::Ident(input[start..pos].to_string()), start));
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.cursor).map(|(token, pos)| (token, *pos))
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_term()?;
        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_factor()?;
        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((Token::Number(value), _)) => Ok(Expr::Number(value)),
            Some((Token::Ident(name), _)) => Ok(Expr::Metric(name)),
            // Grammar allows a sign on number literals only.
            Some((Token::Minus, pos)) => match self.advance() {
                Some((Token::Number(value), _)) => Ok(Expr::Number(-value)),
                _ => Err(ExprError::Expected { expected: "number after '-'", pos }),
            },
            Some((Token::LParen, open_pos)) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    _ => Err(ExprError::UnterminatedParen { pos: open_pos }),
                }
            }
            Some((_, pos)) => Err(ExprError::Expected { expected: "number, metric, or '('", pos }),
            None => {
                Err(ExprError::Expected { expected: "number, metric, or '('", pos: self.input_len })
            }
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;

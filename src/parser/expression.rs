//! Precedence-climbing expression parser driven by the operator registry.

use super::Parser;
use crate::ast::Expr;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::operator::BinOp;
use crate::value::Value;

impl<'r> Parser<'r> {
    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_expression_with(0)
    }

    /// Parses an expression whose binary operators all bind at least as
    /// tightly as `min_precedence`.
    pub fn parse_expression_with(&mut self, min_precedence: u32) -> Result<Expr> {
        let registry = self.registry;
        let token = self.stream.current();
        let unary = match token.kind {
            TokenKind::Operator => registry.unary_operator(&token.text),
            _ => None,
        };

        let mut left = match unary {
            Some(op) => {
                self.stream.next();
                let operand = self.parse_expression_with(op.precedence)?;
                Expr::Unary(op.kind, Box::new(operand))
            }
            None => self.parse_primary()?,
        };

        loop {
            let token = self.stream.current();
            if token.kind != TokenKind::Operator {
                break;
            }
            let Some(op) = registry.binary_operator(&token.text) else {
                return Err(self.stream.error(format!("unknown binary operator '{}'", token.text)));
            };
            if op.precedence < min_precedence {
                break;
            }
            self.stream.next();

            left = if op.kind.is_test() {
                self.parse_test(left, op.kind == BinOp::IsNot)?
            } else {
                let right = self.parse_expression_with(op.rhs_precedence())?;
                Expr::BinOp(Box::new(left), op.kind.clone(), Box::new(right))
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.stream.next();
        let expr = match token.kind {
            TokenKind::Number => Expr::Literal(self.parse_number(&token)?),
            TokenKind::String => Expr::Literal(Value::String(token.text)),
            TokenKind::Name => match token.text.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "none" => Expr::Literal(Value::Null),
                _ => Expr::Name(token.text.clone()),
            },
            TokenKind::Punctuation if token.text == "(" => {
                let inner = self.parse_expression()?;
                self.stream.expect_value(TokenKind::Punctuation, ")")?;
                inner
            }
            TokenKind::Punctuation if token.text == "[" => self.parse_array()?,
            TokenKind::Punctuation if token.text == "{" => self.parse_map()?,
            _ => return Err(self.error_at(format!("unexpected {token}"), token.line)),
        };

        self.parse_postfix(expr)
    }

    /// Attribute, subscript, call and filter suffixes, applied left to right.
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if !self.stream.test(TokenKind::Punctuation) {
                break;
            }
            let punct = self.stream.current().text.clone();
            match punct.as_str() {
                "." => {
                    self.stream.next();
                    let attr = self.stream.expect(TokenKind::Name)?;
                    expr = Expr::Attribute(Box::new(expr), attr.text);
                }
                "[" => {
                    self.stream.next();
                    let index = self.parse_expression()?;
                    self.stream.expect_value(TokenKind::Punctuation, "]")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                "(" if matches!(expr, Expr::Name(_) | Expr::Attribute(..)) => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                "|" => {
                    self.stream.next();
                    let name = self.stream.expect(TokenKind::Name)?;
                    if self.registry.filter(&name.text).is_none() {
                        return Err(self.error_at(format!("unknown filter '{}'", name.text), name.line));
                    }
                    let args = if self.stream.test_value(TokenKind::Punctuation, "(") {
                        self.parse_arguments()?
                    } else {
                        Vec::new()
                    };
                    expr = Expr::Filter {
                        input: Box::new(expr),
                        name: name.text,
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_test(&mut self, input: Expr, negated: bool) -> Result<Expr> {
        let name = self.stream.expect(TokenKind::Name)?;
        if self.registry.test(&name.text).is_none() {
            return Err(self.error_at(format!("unknown test '{}'", name.text), name.line));
        }
        let args = if self.stream.test_value(TokenKind::Punctuation, "(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::Test {
            input: Box::new(input),
            name: name.text,
            args,
            negated,
        })
    }

    /// `( expr, expr, ... )`, with the stream on the opening parenthesis.
    pub fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.stream.expect_value(TokenKind::Punctuation, "(")?;
        self.parse_sequence(")")
    }

    fn parse_array(&mut self) -> Result<Expr> {
        Ok(Expr::Array(self.parse_sequence("]")?))
    }

    fn parse_sequence(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.stream.skip_if(TokenKind::Punctuation, close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.stream.skip_if(TokenKind::Punctuation, close) {
                return Ok(items);
            }
            self.stream.expect_value(TokenKind::Punctuation, ",")?;
        }
    }

    fn parse_map(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        if self.stream.skip_if(TokenKind::Punctuation, "}") {
            return Ok(Expr::Map(entries));
        }
        loop {
            // Bare names are accepted as keys: `{ title: 'x' }`.
            let key = if self.stream.test(TokenKind::Name)
                && self.stream.peek(1).kind == TokenKind::Punctuation
                && self.stream.peek(1).text == ":"
            {
                Expr::Literal(Value::String(self.stream.next().text))
            } else {
                self.parse_expression()?
            };
            self.stream.expect_value(TokenKind::Punctuation, ":")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if self.stream.skip_if(TokenKind::Punctuation, "}") {
                return Ok(Expr::Map(entries));
            }
            self.stream.expect_value(TokenKind::Punctuation, ",")?;
        }
    }

    fn parse_number(&self, token: &Token) -> Result<Value> {
        let parsed = if token.text.contains('.') {
            token.text.parse::<f64>().ok().map(Value::Float)
        } else {
            // Integers past the i64 range become floats.
            token.text
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| token.text.parse::<f64>().map(Value::Float))
                .ok()
        };
        parsed.ok_or_else(|| self.error_at(format!("invalid number literal '{}'", token.text), token.line))
    }

    fn error_at(&self, message: impl Into<String>, line: usize) -> Error {
        Error::syntax(message, self.stream.name(), line)
    }
}

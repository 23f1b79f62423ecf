use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negative,
    Positive,
}

/// Semantics for an extension-defined binary operator.
pub type BinaryFn = Arc<dyn Fn(Value, Value) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    /// `is` takes a test on its right-hand side rather than an expression.
    Is,
    IsNot,
    Custom { symbol: String, apply: BinaryFn },
}

impl BinOp {
    pub fn is_test(&self) -> bool {
        matches!(self, BinOp::Is | BinOp::IsNot)
    }
}

impl fmt::Debug for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Custom { symbol, .. } => write!(f, "Custom({symbol:?})"),
            BinOp::Or => f.write_str("Or"),
            BinOp::And => f.write_str("And"),
            BinOp::Eq => f.write_str("Eq"),
            BinOp::NotEq => f.write_str("NotEq"),
            BinOp::Greater => f.write_str("Greater"),
            BinOp::Less => f.write_str("Less"),
            BinOp::GreaterEq => f.write_str("GreaterEq"),
            BinOp::LessEq => f.write_str("LessEq"),
            BinOp::Add => f.write_str("Add"),
            BinOp::Subtract => f.write_str("Subtract"),
            BinOp::Multiply => f.write_str("Multiply"),
            BinOp::Divide => f.write_str("Divide"),
            BinOp::Modulus => f.write_str("Modulus"),
            BinOp::Is => f.write_str("Is"),
            BinOp::IsNot => f.write_str("IsNot"),
        }
    }
}

impl PartialEq for BinOp {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BinOp::Custom { symbol: a, .. }, BinOp::Custom { symbol: b, .. }) => a == b,
            (BinOp::Custom { .. }, _) | (_, BinOp::Custom { .. }) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// A registered operator: its symbol, binding strength (higher binds
/// tighter), associativity and the node it builds.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDef<K> {
    pub symbol: String,
    pub precedence: u32,
    pub associativity: Associativity,
    pub kind: K,
}

impl<K> OperatorDef<K> {
    pub fn new(symbol: impl Into<String>, precedence: u32, kind: K) -> Self {
        Self {
            symbol: symbol.into(),
            precedence,
            associativity: Associativity::Left,
            kind,
        }
    }

    pub fn right(mut self) -> Self {
        self.associativity = Associativity::Right;
        self
    }

    /// Minimum precedence for the right-hand operand.
    pub fn rhs_precedence(&self) -> u32 {
        match self.associativity {
            Associativity::Left => self.precedence + 1,
            Associativity::Right => self.precedence,
        }
    }
}

impl OperatorDef<BinOp> {
    pub fn custom<F>(symbol: impl Into<String>, precedence: u32, apply: F) -> Self
    where
        F: Fn(Value, Value) -> Result<Value> + Send + Sync + 'static,
    {
        let symbol = symbol.into();
        let kind = BinOp::Custom {
            symbol: symbol.clone(),
            apply: Arc::new(apply),
        };
        Self::new(symbol, precedence, kind)
    }
}

pub type UnaryOperator = OperatorDef<UnaryOp>;
pub type BinaryOperator = OperatorDef<BinOp>;

use std::collections::HashMap;

use crate::operator::{BinOp, UnaryOp};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Array(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Attribute(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>),  // foo['bar']
    Unary(UnaryOp, Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
    /// `input | name(args)`; the input becomes the first argument.
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `input is [not] name(args)`.
    Test {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        negated: bool,
    },
    /// `name(args)` or `alias.name(args)`.
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Print {
        expr: Expr,
        line: usize,
    },
    If {
        cases: Vec<(Expr, Vec<Node>)>, // (condition, body). Includes if and elseifs.
        else_body: Option<Vec<Node>>,
        line: usize,
    },
    For {
        targets: Vec<String>, // `item` or `key, value`
        iterable: Expr,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
        line: usize,
    },
    /// Placeholder resolved against the inheritance chain at render time.
    Block {
        name: String,
        line: usize,
    },
    Import {
        template: Expr,
        alias: String,
        line: usize,
    },
    Include {
        template: Expr,
        with: Option<Expr>,
        line: usize,
    },
    Set {
        name: String,
        value: Expr,
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub line: usize,
}

/// A compiled template: its statements plus what `extends`, `block` and
/// `macro` collected while parsing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub name: String,
    pub root: Vec<Node>,
    pub parent: Option<String>,
    pub blocks: HashMap<String, Vec<Node>>,
    pub macros: HashMap<String, Macro>,
}

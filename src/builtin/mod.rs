//! The core extension: control tags, the standard operator table, and the
//! built-in filters, tests and functions. Every engine registers it first.

mod date;
mod filters;
mod format;
mod functions;
mod predicates;
mod tags;

use std::sync::Arc;

use crate::engine::Charset;
use crate::extension::{Callable, Extension, Predicate, TagParser};
use crate::operator::{BinOp, BinaryOperator, OperatorDef, UnaryOp, UnaryOperator};

pub use tags::{BlockTag, ExtendsTag, ForTag, IfTag, ImportTag, IncludeTag, MacroTag, SetTag};

#[derive(Debug, Clone, Copy, Default)]
pub struct CoreExtension {
    charset: Charset,
}

impl CoreExtension {
    /// `charset` drives the byte encoding used by `urlencode`.
    pub fn new(charset: Charset) -> Self {
        Self { charset }
    }
}

impl Extension for CoreExtension {
    fn tag_parsers(&self) -> Vec<Arc<dyn TagParser>> {
        vec![
            Arc::new(BlockTag),
            Arc::new(ExtendsTag),
            Arc::new(IfTag),
            Arc::new(ForTag),
            Arc::new(MacroTag),
            Arc::new(ImportTag),
            Arc::new(IncludeTag),
            Arc::new(SetTag),
        ]
    }

    fn unary_operators(&self) -> Vec<UnaryOperator> {
        vec![
            OperatorDef::new("not", 500, UnaryOp::Not),
            OperatorDef::new("+", 500, UnaryOp::Positive),
            OperatorDef::new("-", 500, UnaryOp::Negative),
        ]
    }

    fn binary_operators(&self) -> Vec<BinaryOperator> {
        vec![
            OperatorDef::new("or", 10, BinOp::Or),
            OperatorDef::new("and", 15, BinOp::And),
            OperatorDef::new("==", 20, BinOp::Eq),
            OperatorDef::new("!=", 20, BinOp::NotEq),
            OperatorDef::new(">", 20, BinOp::Greater),
            OperatorDef::new("<", 20, BinOp::Less),
            OperatorDef::new(">=", 20, BinOp::GreaterEq),
            OperatorDef::new("<=", 20, BinOp::LessEq),
            OperatorDef::new("+", 30, BinOp::Add),
            OperatorDef::new("-", 30, BinOp::Subtract),
            OperatorDef::new("*", 60, BinOp::Multiply),
            OperatorDef::new("/", 60, BinOp::Divide),
            OperatorDef::new("%", 60, BinOp::Modulus),
            OperatorDef::new("is", 100, BinOp::Is),
            OperatorDef::new("is not", 100, BinOp::IsNot),
        ]
    }

    fn filters(&self) -> Vec<(String, Callable)> {
        filters::all(self.charset)
    }

    fn tests(&self) -> Vec<(String, Predicate)> {
        predicates::all()
    }

    fn functions(&self) -> Vec<(String, Callable)> {
        functions::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Registry;

    #[test]
    fn registers_the_full_core_surface() {
        let mut registry = Registry::new();
        registry.register(&CoreExtension::default());

        for tag in ["block", "extends", "if", "for", "macro", "import", "include", "set"] {
            assert!(registry.tag_parser(tag).is_some(), "tag {tag}");
        }
        for filter in ["lower", "upper", "urlencode", "format", "date", "number", "numberformat", "abbreviate", "capitalize", "trim", "json", "default"] {
            assert!(registry.filter(filter).is_some(), "filter {filter}");
        }
        for test in ["even", "odd", "null", "empty", "iterable", "equalTo"] {
            assert!(registry.test(test).is_some(), "test {test}");
        }
        assert!(registry.function("range").is_some());
    }

    #[test]
    fn precedence_table() {
        let mut registry = Registry::new();
        registry.register(&CoreExtension::default());

        let prec = |symbol: &str| registry.binary_operator(symbol).unwrap().precedence;
        assert!(prec("or") < prec("and"));
        assert!(prec("and") < prec("=="));
        assert!(prec("==") < prec("+"));
        assert!(prec("+") < prec("*"));
        assert!(prec("*") < prec("is not"));
        assert_eq!(registry.unary_operator("not").unwrap().precedence, 500);
        assert!(registry.operator_symbols().contains(&"is not".to_string()));
    }
}

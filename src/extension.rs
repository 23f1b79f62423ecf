//! Extension providers and the registry they feed.
//!
//! An [`Extension`] contributes tag parsers, operators, filters, tests and
//! functions. The engine folds every extension into one [`Registry`] at
//! construction; afterwards the registry is only read, so compiled templates
//! can be rendered from many threads at once.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::Node;
use crate::error::Result;
use crate::lexer::Token;
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::parser::Parser;
use crate::value::Value;

/// Filters and functions: ordered arguments in, one value out. For filters
/// the piped value is the first argument.
pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Tests: ordered arguments in (tested value first), a boolean out.
pub type Predicate = Arc<dyn Fn(&[Value]) -> Result<bool> + Send + Sync>;

/// Parses one `{% tag ... %}` construct.
///
/// `parse` is called with the tag name already consumed and must consume
/// everything through the closing `%}` of the construct (including any
/// nested body and its end tag). Returning `None` means the tag only
/// affected the template being built (e.g. `extends`, `macro`).
pub trait TagParser: Send + Sync {
    fn tag(&self) -> &str;

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>>;
}

pub trait Extension {
    fn tag_parsers(&self) -> Vec<Arc<dyn TagParser>> {
        Vec::new()
    }

    fn unary_operators(&self) -> Vec<UnaryOperator> {
        Vec::new()
    }

    fn binary_operators(&self) -> Vec<BinaryOperator> {
        Vec::new()
    }

    fn filters(&self) -> Vec<(String, Callable)> {
        Vec::new()
    }

    fn tests(&self) -> Vec<(String, Predicate)> {
        Vec::new()
    }

    fn functions(&self) -> Vec<(String, Callable)> {
        Vec::new()
    }
}

/// Aggregated contributions of all registered extensions. A name or symbol
/// registered twice resolves to the last registration.
#[derive(Default)]
pub struct Registry {
    tag_parsers: HashMap<String, Arc<dyn TagParser>>,
    unary_operators: HashMap<String, UnaryOperator>,
    binary_operators: HashMap<String, BinaryOperator>,
    filters: HashMap<String, Callable>,
    tests: HashMap<String, Predicate>,
    functions: HashMap<String, Callable>,
}

fn insert_logged<V>(map: &mut HashMap<String, V>, kind: &str, name: String, value: V) {
    if map.insert(name.clone(), value).is_some() {
        debug!(kind, name = %name, "overriding earlier registration");
    } else {
        trace!(kind, name = %name, "registered");
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: &dyn Extension) {
        for parser in extension.tag_parsers() {
            let tag = parser.tag().to_string();
            insert_logged(&mut self.tag_parsers, "tag", tag, parser);
        }
        for op in extension.unary_operators() {
            insert_logged(&mut self.unary_operators, "unary operator", op.symbol.clone(), op);
        }
        for op in extension.binary_operators() {
            insert_logged(&mut self.binary_operators, "binary operator", op.symbol.clone(), op);
        }
        for (name, filter) in extension.filters() {
            insert_logged(&mut self.filters, "filter", name, filter);
        }
        for (name, test) in extension.tests() {
            insert_logged(&mut self.tests, "test", name, test);
        }
        for (name, function) in extension.functions() {
            insert_logged(&mut self.functions, "function", name, function);
        }
        debug!(
            tags = self.tag_parsers.len(),
            filters = self.filters.len(),
            tests = self.tests.len(),
            "extension registered"
        );
    }

    pub fn tag_parser(&self, name: &str) -> Option<&dyn TagParser> {
        self.tag_parsers.get(name).map(|p| p.as_ref())
    }

    pub fn unary_operator(&self, symbol: &str) -> Option<&UnaryOperator> {
        self.unary_operators.get(symbol)
    }

    pub fn binary_operator(&self, symbol: &str) -> Option<&BinaryOperator> {
        self.binary_operators.get(symbol)
    }

    pub fn filter(&self, name: &str) -> Option<&Callable> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&Predicate> {
        self.tests.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Callable> {
        self.functions.get(name)
    }

    /// Every operator symbol, unary and binary, for the lexer.
    pub fn operator_symbols(&self) -> Vec<String> {
        self.unary_operators
            .keys()
            .chain(self.binary_operators.keys())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{BinOp, OperatorDef};

    struct Shout;

    impl Extension for Shout {
        fn filters(&self) -> Vec<(String, Callable)> {
            let shout: Callable = Arc::new(|args: &[Value]| {
                Ok(Value::from(format!("{}!", args.first().cloned().unwrap_or_default())))
            });
            vec![("upper".to_string(), shout)]
        }

        fn binary_operators(&self) -> Vec<BinaryOperator> {
            vec![OperatorDef::new("+", 99, BinOp::Subtract)]
        }
    }

    struct Plain;

    impl Extension for Plain {
        fn filters(&self) -> Vec<(String, Callable)> {
            let upper: Callable =
                Arc::new(|args: &[Value]| Ok(Value::from(args[0].to_string().to_uppercase())));
            vec![("upper".to_string(), upper)]
        }

        fn binary_operators(&self) -> Vec<BinaryOperator> {
            vec![OperatorDef::new("+", 30, BinOp::Add)]
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        registry.register(&Plain);
        registry.register(&Shout);

        let upper = registry.filter("upper").unwrap();
        assert_eq!(upper(&[Value::from("hi")]).unwrap(), Value::from("hi!"));
        let plus = registry.binary_operator("+").unwrap();
        assert_eq!(plus.precedence, 99);
        assert_eq!(plus.kind, BinOp::Subtract);
    }

    #[test]
    fn missing_entries_resolve_to_none() {
        let registry = Registry::new();
        assert!(registry.filter("upper").is_none());
        assert!(registry.tag_parser("if").is_none());
        assert!(registry.operator_symbols().is_empty());
    }
}

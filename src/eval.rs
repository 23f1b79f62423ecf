use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::*;
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::operator::{BinOp, UnaryOp};
use crate::value::Value;

/// Nesting limit for macro calls and includes.
const MAX_DEPTH: usize = 256;

/// Macro calls and includes continue on a fresh stack segment once less than
/// `RED_ZONE` bytes remain on the current one.
const RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Renders `document` (resolving its `extends` chain) into `out`.
pub(crate) fn render(
    engine: &Engine,
    document: Arc<Document>,
    context: Context,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    render_nested(engine, document, context, out, 0)
}

fn render_nested(
    engine: &Engine,
    document: Arc<Document>,
    context: Context,
    out: &mut dyn fmt::Write,
    depth: usize,
) -> Result<()> {
    let chain = resolve_chain(engine, document)?;
    let mut evaluator = Evaluator {
        engine,
        chain,
        context,
        template: String::new(),
        line: 1,
        depth,
    };
    evaluator.render_document(out)
}

/// Follows `extends` from the most-derived template to the root ancestor.
fn resolve_chain(engine: &Engine, document: Arc<Document>) -> Result<Vec<Arc<Document>>> {
    let mut chain = vec![document];
    loop {
        let child = &chain[chain.len() - 1];
        let Some(parent) = child.parent.clone() else {
            break;
        };
        if chain.iter().any(|doc| doc.name == parent) {
            return Err(Error::call(format!("circular template inheritance through '{parent}'")).at(&child.name, 1));
        }
        let child_name = child.name.clone();
        let loaded = engine.load_document(&parent).map_err(|e| e.at(&child_name, 1))?;
        chain.push(loaded);
    }
    if chain.len() > 1 {
        debug!(
            chain = ?chain.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "inheritance chain resolved"
        );
    }
    Ok(chain)
}

struct Evaluator<'e> {
    engine: &'e Engine,
    /// Most-derived template first; block lookups walk it in order.
    chain: Vec<Arc<Document>>,
    context: Context,
    /// Template and line of the statement being executed, for diagnostics.
    template: String,
    line: usize,
    depth: usize,
}

impl<'e> Evaluator<'e> {
    fn render_document(&mut self, out: &mut dyn fmt::Write) -> Result<()> {
        // Children only contribute blocks, plus the `set`/`import`
        // statements at their top level.
        let children: Vec<Arc<Document>> = self.chain[..self.chain.len() - 1].to_vec();
        for child in children.iter().rev() {
            self.template = child.name.clone();
            let mut discarded = String::new();
            for node in &child.root {
                if matches!(node, Node::Set { .. } | Node::Import { .. }) {
                    self.render_node(node, &mut discarded)?;
                }
            }
        }

        let root = Arc::clone(&self.chain[self.chain.len() - 1]);
        self.template = root.name.clone();
        self.render_nodes(&root.root, out)
    }

    fn locate(&self, err: Error) -> Error {
        err.at(&self.template, self.line)
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        self.locate(Error::call(message))
    }

    fn render_nodes(&mut self, nodes: &[Node], out: &mut dyn fmt::Write) -> Result<()> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, out: &mut dyn fmt::Write) -> Result<()> {
        match node {
            Node::Text(s) => out.write_str(s)?,
            Node::Print { expr, line } => {
                self.line = *line;
                let val = self.eval_expr(expr)?;
                write!(out, "{val}")?;
            }
            Node::If {
                cases,
                else_body,
                line,
            } => {
                self.line = *line;
                let mut matched = false;
                for (cond, body) in cases {
                    if self.eval_expr(cond)?.is_truthy() {
                        self.render_nodes(body, out)?;
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    if let Some(body) = else_body {
                        self.render_nodes(body, out)?;
                    }
                }
            }
            Node::For {
                targets,
                iterable,
                body,
                else_body,
                line,
            } => {
                self.line = *line;
                let iter_val = self.eval_expr(iterable)?;
                self.render_for(targets, iter_val, body, else_body.as_deref(), out)?;
            }
            Node::Block { name, line } => {
                self.line = *line;
                self.render_block(name, out)?;
            }
            Node::Import {
                template,
                alias,
                line,
            } => {
                self.line = *line;
                let name = self.template_name(template)?;
                let module = self.engine.load_document(&name).map_err(|e| self.locate(e))?;
                self.context.insert(alias.clone(), Value::Module(module));
            }
            Node::Include {
                template,
                with,
                line,
            } => {
                self.line = *line;
                self.render_include(template, with.as_ref(), out)?;
            }
            Node::Set { name, value, line } => {
                self.line = *line;
                let val = self.eval_expr(value)?;
                self.context.insert(name.clone(), val);
            }
        }
        Ok(())
    }

    fn render_for(
        &mut self,
        targets: &[String],
        iter_val: Value,
        body: &[Node],
        else_body: Option<&[Node]>,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        let items: Vec<(Value, Value)> = match iter_val {
            Value::Null => Vec::new(), // Missing iterable = empty loop
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect(),
            Value::Map(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            other => return Err(self.fail(format!("cannot iterate over a {}", other.type_name()))),
        };

        if items.is_empty() {
            if let Some(body) = else_body {
                self.render_nodes(body, out)?;
            }
            return Ok(());
        }

        let len = items.len();
        for (i, (key, item)) in items.into_iter().enumerate() {
            self.context.push_scope();
            match targets {
                [value_name] => self.context.insert(value_name.clone(), item),
                [key_name, value_name, ..] => {
                    self.context.insert(key_name.clone(), key);
                    self.context.insert(value_name.clone(), item);
                }
                [] => {}
            }

            let mut loop_map = BTreeMap::new();
            loop_map.insert("index".to_string(), Value::from(i));
            loop_map.insert("revindex".to_string(), Value::from(len - 1 - i));
            loop_map.insert("first".to_string(), Value::Bool(i == 0));
            loop_map.insert("last".to_string(), Value::Bool(i == len - 1));
            loop_map.insert("length".to_string(), Value::from(len));
            self.context.insert("loop", Value::Map(loop_map));

            let result = self.render_nodes(body, out);
            self.context.pop_scope();
            result?;
        }
        Ok(())
    }

    /// Renders the most-derived definition of block `name`.
    fn render_block(&mut self, name: &str, out: &mut dyn fmt::Write) -> Result<()> {
        let Some(owner) = self
            .chain
            .iter()
            .find(|doc| doc.blocks.contains_key(name))
            .cloned()
        else {
            trace!(block = name, "no definition in chain");
            return Ok(());
        };
        let Some(body) = owner.blocks.get(name) else {
            return Ok(());
        };

        let previous = mem::replace(&mut self.template, owner.name.clone());
        self.context.push_scope();
        let result = self.render_nodes(body, out);
        self.context.pop_scope();
        self.template = previous;
        result
    }

    fn render_include(
        &mut self,
        template: &Expr,
        with: Option<&Expr>,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.fail("maximum include depth exceeded"));
        }
        let name = self.template_name(template)?;
        let document = self.engine.load_document(&name).map_err(|e| self.locate(e))?;

        let mut context = self.context.flatten();
        if let Some(with) = with {
            match self.eval_expr(with)? {
                Value::Map(map) => {
                    for (key, value) in map {
                        context.insert(key, value);
                    }
                }
                Value::Null => {}
                other => {
                    return Err(self.fail(format!("include context must be a map, got {}", other.type_name())))
                }
            }
        }
        let depth = self.depth + 1;
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || {
            render_nested(self.engine, document, context, out, depth)
        })
        .map_err(|e| self.locate(e))
    }

    fn template_name(&mut self, expr: &Expr) -> Result<String> {
        match self.eval_expr(expr)? {
            Value::String(name) => Ok(name),
            other => Err(self.fail(format!("template name must be a string, got {}", other.type_name()))),
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => Ok(self.context.get(name)),
            Expr::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = self.eval_expr(key)?.to_string();
                    map.insert(key, self.eval_expr(value)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Attribute(obj, attr) => {
                let val = self.eval_expr(obj)?;
                Ok(match val {
                    Value::Map(mut m) => m.remove(attr).unwrap_or(Value::Null),
                    // Unknown attributes render as nothing, like missing variables.
                    _ => Value::Null,
                })
            }
            Expr::Index(obj, idx) => {
                let val = self.eval_expr(obj)?;
                let idx_val = self.eval_expr(idx)?;
                Ok(match (val, idx_val) {
                    (Value::Map(mut m), key) => m.remove(&key.to_string()).unwrap_or(Value::Null),
                    (Value::Array(a), idx) => idx
                        .as_i64()
                        .and_then(|i| usize::try_from(i).ok())
                        .and_then(|i| a.into_iter().nth(i))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                })
            }
            Expr::Unary(op, operand) => {
                let val = self.eval_expr(operand)?;
                apply_unary(*op, val).map_err(|e| self.locate(e))
            }
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.eval_expr(lhs)?;
                // `and` / `or` short-circuit.
                match op {
                    BinOp::And if !l.is_truthy() => return Ok(Value::Bool(false)),
                    BinOp::Or if l.is_truthy() => return Ok(Value::Bool(true)),
                    BinOp::And | BinOp::Or => return Ok(Value::Bool(self.eval_expr(rhs)?.is_truthy())),
                    _ => {}
                }
                let r = self.eval_expr(rhs)?;
                apply_binary(op, l, r).map_err(|e| self.locate(e))
            }
            Expr::Filter { input, name, args } => {
                let mut values = vec![self.eval_expr(input)?];
                values.extend(self.eval_all(args)?);
                let filter = self
                    .engine
                    .registry()
                    .filter(name)
                    .ok_or_else(|| self.fail(format!("unknown filter '{name}'")))?;
                filter(&values).map_err(|e| self.locate(e))
            }
            Expr::Test {
                input,
                name,
                args,
                negated,
            } => {
                let mut values = vec![self.eval_expr(input)?];
                values.extend(self.eval_all(args)?);
                let test = self
                    .engine
                    .registry()
                    .test(name)
                    .ok_or_else(|| self.fail(format!("unknown test '{name}'")))?;
                let passed = test(&values).map_err(|e| self.locate(e))?;
                Ok(Value::Bool(passed != *negated))
            }
            Expr::Call { callee, args } => {
                let values = self.eval_all(args)?;
                self.call(callee, values)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e)).collect()
    }

    /// Macros of the current chain shadow registered functions.
    fn call(&mut self, callee: &Expr, args: Vec<Value>) -> Result<Value> {
        match callee {
            Expr::Name(name) => {
                if let Some(owner) = self.chain.iter().find(|doc| doc.macros.contains_key(name)).cloned() {
                    return self.call_macro(self.chain.clone(), &owner, name, args);
                }
                let engine = self.engine;
                match engine.registry().function(name) {
                    Some(function) => function(&args).map_err(|e| self.locate(e)),
                    None => Err(self.fail(format!("undefined function or macro '{name}'"))),
                }
            }
            Expr::Attribute(target, name) => match self.eval_expr(target)? {
                Value::Module(module) if module.macros.contains_key(name) => {
                    self.call_macro(vec![Arc::clone(&module)], &module, name, args)
                }
                Value::Module(module) => Err(self.fail(format!(
                    "macro '{name}' is not defined in '{}'",
                    module.name
                ))),
                other => Err(self.fail(format!("cannot call '{name}' on a {}", other.type_name()))),
            },
            _ => Err(self.fail("expression is not callable")),
        }
    }

    /// Renders a macro body in a fresh scope holding only its parameters and
    /// returns the output as a string.
    fn call_macro(
        &mut self,
        chain: Vec<Arc<Document>>,
        owner: &Document,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let Some(definition) = owner.macros.get(name) else {
            return Err(self.fail(format!("undefined macro '{name}'")));
        };
        if self.depth >= MAX_DEPTH {
            return Err(self.fail("maximum macro call depth exceeded"));
        }

        let mut scope = Context::new();
        let mut args = args.into_iter();
        for param in &definition.params {
            scope.insert(param.clone(), args.next().unwrap_or_default());
        }

        let mut nested = Evaluator {
            engine: self.engine,
            chain,
            context: scope,
            template: owner.name.clone(),
            line: definition.line,
            depth: self.depth + 1,
        };
        let mut output = String::new();
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || {
            nested.render_nodes(&definition.body, &mut output)
        })?;
        Ok(Value::String(output))
    }
}

fn apply_unary(op: UnaryOp, val: Value) -> Result<Value> {
    match (op, val) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Negative, Value::Int(i)) => Ok(i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int)),
        (UnaryOp::Negative, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Positive, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (_, v) => Err(Error::call(format!("unary operator requires a number, got {}", v.type_name()))),
    }
}

fn apply_binary(op: &BinOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::NotEq => Ok(Value::Bool(l != r)),
        BinOp::Greater | BinOp::Less | BinOp::GreaterEq | BinOp::LessEq => {
            let ordering = l.partial_cmp(&r).ok_or_else(|| {
                Error::call(format!("cannot compare {} with {}", l.type_name(), r.type_name()))
            })?;
            Ok(Value::Bool(match op {
                BinOp::Greater => ordering == Ordering::Greater,
                BinOp::Less => ordering == Ordering::Less,
                BinOp::GreaterEq => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        BinOp::Add => match (l, r) {
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (l @ Value::String(_), r) | (l, r @ Value::String(_)) => Ok(Value::String(format!("{l}{r}"))),
            (l, r) => arithmetic(op, l, r),
        },
        BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulus => arithmetic(op, l, r),
        BinOp::Custom { apply, .. } => apply(l, r),
        BinOp::And => Ok(Value::Bool(l.is_truthy() && r.is_truthy())),
        BinOp::Or => Ok(Value::Bool(l.is_truthy() || r.is_truthy())),
        BinOp::Is | BinOp::IsNot => Err(Error::call("'is' must be followed by a test name")),
    }
}

fn arithmetic(op: &BinOp, l: Value, r: Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        if matches!(op, BinOp::Divide | BinOp::Modulus) && b == 0 {
            return Err(Error::call("division by zero"));
        }
        let exact = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Subtract => a.checked_sub(b),
            BinOp::Multiply => a.checked_mul(b),
            BinOp::Divide => a.checked_rem(b).filter(|rem| *rem == 0).and_then(|_| a.checked_div(b)),
            BinOp::Modulus => a.checked_rem(b),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::Int(result));
        }
    }

    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(Error::call(format!(
            "unsupported operand types for {op:?}: {} and {}",
            l.type_name(),
            r.type_name()
        )));
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide | BinOp::Modulus if b == 0.0 => return Err(Error::call("division by zero")),
        BinOp::Divide => a / b,
        BinOp::Modulus => a % b,
        _ => return Err(Error::call(format!("{op:?} is not an arithmetic operator"))),
    };
    Ok(Value::Float(result))
}

//! Statement-level parsing: raw text, print regions and tag dispatch.

mod expression;

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Document, Macro, Node};
use crate::error::Result;
use crate::extension::Registry;
use crate::lexer::{Lexer, TokenKind};
use crate::stream::TokenStream;

/// Builds a [`Document`] from a token stream. Tag parsers receive `&mut
/// Parser` so they can read their arguments, parse nested bodies and record
/// parents, blocks and macros on the template being built.
pub struct Parser<'r> {
    stream: TokenStream,
    registry: &'r Registry,
    parent: Option<String>,
    blocks: HashMap<String, Vec<Node>>,
    macros: HashMap<String, Macro>,
}

/// Lexes and parses `source` into a compiled document.
pub fn compile(name: &str, source: &str, registry: &Registry, trim_blocks: bool) -> Result<Document> {
    let operators = registry.operator_symbols();
    let tokens = Lexer::new(name, source, &operators)
        .trim_blocks(trim_blocks)
        .tokenize()?;
    let document = Parser::new(TokenStream::new(name, tokens), registry).parse_document()?;
    debug!(
        template = name,
        statements = document.root.len(),
        blocks = document.blocks.len(),
        macros = document.macros.len(),
        "template compiled"
    );
    Ok(document)
}

impl<'r> Parser<'r> {
    pub fn new(stream: TokenStream, registry: &'r Registry) -> Self {
        Self {
            stream,
            registry,
            parent: None,
            blocks: HashMap::new(),
            macros: HashMap::new(),
        }
    }

    pub fn stream(&mut self) -> &mut TokenStream {
        &mut self.stream
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn parse_document(mut self) -> Result<Document> {
        let root = self.subparse(&[])?;
        Ok(Document {
            name: self.stream.name().to_string(),
            root,
            parent: self.parent,
            blocks: self.blocks,
            macros: self.macros,
        })
    }

    /// Parses statements until one of `end_tags` opens the next tag, leaving
    /// the stream on that tag's `{%`. With no end tags, parses to the end.
    pub fn subparse(&mut self, end_tags: &[&str]) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            let token = self.stream.current().clone();
            match token.kind {
                TokenKind::Eof => {
                    if !end_tags.is_empty() {
                        return Err(self.stream.error(format!(
                            "unexpected end of template, expected {}",
                            end_tags.join(" or ")
                        )));
                    }
                    break;
                }
                TokenKind::Text => {
                    self.stream.next();
                    nodes.push(Node::Text(token.text));
                }
                TokenKind::PrintStart => {
                    self.stream.next(); // {{
                    let expr = self.parse_expression()?;
                    self.stream.expect(TokenKind::PrintEnd)?;
                    nodes.push(Node::Print {
                        expr,
                        line: token.line,
                    });
                }
                TokenKind::ExecuteStart => {
                    let tag = self.stream.peek(1);
                    if tag.kind == TokenKind::Name && end_tags.contains(&tag.text.as_str()) {
                        // Block terminator found; the caller consumes it.
                        break;
                    }
                    self.stream.next(); // {%
                    let tag = self.stream.expect(TokenKind::Name)?;
                    let registry = self.registry;
                    let parser = registry.tag_parser(&tag.text).ok_or_else(|| {
                        self.stream.error(format!("unknown tag '{}'", tag.text))
                    })?;
                    if let Some(node) = parser.parse(self, &tag)? {
                        nodes.push(node);
                    }
                }
                _ => return Err(self.stream.error(format!("unexpected {token}"))),
            }
        }
        Ok(nodes)
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Records the parent template. A template may extend only one parent.
    pub fn set_parent(&mut self, name: String, line: usize) -> Result<()> {
        if self.parent.is_some() {
            return Err(crate::Error::syntax(
                "multiple extend tags are not allowed",
                self.stream.name(),
                line,
            ));
        }
        self.parent = Some(name);
        Ok(())
    }

    /// Later definitions of the same name replace earlier ones.
    pub fn define_block(&mut self, name: String, body: Vec<Node>) {
        self.blocks.insert(name, body);
    }

    pub fn define_macro(&mut self, definition: Macro) {
        self.macros.insert(definition.name.clone(), definition);
    }
}

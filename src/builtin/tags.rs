//! Tag parsers for the core control constructs.

use crate::ast::{Macro, Node};
use crate::error::Result;
use crate::extension::TagParser;
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;

/// Consumes `{% name %}`.
fn end_tag(parser: &mut Parser<'_>, name: &str) -> Result<()> {
    let stream = parser.stream();
    stream.expect(TokenKind::ExecuteStart)?;
    stream.expect_value(TokenKind::Name, name)?;
    stream.expect(TokenKind::ExecuteEnd)?;
    Ok(())
}

/// Consumes `{%` and the tag name that follows, returning the name.
fn intermediate_tag(parser: &mut Parser<'_>) -> Result<String> {
    let stream = parser.stream();
    stream.expect(TokenKind::ExecuteStart)?;
    Ok(stream.expect(TokenKind::Name)?.text)
}

pub struct IfTag;

impl TagParser for IfTag {
    fn tag(&self) -> &str {
        "if"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        const BRANCH_END: &[&str] = &["elseif", "else", "endif"];

        let condition = parser.parse_expression()?;
        parser.stream().expect(TokenKind::ExecuteEnd)?;
        let body = parser.subparse(BRANCH_END)?;
        let mut cases = vec![(condition, body)];
        let mut else_body = None;

        loop {
            match intermediate_tag(parser)?.as_str() {
                "elseif" => {
                    let cond = parser.parse_expression()?;
                    parser.stream().expect(TokenKind::ExecuteEnd)?;
                    let block = parser.subparse(BRANCH_END)?;
                    cases.push((cond, block));
                }
                "else" => {
                    parser.stream().expect(TokenKind::ExecuteEnd)?;
                    else_body = Some(parser.subparse(&["endif"])?);
                }
                _ => {
                    // endif
                    parser.stream().expect(TokenKind::ExecuteEnd)?;
                    break;
                }
            }
        }

        Ok(Some(Node::If {
            cases,
            else_body,
            line: token.line,
        }))
    }
}

pub struct ForTag;

impl TagParser for ForTag {
    fn tag(&self) -> &str {
        "for"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let stream = parser.stream();
        let mut targets = vec![stream.expect(TokenKind::Name)?.text];
        if stream.skip_if(TokenKind::Punctuation, ",") {
            targets.push(stream.expect(TokenKind::Name)?.text);
        }
        stream.expect_value(TokenKind::Name, "in")?;
        let iterable = parser.parse_expression()?;
        parser.stream().expect(TokenKind::ExecuteEnd)?;

        let body = parser.subparse(&["else", "endfor"])?;
        let else_body = match intermediate_tag(parser)?.as_str() {
            "else" => {
                parser.stream().expect(TokenKind::ExecuteEnd)?;
                let else_body = parser.subparse(&["endfor"])?;
                end_tag(parser, "endfor")?;
                Some(else_body)
            }
            _ => {
                parser.stream().expect(TokenKind::ExecuteEnd)?;
                None
            }
        };

        Ok(Some(Node::For {
            targets,
            iterable,
            body,
            else_body,
            line: token.line,
        }))
    }
}

pub struct BlockTag;

impl TagParser for BlockTag {
    fn tag(&self) -> &str {
        "block"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let name = parser.stream().expect(TokenKind::Name)?.text;
        parser.stream().expect(TokenKind::ExecuteEnd)?;
        let body = parser.subparse(&["endblock"])?;

        let stream = parser.stream();
        stream.expect(TokenKind::ExecuteStart)?;
        stream.expect_value(TokenKind::Name, "endblock")?;
        if stream.test(TokenKind::Name) {
            let closing = stream.next();
            if closing.text != name {
                return Err(stream.error(format!(
                    "endblock '{}' does not match block '{name}'",
                    closing.text
                )));
            }
        }
        stream.expect(TokenKind::ExecuteEnd)?;

        parser.define_block(name.clone(), body);
        Ok(Some(Node::Block {
            name,
            line: token.line,
        }))
    }
}

pub struct ExtendsTag;

impl TagParser for ExtendsTag {
    fn tag(&self) -> &str {
        "extends"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let stream = parser.stream();
        let parent = match stream.current().kind {
            TokenKind::String | TokenKind::Name => stream.next().text,
            _ => return Err(stream.error(format!("expected parent template name, got {}", stream.current()))),
        };
        parser.set_parent(parent, token.line)?;
        parser.stream().expect(TokenKind::ExecuteEnd)?;
        Ok(None)
    }
}

pub struct MacroTag;

impl TagParser for MacroTag {
    fn tag(&self) -> &str {
        "macro"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let stream = parser.stream();
        let name = stream.expect(TokenKind::Name)?.text;
        stream.expect_value(TokenKind::Punctuation, "(")?;
        let mut params = Vec::new();
        if !stream.skip_if(TokenKind::Punctuation, ")") {
            loop {
                params.push(stream.expect(TokenKind::Name)?.text);
                if stream.skip_if(TokenKind::Punctuation, ")") {
                    break;
                }
                stream.expect_value(TokenKind::Punctuation, ",")?;
            }
        }
        stream.expect(TokenKind::ExecuteEnd)?;

        let body = parser.subparse(&["endmacro"])?;
        end_tag(parser, "endmacro")?;

        parser.define_macro(Macro {
            name,
            params,
            body,
            line: token.line,
        });
        Ok(None)
    }
}

pub struct ImportTag;

impl TagParser for ImportTag {
    fn tag(&self) -> &str {
        "import"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let template = parser.parse_expression()?;
        let stream = parser.stream();
        stream.expect_value(TokenKind::Name, "as")?;
        let alias = stream.expect(TokenKind::Name)?.text;
        stream.expect(TokenKind::ExecuteEnd)?;
        Ok(Some(Node::Import {
            template,
            alias,
            line: token.line,
        }))
    }
}

pub struct IncludeTag;

impl TagParser for IncludeTag {
    fn tag(&self) -> &str {
        "include"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let template = parser.parse_expression()?;
        let with = if parser.stream().skip_if(TokenKind::Name, "with") {
            Some(parser.parse_expression()?)
        } else {
            None
        };
        parser.stream().expect(TokenKind::ExecuteEnd)?;
        Ok(Some(Node::Include {
            template,
            with,
            line: token.line,
        }))
    }
}

pub struct SetTag;

impl TagParser for SetTag {
    fn tag(&self) -> &str {
        "set"
    }

    fn parse(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Option<Node>> {
        let stream = parser.stream();
        let name = stream.expect(TokenKind::Name)?.text;
        stream.expect_value(TokenKind::Punctuation, "=")?;
        let value = parser.parse_expression()?;
        parser.stream().expect(TokenKind::ExecuteEnd)?;
        Ok(Some(Node::Set {
            name,
            value,
            line: token.line,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Document, Expr};
    use crate::builtin::CoreExtension;
    use crate::error::Error;
    use crate::extension::Registry;
    use crate::parser;
    use crate::value::Value;

    fn compile(source: &str) -> crate::Result<Document> {
        let mut registry = Registry::new();
        registry.register(&CoreExtension::default());
        parser::compile("page", source, &registry, false)
    }

    #[test]
    fn if_collects_every_branch() {
        let doc = compile("{% if a %}A{% elseif b %}B{% elseif c %}C{% else %}D{% endif %}").unwrap();
        let Node::If { cases, else_body, .. } = &doc.root[0] else {
            panic!("expected an if node");
        };
        assert_eq!(cases.len(), 3);
        assert_eq!(else_body.as_deref(), Some(&[Node::Text("D".into())][..]));
    }

    #[test]
    fn for_accepts_key_value_targets_and_else() {
        let doc = compile("{% for k, v in items %}{{ k }}{% else %}none{% endfor %}").unwrap();
        let Node::For { targets, else_body, .. } = &doc.root[0] else {
            panic!("expected a for node");
        };
        assert_eq!(targets, &["k".to_string(), "v".to_string()]);
        assert!(else_body.is_some());
    }

    #[test]
    fn blocks_are_registered_and_referenced() {
        let doc = compile("<{% block title %}T{% endblock title %}>").unwrap();
        assert_eq!(doc.root[1], Node::Block { name: "title".into(), line: 1 });
        assert_eq!(doc.blocks["title"], vec![Node::Text("T".into())]);
    }

    #[test]
    fn redefined_block_keeps_the_later_body() {
        let doc = compile("{% block a %}1{% endblock %}{% block a %}2{% endblock %}").unwrap();
        assert_eq!(doc.blocks["a"], vec![Node::Text("2".into())]);
    }

    #[test]
    fn mismatched_endblock_name_is_rejected() {
        assert!(compile("{% block a %}x{% endblock b %}").is_err());
    }

    #[test]
    fn extends_records_parent_without_output() {
        let doc = compile("{% extends 'base.html' %}{% block body %}x{% endblock %}").unwrap();
        assert_eq!(doc.parent.as_deref(), Some("base.html"));
        assert_eq!(doc.root.len(), 1);
    }

    #[test]
    fn second_extends_is_a_syntax_error() {
        let err = compile("{% extends 'a' %}\n{% extends 'b' %}").unwrap_err();
        match err {
            Error::Syntax { message, line, .. } => {
                assert!(message.to_lowercase().contains("multiple extend tags"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn macros_are_collected_not_rendered() {
        let doc = compile("{% macro input(name, type) %}<{{ type }} {{ name }}>{% endmacro %}").unwrap();
        assert!(doc.root.is_empty());
        assert_eq!(doc.macros["input"].params, vec!["name".to_string(), "type".to_string()]);
    }

    #[test]
    fn import_include_and_set() {
        let doc = compile("{% import 'forms' as f %}{% include 'nav' with {a: 1} %}{% set x = 2 %}").unwrap();
        assert!(matches!(&doc.root[0], Node::Import { alias, .. } if alias == "f"));
        assert!(matches!(&doc.root[1], Node::Include { with: Some(_), .. }));
        assert_eq!(
            doc.root[2],
            Node::Set { name: "x".into(), value: Expr::Literal(Value::Int(2)), line: 1 }
        );
    }

    #[test]
    fn unknown_tag_is_a_syntax_error() {
        let err = compile("{% frobnicate %}").unwrap_err();
        assert!(err.to_string().contains("unknown tag 'frobnicate'"));
    }

    #[test]
    fn missing_end_tag_is_a_syntax_error() {
        let err = compile("{% if x %}never closed").unwrap_err();
        assert!(err.to_string().contains("endif"));
    }

    #[test]
    fn stray_else_after_else_is_rejected() {
        assert!(compile("{% if a %}1{% else %}2{% elseif b %}3{% endif %}").is_err());
    }
}

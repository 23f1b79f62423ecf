//! shimmypebble: an extensible Pebble/Twig-style template engine.
//!
//! A template is compiled once into a tree and rendered many times against
//! a [`Context`]. The pipeline is a two-mode lexer, a token stream, a
//! precedence-climbing expression parser driven by the registered operator
//! table, tag dispatch through [`TagParser`] implementations, and a
//! tree-walking renderer.
//!
//! Syntax:
//! - `{{ expr }}` prints, `{% tag ... %}` executes, `{# ... #}` is dropped.
//! - Expressions: literals, names, `a.b`, `a[b]`, calls, `[..]` and `{..}`
//!   literals, `expr | filter(args)`, `expr is test`, `expr is not test`.
//! - Tags: `if`/`elseif`/`else`, `for`/`else`, `block`, `extends`, `macro`,
//!   `import`, `include`, `set`.
//!
//! Everything above is contributed by [`CoreExtension`]; user extensions
//! registered through [`EngineBuilder::extension`] add or override tags,
//! operators, filters, tests and functions.
//!
//! ```
//! use shimmypebble::{Context, Engine, MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with("base", "<h1>{% block title %}Untitled{% endblock %}</h1>")
//!     .with("page", "{% extends 'base' %}{% block title %}{{ name | upper }}{% endblock %}");
//! let engine = Engine::new(loader);
//!
//! let page = engine.compile("page").unwrap();
//! let html = page.render(&Context::new().with("name", "pebble")).unwrap();
//! assert_eq!(html, "<h1>PEBBLE</h1>");
//! ```

pub mod ast;
pub mod builtin;
pub mod context;
pub mod engine;
pub mod error;
mod eval;
pub mod extension;
pub mod lexer;
pub mod loader;
pub mod operator;
pub mod parser;
pub mod stream;
pub mod value;

pub use builtin::CoreExtension;
pub use context::Context;
pub use engine::{Charset, Engine, EngineBuilder, EngineConfig, Template};
pub use error::{Error, Result};
pub use extension::{Callable, Extension, Predicate, Registry, TagParser};
pub use loader::{FileLoader, Loader, MemoryLoader, StringLoader};
pub use operator::{Associativity, BinOp, BinaryOperator, OperatorDef, UnaryOp, UnaryOperator};
pub use value::Value;

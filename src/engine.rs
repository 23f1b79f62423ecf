use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::ast::Document;
use crate::builtin::CoreExtension;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::eval;
use crate::extension::{Extension, Registry};
use crate::loader::{Loader, StringLoader};
use crate::parser;

/// Character encoding used where text is turned into bytes (`urlencode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    /// Encodes `text`, failing on characters the charset cannot represent.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        let limit = match self {
            Charset::Utf8 => return Ok(Cow::Borrowed(text.as_bytes())),
            Charset::Latin1 => 0xFF,
            Charset::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|b| u32::from(*b) <= limit)
                    .ok_or_else(|| Error::call(format!("character '{c}' cannot be encoded as {self}")))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Cow::Owned)
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => Ok(Charset::Latin1),
            "US-ASCII" | "ASCII" => Ok(Charset::Ascii),
            _ => Err(Error::UnsupportedCharset(s.to_string())),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub charset: Charset,
    /// Drop the first newline after a `%}`.
    pub trim_blocks: bool,
}

pub struct EngineBuilder {
    loader: Box<dyn Loader>,
    charset: String,
    trim_blocks: bool,
    extensions: Vec<Box<dyn Extension>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            loader: Box::new(StringLoader),
            charset: Charset::default().to_string(),
            trim_blocks: false,
            extensions: Vec::new(),
        }
    }
}

impl EngineBuilder {
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn trim_blocks(mut self, enabled: bool) -> Self {
        self.trim_blocks = enabled;
        self
    }

    /// Registered after the core extension, in call order.
    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = EngineConfig {
            charset: self.charset.parse()?,
            trim_blocks: self.trim_blocks,
        };

        let mut registry = Registry::new();
        registry.register(&CoreExtension::new(config.charset));
        for extension in &self.extensions {
            registry.register(extension.as_ref());
        }
        debug!(charset = %config.charset, extensions = self.extensions.len() + 1, "engine initialised");

        Ok(Engine {
            inner: Arc::new(Inner {
                loader: self.loader,
                registry,
                config,
            }),
        })
    }
}

struct Inner {
    loader: Box<dyn Loader>,
    registry: Registry,
    config: EngineConfig,
}

/// Owns the loader, the extension registry and the configuration. Cloning is
/// cheap; clones share the same (read-only) state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// An engine with the core extension and default configuration.
    pub fn new(loader: impl Loader + 'static) -> Self {
        let config = EngineConfig::default();
        let mut registry = Registry::new();
        registry.register(&CoreExtension::new(config.charset));
        Self {
            inner: Arc::new(Inner {
                loader: Box::new(loader),
                registry,
                config,
            }),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Loads and compiles the named template.
    pub fn compile(&self, name: &str) -> Result<Template> {
        Ok(Template {
            engine: self.clone(),
            document: self.load_document(name)?,
        })
    }

    pub(crate) fn load_document(&self, name: &str) -> Result<Arc<Document>> {
        let source = self.inner.loader.load(name)?;
        let document = parser::compile(
            name,
            &source,
            &self.inner.registry,
            self.inner.config.trim_blocks,
        )?;
        Ok(Arc::new(document))
    }
}

/// A compiled template bound to the engine that compiled it.
#[derive(Clone)]
pub struct Template {
    engine: Engine,
    document: Arc<Document>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.document.parent.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Renders into `out`. The context is copied; the caller's stays untouched.
    pub fn evaluate(&self, out: &mut dyn fmt::Write, context: &Context) -> Result<()> {
        eval::render(&self.engine, Arc::clone(&self.document), context.clone(), out)
    }

    pub fn render(&self, context: &Context) -> Result<String> {
        let mut output = String::new();
        self.evaluate(&mut output, context)?;
        Ok(output)
    }

    /// Renders into `out` with an empty context.
    pub fn evaluate_empty(&self, out: &mut dyn fmt::Write) -> Result<()> {
        self.evaluate(out, &Context::new())
    }

    pub fn render_empty(&self) -> Result<String> {
        self.render(&Context::new())
    }
}

//! Error types shared by the lexer, parser and renderer.

use std::fmt;

use thiserror::Error;

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed template source. Fatal to compilation.
    #[error("syntax error: {message} ({template}:{line})")]
    Syntax {
        message: String,
        template: String,
        line: usize,
    },

    /// Failure while rendering a compiled template. Fatal to that render.
    #[error("render error: {message} ({template}:{line})")]
    Render {
        message: String,
        template: String,
        line: usize,
    },

    /// A loader could not resolve a template name.
    #[error("template not found: {name}")]
    TemplateNotFound { name: String },

    /// Raised by filters, tests, functions and operators; the renderer
    /// attaches the template position before it reaches the caller.
    #[error("{0}")]
    Call(String),

    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),

    #[error("failed to write output: {0}")]
    Write(#[from] fmt::Error),
}

impl Error {
    pub fn call(message: impl Into<String>) -> Self {
        Error::Call(message.into())
    }

    pub fn syntax(message: impl Into<String>, template: &str, line: usize) -> Self {
        Error::Syntax {
            message: message.into(),
            template: template.to_string(),
            line,
        }
    }

    /// Turns a positionless error into a located `Render` error. Errors that
    /// already carry a position pass through untouched.
    pub(crate) fn at(self, template: &str, line: usize) -> Self {
        let message = match self {
            Error::Call(message) => message,
            Error::TemplateNotFound { name } => format!("unable to load template '{name}'"),
            other => return other,
        };
        Error::Render {
            message,
            template: template.to_string(),
            line,
        }
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, Error>;

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};

/// Forward cursor over a token sequence. The sequence always ends with an
/// `Eof` token, which the cursor never moves past.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
    name: String,
}

impl TokenStream {
    pub fn new(name: impl Into<String>, mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenKind::Eof, "", line));
        }
        Self {
            tokens,
            cursor: 0,
            name: name.into(),
        }
    }

    /// Name of the template being parsed, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    pub fn peek(&self, n: usize) -> &Token {
        let idx = (self.cursor + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub fn line(&self) -> usize {
        self.current().line
    }

    pub fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    /// Moves past the current token and returns it.
    pub fn next(&mut self) -> Token {
        let token = self.tokens[self.cursor].clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    pub fn test(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub fn test_value(&self, kind: TokenKind, text: &str) -> bool {
        let token = self.current();
        token.kind == kind && token.text == text
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.test(kind) {
            Ok(self.next())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    pub fn expect_value(&mut self, kind: TokenKind, text: &str) -> Result<Token> {
        if self.test_value(kind, text) {
            Ok(self.next())
        } else {
            Err(self.unexpected(&format!("{kind} '{text}'")))
        }
    }

    /// Consumes the current token if it matches.
    pub fn skip_if(&mut self, kind: TokenKind, text: &str) -> bool {
        let matched = self.test_value(kind, text);
        if matched {
            self.next();
        }
        matched
    }

    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, &self.name, self.line())
    }

    fn unexpected(&self, expected: &str) -> Error {
        self.error(format!("expected {expected}, got {}", self.current()))
    }
}

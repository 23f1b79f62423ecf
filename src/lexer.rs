use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    PrintStart,   // {{
    PrintEnd,     // }}
    ExecuteStart, // {%
    ExecuteEnd,   // %}
    Name,
    Number,
    String,
    Operator,
    Punctuation,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Text => "text",
            TokenKind::PrintStart => "'{{'",
            TokenKind::PrintEnd => "'}}'",
            TokenKind::ExecuteStart => "'{%'",
            TokenKind::ExecuteEnd => "'%}'",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Eof => "end of template",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Name
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Operator
            | TokenKind::Punctuation => write!(f, "{} '{}'", self.kind, self.text),
            _ => write!(f, "{}", self.kind),
        }
    }
}

const PUNCTUATION: &[char] = &['(', ')', ',', '.', '[', ']', '{', '}', '|', ':', '='];

pub struct Lexer<'a> {
    input: &'a str,
    name: &'a str,
    cursor: usize,
    line: usize,
    operators: Vec<&'a str>,
    trim_blocks: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// `operators` is the full set of registered operator symbols; longer
    /// symbols are tried first so `>=` wins over `>` and `is not` over `is`.
    pub fn new(name: &'a str, input: &'a str, operators: &'a [String]) -> Self {
        let mut operators: Vec<&str> = operators.iter().map(String::as_str).collect();
        operators.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        operators.dedup();
        Self {
            input,
            name,
            cursor: 0,
            line: 1,
            operators,
            trim_blocks: false,
            tokens: Vec::new(),
        }
    }

    pub fn trim_blocks(mut self, enabled: bool) -> Self {
        self.trim_blocks = enabled;
        self
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        let consumed = &self.input[self.cursor..self.cursor + n];
        self.line += consumed.matches('\n').count();
        self.cursor += n;
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: usize) {
        self.tokens.push(Token::new(kind, text, line));
    }

    fn error(&self, message: impl Into<String>, line: usize) -> Error {
        Error::syntax(message, self.name, line)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        loop {
            let rest = self.remaining();
            if rest.is_empty() {
                break;
            }

            // Next `{{`, `{%` or `{#`, whichever comes first.
            let next_tag = ["{{", "{%", "{#"]
                .iter()
                .filter_map(|delim| rest.find(*delim))
                .min();

            match next_tag {
                None => {
                    let line = self.line;
                    self.push(TokenKind::Text, rest, line);
                    self.advance(rest.len());
                }
                Some(idx) => {
                    if idx > 0 {
                        let line = self.line;
                        self.push(TokenKind::Text, &rest[..idx], line);
                        self.advance(idx);
                    }
                    let start_line = self.line;
                    let delim = &self.remaining()[..2];
                    self.advance(2);
                    match delim {
                        "{#" => self.skip_comment(start_line)?,
                        "{{" => {
                            self.push(TokenKind::PrintStart, "{{", start_line);
                            self.lex_code("}}", TokenKind::PrintEnd, start_line)?;
                        }
                        _ => {
                            self.push(TokenKind::ExecuteStart, "{%", start_line);
                            self.lex_code("%}", TokenKind::ExecuteEnd, start_line)?;
                        }
                    }
                }
            }
        }

        let line = self.line;
        self.push(TokenKind::Eof, "", line);
        Ok(self.tokens)
    }

    fn skip_comment(&mut self, start_line: usize) -> Result<()> {
        match self.remaining().find("#}") {
            Some(end) => {
                self.advance(end + 2);
                Ok(())
            }
            None => Err(self.error("unclosed comment", start_line)),
        }
    }

    fn lex_code(&mut self, close: &str, end_kind: TokenKind, start_line: usize) -> Result<()> {
        // Open `{` of map literals; `}}` only closes the region outside them.
        let mut braces = 0usize;
        loop {
            let rest = self.remaining();
            let trimmed = rest.trim_start();
            self.advance(rest.len() - trimmed.len());

            let rest = self.remaining();
            let line = self.line;
            if rest.is_empty() {
                return Err(self.error(format!("unclosed tag, expected '{close}'"), start_line));
            }

            if braces == 0 && rest.starts_with(close) {
                self.advance(close.len());
                self.push(end_kind, close, line);
                if end_kind == TokenKind::ExecuteEnd && self.trim_blocks {
                    let after = self.remaining();
                    if after.starts_with('\n') {
                        self.advance(1);
                    } else if after.starts_with("\r\n") {
                        self.advance(2);
                    }
                }
                return Ok(());
            }

            if let Some((len, symbol)) = self.match_operator(rest) {
                self.push(TokenKind::Operator, symbol, line);
                self.advance(len);
                continue;
            }

            let first = rest.chars().next().unwrap_or_default();
            if first.is_ascii_digit() {
                self.lex_number(rest, line)?;
            } else if first == '\'' || first == '"' {
                self.lex_string(rest, first, line)?;
            } else if first.is_alphabetic() || first == '_' {
                let len: usize = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .map(char::len_utf8)
                    .sum();
                self.push(TokenKind::Name, &rest[..len], line);
                self.advance(len);
            } else if PUNCTUATION.contains(&first) {
                match first {
                    '{' => braces += 1,
                    '}' => braces = braces.saturating_sub(1),
                    _ => {}
                }
                self.push(TokenKind::Punctuation, first.to_string(), line);
                self.advance(first.len_utf8());
            } else {
                return Err(self.error(format!("unexpected character '{first}'"), line));
            }
        }
    }

    /// Returns the consumed byte length and the canonical symbol.
    fn match_operator(&self, rest: &str) -> Option<(usize, &'a str)> {
        self.operators.iter().find_map(|symbol| {
            let starts_with_word = symbol.chars().next().is_some_and(char::is_alphabetic);
            if starts_with_word {
                match_word_operator(rest, symbol).map(|len| (len, *symbol))
            } else if rest.starts_with(*symbol) {
                Some((symbol.len(), *symbol))
            } else {
                None
            }
        })
    }

    fn lex_number(&mut self, rest: &str, line: usize) -> Result<()> {
        let mut len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let after = &rest[len..];
        if after.starts_with('.') && after[1..].starts_with(|c: char| c.is_ascii_digit()) {
            len += 1 + after[1..].bytes().take_while(u8::is_ascii_digit).count();
        }
        if let Some(c) = rest[len..].chars().next().filter(|c| c.is_alphanumeric() || *c == '_') {
            let near = &rest[..len + c.len_utf8()];
            return Err(self.error(format!("invalid number literal near '{near}'"), line));
        }
        self.push(TokenKind::Number, &rest[..len], line);
        self.advance(len);
        Ok(())
    }

    fn lex_string(&mut self, rest: &str, quote: char, line: usize) -> Result<()> {
        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.push(TokenKind::String, value, line);
                self.advance(idx + 1);
                return Ok(());
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, esc)) => value.push(esc),
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        Err(self.error("unterminated string literal", line))
    }
}

/// Matches a (possibly multi-word) alphabetic operator on word boundaries,
/// allowing any whitespace between its words.
fn match_word_operator(rest: &str, symbol: &str) -> Option<usize> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pos = 0;
    for (i, word) in symbol.split_whitespace().enumerate() {
        if i > 0 {
            let gap = rest[pos..].len() - rest[pos..].trim_start().len();
            if gap == 0 {
                return None;
            }
            pos += gap;
        }
        if !rest[pos..].starts_with(word) {
            return None;
        }
        pos += word.len();
        if rest[pos..].starts_with(is_word) {
            return None;
        }
    }
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops() -> Vec<String> {
        ["and", "or", "not", "is", "is not", "==", "!=", ">", ">=", "<", "<=", "+", "-", "*", "/", "%"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        let ops = ops();
        Lexer::new("test", source, &ops)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn plain_text_is_one_token() {
        let tokens = kinds("Hello, world!\n");
        assert_eq!(tokens, vec![(TokenKind::Text, "Hello, world!\n".into()), (TokenKind::Eof, "".into())]);
    }

    #[test]
    fn print_region_switches_modes() {
        let tokens = kinds("a{{ x >= 10 }}b");
        let expected = vec![
            (TokenKind::Text, "a".to_string()),
            (TokenKind::PrintStart, "{{".into()),
            (TokenKind::Name, "x".into()),
            (TokenKind::Operator, ">=".into()),
            (TokenKind::Number, "10".into()),
            (TokenKind::PrintEnd, "}}".into()),
            (TokenKind::Text, "b".into()),
            (TokenKind::Eof, "".into()),
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn multi_word_operator_wins_over_prefix() {
        let tokens = kinds("{% if a is  not null %}");
        assert!(tokens.contains(&(TokenKind::Operator, "is not".into())));
        assert!(tokens.contains(&(TokenKind::Name, "null".into())));
    }

    #[test]
    fn word_operators_need_boundaries() {
        let tokens = kinds("{{ island or notes }}");
        assert_eq!(tokens[1], (TokenKind::Name, "island".into()));
        assert_eq!(tokens[2], (TokenKind::Operator, "or".into()));
        assert_eq!(tokens[3], (TokenKind::Name, "notes".into()));
    }

    #[test]
    fn strings_handle_escapes_and_both_quotes() {
        let tokens = kinds(r#"{{ 'it\'s', "a\nb" }}"#);
        assert_eq!(tokens[1], (TokenKind::String, "it's".into()));
        assert_eq!(tokens[3], (TokenKind::String, "a\nb".into()));
    }

    #[test]
    fn floats_and_attribute_dots() {
        let tokens = kinds("{{ 10.5 + user.age }}");
        assert_eq!(tokens[1], (TokenKind::Number, "10.5".into()));
        assert_eq!(tokens[4], (TokenKind::Punctuation, ".".into()));
    }

    #[test]
    fn nested_map_braces_do_not_close_the_print() {
        let tokens = kinds("{{ {'a': {'b': 1}} }}");
        let closes: Vec<_> = tokens.iter().filter(|(kind, _)| *kind == TokenKind::PrintEnd).collect();
        assert_eq!(closes.len(), 1);
        assert_eq!(tokens[tokens.len() - 2], (TokenKind::PrintEnd, "}}".into()));
        assert_eq!(tokens[tokens.len() - 3], (TokenKind::Punctuation, "}".into()));
    }

    #[test]
    fn comments_are_dropped() {
        let tokens = kinds("a{# ignored {{ x }} #}b");
        assert_eq!(
            tokens,
            vec![(TokenKind::Text, "a".into()), (TokenKind::Text, "b".into()), (TokenKind::Eof, "".into())]
        );
    }

    #[test]
    fn line_numbers_follow_newlines() {
        let ops = ops();
        let tokens = Lexer::new("test", "one\ntwo\n{{\nx }}", &ops).tokenize().unwrap();
        let name = tokens.iter().find(|t| t.kind == TokenKind::Name).unwrap();
        assert_eq!(tokens[1].line, 3);
        assert_eq!(name.line, 4);
    }

    #[test]
    fn trim_blocks_eats_one_newline() {
        let ops = ops();
        let tokens = Lexer::new("test", "{% if x %}\nbody", &ops)
            .trim_blocks(true)
            .tokenize()
            .unwrap();
        let text = tokens.iter().find(|t| t.kind == TokenKind::Text).unwrap();
        assert_eq!(text.text, "body");
    }

    #[test]
    fn unclosed_print_is_a_syntax_error() {
        let ops = ops();
        let err = Lexer::new("page", "\n{{ x ", &ops).tokenize().unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
    }

    #[test]
    fn unclosed_comment_is_a_syntax_error() {
        let ops = ops();
        let err = Lexer::new("page", "Use {# to open a comment", &ops).tokenize().unwrap_err();
        assert!(matches!(err, Error::Syntax { ref message, line: 1, .. } if message == "unclosed comment"));
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let ops = ops();
        assert!(Lexer::new("page", "{{ 'abc }}", &ops).tokenize().is_err());
    }

    #[test]
    fn malformed_number_is_a_syntax_error() {
        let ops = ops();
        assert!(Lexer::new("page", "{{ 12abc }}", &ops).tokenize().is_err());
    }
}

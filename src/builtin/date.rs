//! `SimpleDateFormat`-style patterns (`yyyy-MM-dd HH:mm`) on top of chrono.
//!
//! Patterns are translated once into a strftime string. Letters outside the
//! supported set are rejected rather than passed through, so a typo in a
//! pattern surfaces as an error instead of literal text in the output.

use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

fn field(letter: char, count: usize) -> Option<&'static str> {
    Some(match (letter, count) {
        ('y', 2) => "%y",
        ('y', _) => "%Y",
        ('M', 1) => "%-m",
        ('M', 2) => "%m",
        ('M', 3) => "%b",
        ('M', _) => "%B",
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        ('H', 1) => "%-H",
        ('H', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        ('S', _) => "%3f",
        ('E', 1..=3) => "%a",
        ('E', _) => "%A",
        ('a', _) => "%p",
        ('D', 1 | 2) => "%-j",
        ('D', _) => "%j",
        _ => return None,
    })
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Translates a date pattern into chrono's strftime syntax.
pub(crate) fn to_strftime(pattern: &str) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // '' outside quotes is a literal quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            loop {
                match chars.get(j) {
                    None => {
                        return Err(Error::call(format!(
                            "unterminated quote in date pattern '{pattern}'"
                        )))
                    }
                    Some('\'') if chars.get(j + 1) == Some(&'\'') => {
                        out.push('\'');
                        j += 2;
                    }
                    Some('\'') => break,
                    Some(&quoted) => {
                        push_literal(&mut out, quoted);
                        j += 1;
                    }
                }
            }
            i = j + 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let directive = field(c, run).ok_or_else(|| {
            Error::call(format!("unsupported letter '{c}' in date pattern '{pattern}'"))
        })?;
        out.push_str(directive);
        i += run;
    }
    Ok(out)
}

pub(crate) fn format(date: &NaiveDateTime, pattern: &str) -> Result<String> {
    let directive = to_strftime(pattern)?;
    let mut out = String::new();
    write!(out, "{}", date.format(&directive))
        .map_err(|_| Error::call(format!("invalid date pattern '{pattern}'")))?;
    Ok(out)
}

/// Parses `text` with `pattern`. Patterns without time fields yield midnight.
pub(crate) fn parse(text: &str, pattern: &str) -> Result<NaiveDateTime> {
    let directive = to_strftime(pattern)?;
    NaiveDateTime::parse_from_str(text, &directive)
        .or_else(|_| NaiveDate::parse_from_str(text, &directive).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|e| {
            Error::call(format!(
                "cannot parse '{text}' as a date with pattern '{pattern}': {e}"
            ))
        })
}

//! Core filters. The piped value is always `args[0]`; a null input renders
//! as an empty string instead of failing.

use std::sync::Arc;

use crate::engine::Charset;
use crate::error::{Error, Result};
use crate::extension::Callable;
use crate::value::Value;

use super::{date, format};

static NULL: Value = Value::Null;

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn empty() -> Value {
    Value::String(String::new())
}

/// Coerces the piped value to text. `None` means the input was null.
fn text(filter: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Date(_) => {
            Ok(Some(value.to_string()))
        }
        other => Err(Error::call(format!(
            "{filter} filter expects a string, got {}",
            other.type_name()
        ))),
    }
}

fn string_arg<'a>(filter: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    arg(args, index).as_str().ok_or_else(|| {
        Error::call(format!(
            "{filter} filter expects a string argument at position {index}, got {}",
            arg(args, index).type_name()
        ))
    })
}

/// Lifts a string transformation into a null-tolerant filter.
fn map_text(filter: &'static str, f: fn(&str) -> String) -> Callable {
    Arc::new(move |args: &[Value]| {
        Ok(text(filter, arg(args, 0))?.map_or_else(empty, |s| Value::String(f(&s))))
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn urlencode(charset: Charset, args: &[Value]) -> Result<Value> {
    let Some(input) = text("urlencode", arg(args, 0))? else {
        return Ok(empty());
    };
    let bytes = charset.encode(&input)?;
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes.iter() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(char::from(b))
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    Ok(Value::String(out))
}

fn format_filter(args: &[Value]) -> Result<Value> {
    match text("format", arg(args, 0))? {
        Some(pattern) => Ok(Value::String(format::printf(&pattern, args.get(1..).unwrap_or_default())?)),
        None => Ok(empty()),
    }
}

/// `date(target)` on a date value, or `date(source, target)` on a string.
fn date_filter(args: &[Value]) -> Result<Value> {
    let input = arg(args, 0);
    if input.is_null() {
        return Ok(empty());
    }
    let value = match args.len() {
        2 => match input {
            Value::Date(d) => *d,
            other => {
                return Err(Error::call(format!(
                    "date filter expects a date, got {}; pass the source pattern to parse strings",
                    other.type_name()
                )))
            }
        },
        3 => {
            let source = text("date", input)?.unwrap_or_default();
            date::parse(&source, string_arg("date", args, 1)?)?
        }
        _ => return Err(Error::call("date filter takes a target pattern and an optional source pattern")),
    };
    let pattern = string_arg("date", args, args.len() - 1)?;
    Ok(Value::String(date::format(&value, pattern)?))
}

fn number_filter(args: &[Value]) -> Result<Value> {
    let input = arg(args, 0);
    if input.is_null() {
        return Ok(empty());
    }
    let pattern = match args.get(1) {
        Some(Value::Null) | None => format::DEFAULT_NUMBER_PATTERN,
        Some(_) => string_arg("numberformat", args, 1)?,
    };
    Ok(Value::String(format::decimal(input, pattern)?))
}

fn abbreviate(args: &[Value]) -> Result<Value> {
    let Some(input) = text("abbreviate", arg(args, 0))? else {
        return Ok(empty());
    };
    let width = arg(args, 1)
        .as_i64()
        .ok_or_else(|| Error::call("abbreviate filter expects an integer width"))?;
    if width < 4 {
        return Err(Error::call(format!("minimum abbreviation width is 4, got {width}")));
    }
    let width = usize::try_from(width).unwrap_or(usize::MAX);
    if input.chars().count() <= width {
        return Ok(Value::String(input));
    }
    let mut out: String = input.chars().take(width - 3).collect();
    out.push_str("...");
    Ok(Value::String(out))
}

fn json(args: &[Value]) -> Result<Value> {
    let input = arg(args, 0);
    if input.is_null() {
        return Ok(empty());
    }
    serde_json::to_string(&input.to_json())
        .map(Value::String)
        .map_err(|e| Error::call(format!("json filter failed: {e}")))
}

fn default(args: &[Value]) -> Result<Value> {
    let input = arg(args, 0);
    if input.is_empty() {
        Ok(arg(args, 1).clone())
    } else {
        Ok(input.clone())
    }
}

fn callable(f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static) -> Callable {
    Arc::new(f)
}

pub(crate) fn all(charset: Charset) -> Vec<(String, Callable)> {
    [
        ("lower", map_text("lower", str::to_lowercase)),
        ("upper", map_text("upper", str::to_uppercase)),
        ("capitalize", map_text("capitalize", capitalize)),
        ("trim", map_text("trim", |s| s.trim().to_string())),
        ("urlencode", callable(move |args| urlencode(charset, args))),
        ("format", callable(format_filter)),
        ("date", callable(date_filter)),
        ("number", callable(number_filter)),
        ("numberformat", callable(number_filter)),
        ("abbreviate", callable(abbreviate)),
        ("json", callable(json)),
        ("default", callable(default)),
    ]
    .into_iter()
    .map(|(name, filter)| (name.to_string(), filter))
    .collect()
}

//! Number and string formatting behind the `format` and `numberformat`
//! filters: a printf subset (`%5.2f`, `%-8s`, `%2$s`) and a decimal pattern
//! subset (`#,##0.00`, `$#,##0`, `0.0%`).

use crate::error::{Error, Result};
use crate::value::Value;

pub(crate) const DEFAULT_NUMBER_PATTERN: &str = "#,##0.###";

/// Inserts `,` every three digits from the right of an all-digit string.
fn group(digits: &str, size: usize) -> String {
    if size == 0 || digits.len() <= size {
        return digits.to_string();
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / size);
    let lead = digits.len() % size;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + size - lead) % size == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Default)]
struct Directive {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    grouping: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Directive {
    fn pad(&self, body: String) -> String {
        let len = body.chars().count();
        match self.width {
            Some(width) if width > len => {
                let fill = " ".repeat(width - len);
                if self.left {
                    body + &fill
                } else {
                    fill + &body
                }
            }
            _ => body,
        }
    }

    /// Pads a number, honouring sign flags and zero padding.
    fn pad_number(&self, negative: bool, digits: String) -> String {
        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };
        match self.width {
            Some(width) if self.zero && !self.left && width > sign.len() + digits.len() => {
                let zeros = "0".repeat(width - sign.len() - digits.len());
                format!("{sign}{zeros}{digits}")
            }
            _ => self.pad(format!("{sign}{digits}")),
        }
    }
}

fn read_number(chars: &[char], pos: &mut usize) -> Option<usize> {
    let start = *pos;
    while chars.get(*pos).is_some_and(char::is_ascii_digit) {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    chars[start..*pos].iter().collect::<String>().parse().ok()
}

fn integer_arg(conversion: char, value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(Error::call(format!(
            "%{conversion} expects an integer, got {}",
            other.type_name()
        ))),
    }
}

fn float_arg(conversion: char, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::call(format!(
            "%{conversion} expects a number, got {}",
            value.type_name()
        ))
    })
}

/// Java-style exponent: `1.500000e+01`.
fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

fn convert(conversion: char, directive: &Directive, value: &Value) -> Result<String> {
    if value.is_null() && conversion != 'b' && conversion != 'B' {
        let text = if conversion.is_ascii_uppercase() { "NULL" } else { "null" };
        return Ok(directive.pad(text.to_string()));
    }

    let out = match conversion {
        's' | 'S' => {
            let mut text = value.to_string();
            if let Some(precision) = directive.precision {
                text = text.chars().take(precision).collect();
            }
            if conversion == 'S' {
                text = text.to_uppercase();
            }
            directive.pad(text)
        }
        'b' | 'B' => {
            let flag = match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                _ => true,
            };
            let text = flag.to_string();
            directive.pad(if conversion == 'B' { text.to_uppercase() } else { text })
        }
        'c' => {
            let c = match value {
                Value::Int(i) => u32::try_from(*i).ok().and_then(char::from_u32),
                Value::String(s) if s.chars().count() == 1 => s.chars().next(),
                _ => None,
            }
            .ok_or_else(|| Error::call(format!("%c cannot format {value}")))?;
            directive.pad(c.to_string())
        }
        'd' => {
            let i = integer_arg(conversion, value)?;
            let digits = i.unsigned_abs().to_string();
            let digits = if directive.grouping { group(&digits, 3) } else { digits };
            directive.pad_number(i < 0, digits)
        }
        'x' | 'X' | 'o' => {
            // negative values print as two's complement, like Java's long
            let i = integer_arg(conversion, value)? as u64;
            let digits = match conversion {
                'x' => format!("{i:x}"),
                'X' => format!("{i:X}"),
                _ => format!("{i:o}"),
            };
            directive.pad_number(false, digits)
        }
        'f' => {
            let f = float_arg(conversion, value)?;
            let fixed = format!("{:.*}", directive.precision.unwrap_or(6), f.abs());
            let fixed = match (directive.grouping, fixed.split_once('.')) {
                (true, Some((int, frac))) => format!("{}.{frac}", group(int, 3)),
                (true, None) => group(&fixed, 3),
                (false, _) => fixed,
            };
            directive.pad_number(f.is_sign_negative() && f != 0.0, fixed)
        }
        'e' | 'E' => {
            let f = float_arg(conversion, value)?;
            let text = scientific(f.abs(), directive.precision.unwrap_or(6));
            let text = if conversion == 'E' { text.to_uppercase() } else { text };
            directive.pad_number(f.is_sign_negative() && f != 0.0, text)
        }
        other => {
            return Err(Error::call(format!(
                "unsupported format conversion '%{other}'"
            )))
        }
    };
    Ok(out)
}

/// Formats `args` according to a printf-style `pattern`.
pub(crate) fn printf(pattern: &str, args: &[Value]) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut next_arg = 0;
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        pos += 1;
        if c != '%' {
            out.push(c);
            continue;
        }

        // explicit argument index: %2$s
        let mark = pos;
        let index = match read_number(&chars, &mut pos) {
            Some(n) if chars.get(pos) == Some(&'$') => {
                pos += 1;
                Some(n)
            }
            _ => {
                pos = mark;
                None
            }
        };

        let mut directive = Directive::default();
        while let Some(&flag) = chars.get(pos) {
            match flag {
                '-' => directive.left = true,
                '0' => directive.zero = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                ',' => directive.grouping = true,
                _ => break,
            }
            pos += 1;
        }
        directive.width = read_number(&chars, &mut pos);
        if chars.get(pos) == Some(&'.') {
            pos += 1;
            directive.precision = Some(read_number(&chars, &mut pos).unwrap_or(0));
        }

        let conversion = *chars
            .get(pos)
            .ok_or_else(|| Error::call(format!("incomplete format specifier in '{pattern}'")))?;
        pos += 1;

        match conversion {
            '%' => out.push_str(&directive.pad("%".to_string())),
            'n' => out.push('\n'),
            _ => {
                let slot = match index {
                    Some(0) => {
                        return Err(Error::call("format argument indexes start at 1"));
                    }
                    Some(n) => n - 1,
                    None => {
                        next_arg += 1;
                        next_arg - 1
                    }
                };
                let value = args.get(slot).ok_or_else(|| {
                    Error::call(format!("missing argument for format specifier '%{conversion}'"))
                })?;
                out.push_str(&convert(conversion, &directive, value)?);
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct DecimalPattern {
    prefix: String,
    suffix: String,
    grouping: usize,
    min_int: usize,
    min_frac: usize,
    max_frac: usize,
    percent: bool,
}

impl DecimalPattern {
    fn parse(pattern: &str) -> Result<Self> {
        let mut parsed = DecimalPattern::default();
        let mut number = String::new();
        // 0 = prefix, 1 = number, 2 = suffix
        let mut section = 0;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let is_number_char = matches!(c, '#' | '0' | ',' | '.');
            if section == 0 && is_number_char {
                section = 1;
            } else if section == 1 && !is_number_char {
                section = 2;
            }

            match c {
                // the negative subpattern is not supported; '-' is always used
                ';' => break,
                '\'' => {
                    let mut literal = String::new();
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        literal.push('\'');
                    } else {
                        loop {
                            match chars.next() {
                                Some('\'') if chars.peek() == Some(&'\'') => {
                                    chars.next();
                                    literal.push('\'');
                                }
                                Some('\'') => break,
                                Some(other) => literal.push(other),
                                None => {
                                    return Err(Error::call(format!(
                                        "unterminated quote in number pattern '{pattern}'"
                                    )))
                                }
                            }
                        }
                    }
                    let target = if section == 0 { &mut parsed.prefix } else { &mut parsed.suffix };
                    target.push_str(&literal);
                }
                _ if section == 1 => number.push(c),
                '%' => {
                    parsed.percent = true;
                    let target = if section == 0 { &mut parsed.prefix } else { &mut parsed.suffix };
                    target.push('%');
                }
                _ if section == 0 => parsed.prefix.push(c),
                _ => parsed.suffix.push(c),
            }
        }

        if number.is_empty() {
            return Err(Error::call(format!("number pattern '{pattern}' has no digits")));
        }
        let (int_part, frac_part) = number.split_once('.').unwrap_or((&number, ""));
        if frac_part.contains(['.', ',']) {
            return Err(Error::call(format!("malformed number pattern '{pattern}'")));
        }
        parsed.grouping = int_part.rfind(',').map_or(0, |i| int_part.len() - i - 1);
        parsed.min_int = int_part.chars().filter(|&c| c == '0').count();
        parsed.min_frac = frac_part.chars().filter(|&c| c == '0').count();
        parsed.max_frac = frac_part.len();
        Ok(parsed)
    }

    fn format(&self, value: &Value) -> Result<String> {
        let (negative, int_digits, frac_digits) = match value {
            Value::Int(i) if !self.percent => {
                (*i < 0, i.unsigned_abs().to_string(), String::new())
            }
            other => {
                let mut f = other.as_f64().ok_or_else(|| {
                    Error::call(format!(
                        "numberformat expects a number, got {}",
                        other.type_name()
                    ))
                })?;
                if self.percent {
                    f *= 100.0;
                }
                if !f.is_finite() {
                    return Ok(f.to_string());
                }
                let fixed = format!("{:.*}", self.max_frac, f.abs());
                let (int, frac) = fixed.split_once('.').unwrap_or((&fixed, ""));
                let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
                (f < 0.0 && !is_zero, int.to_string(), frac.to_string())
            }
        };

        let mut int_digits = int_digits.trim_start_matches('0').to_string();
        if int_digits.len() < self.min_int {
            int_digits = "0".repeat(self.min_int - int_digits.len()) + &int_digits;
        }
        let mut frac_digits = frac_digits;
        while frac_digits.len() > self.min_frac && frac_digits.ends_with('0') {
            frac_digits.pop();
        }
        while frac_digits.len() < self.min_frac {
            frac_digits.push('0');
        }
        if int_digits.is_empty() && frac_digits.is_empty() {
            int_digits.push('0');
        }

        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&self.prefix);
        out.push_str(&group(&int_digits, self.grouping));
        if !frac_digits.is_empty() {
            out.push('.');
            out.push_str(&frac_digits);
        }
        out.push_str(&self.suffix);
        Ok(out)
    }
}

/// Formats a number with a decimal pattern such as `$#,##0.00`.
pub(crate) fn decimal(value: &Value, pattern: &str) -> Result<String> {
    DecimalPattern::parse(pattern)?.format(value)
}

//! Global functions callable as `name(args)`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::extension::Callable;
use crate::value::Value;

fn int_arg(args: &[Value], index: usize, what: &str) -> Result<i64> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(Error::call(format!(
            "range {what} must be an integer, got {}",
            other.type_name()
        ))),
        None => Err(Error::call(format!("range requires a {what}"))),
    }
}

/// `range(start, end[, step])`, inclusive of `end`.
fn range(args: &[Value]) -> Result<Value> {
    let start = int_arg(args, 0, "start")?;
    let end = int_arg(args, 1, "end")?;
    let step = if args.len() > 2 { int_arg(args, 2, "step")? } else { 1 };
    if step == 0 {
        return Err(Error::call("range step cannot be zero"));
    }

    let mut items = Vec::new();
    let mut current = Some(start);
    while let Some(i) = current {
        if (step > 0 && i > end) || (step < 0 && i < end) {
            break;
        }
        items.push(Value::Int(i));
        current = i.checked_add(step);
    }
    Ok(Value::Array(items))
}

/// Picks the extreme among the arguments, or among the items of a single
/// array argument. No arguments yields null.
fn extreme(name: &str, args: &[Value], wanted: Ordering) -> Result<Value> {
    let candidates = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<&Value> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => match candidate.partial_cmp(current) {
                Some(ordering) if ordering == wanted => Some(candidate),
                Some(_) => Some(current),
                None => {
                    return Err(Error::call(format!(
                        "{name} cannot compare {} with {}",
                        candidate.type_name(),
                        current.type_name()
                    )))
                }
            },
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

pub(crate) fn all() -> Vec<(String, Callable)> {
    let inclusive_range: Callable = Arc::new(range);
    let min: Callable = Arc::new(|args: &[Value]| extreme("min", args, Ordering::Less));
    let max: Callable = Arc::new(|args: &[Value]| extreme("max", args, Ordering::Greater));
    vec![
        ("range".to_string(), inclusive_range),
        ("min".to_string(), min),
        ("max".to_string(), max),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn range_is_inclusive() {
        assert_eq!(range(&[Value::Int(1), Value::Int(4)]).unwrap(), ints(&[1, 2, 3, 4]));
        assert_eq!(range(&[Value::Int(0), Value::Int(10), Value::Int(5)]).unwrap(), ints(&[0, 5, 10]));
        assert_eq!(range(&[Value::Int(3), Value::Int(1), Value::Int(-1)]).unwrap(), ints(&[3, 2, 1]));
        assert_eq!(range(&[Value::Int(3), Value::Int(1)]).unwrap(), ints(&[]));
    }

    #[test]
    fn range_rejects_bad_arguments() {
        assert!(range(&[Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
        assert!(range(&[Value::Int(1)]).is_err());
        assert!(range(&[Value::from("a"), Value::Int(2)]).is_err());
    }

    #[test]
    fn range_stops_at_integer_bounds() {
        let items = range(&[Value::Int(i64::MAX - 1), Value::Int(i64::MAX)]).unwrap();
        assert_eq!(items, ints(&[i64::MAX - 1, i64::MAX]));
    }

    #[test]
    fn min_and_max() {
        let args = [Value::Int(3), Value::Float(1.5), Value::Int(7)];
        assert_eq!(extreme("min", &args, Ordering::Less).unwrap(), Value::Float(1.5));
        assert_eq!(extreme("max", &[ints(&[4, 9, 2])], Ordering::Greater).unwrap(), Value::Int(9));
        assert_eq!(extreme("max", &[], Ordering::Greater).unwrap(), Value::Null);
        assert!(extreme("min", &[Value::Int(1), Value::from("a")], Ordering::Less).is_err());
    }
}

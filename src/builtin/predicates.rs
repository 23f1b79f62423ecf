//! Core tests, used as `value is name` / `value is not name(arg)`.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::extension::Predicate;
use crate::value::Value;

fn even(args: &[Value]) -> Result<bool> {
    match args.first() {
        Some(Value::Int(i)) => Ok(i % 2 == 0),
        other => Err(Error::call(format!(
            "parity tests expect an integer, got {}",
            other.map_or("nothing", Value::type_name)
        ))),
    }
}

fn second(args: &[Value]) -> Result<&Value> {
    args.get(1)
        .ok_or_else(|| Error::call("equalTo needs a value to compare against"))
}

fn predicate(f: impl Fn(&[Value]) -> Result<bool> + Send + Sync + 'static) -> Predicate {
    Arc::new(f)
}

pub(crate) fn all() -> Vec<(String, Predicate)> {
    [
        ("even", predicate(even)),
        ("odd", predicate(|args| even(args).map(|even| !even))),
        ("null", predicate(|args| Ok(args.first().map_or(true, Value::is_null)))),
        ("empty", predicate(|args| Ok(args.first().map_or(true, Value::is_empty)))),
        (
            "iterable",
            predicate(|args| Ok(matches!(args.first(), Some(Value::Array(_) | Value::Map(_))))),
        ),
        (
            "equalTo",
            predicate(|args| Ok(args.first().unwrap_or(&Value::Null) == second(args)?)),
        ),
    ]
    .into_iter()
    .map(|(name, test)| (name.to_string(), test))
    .collect()
}

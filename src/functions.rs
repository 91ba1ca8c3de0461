//! Built-in scalar functions.
//!
//! Arguments arrive already evaluated. A MISSING argument generally yields
//! MISSING and an argument of the wrong type yields NULL; only a wrong number
//! of arguments or an invalid regular expression is an error.

use crate::evaluator::EvalError;
use crate::value::{Value, ValueType};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive, prelude::ToPrimitive};

const AGGREGATES: &[&str] = &["array_agg", "avg", "count", "max", "min", "sum"];

/// True for names that aggregate over a group rather than a single item.
pub fn is_aggregate(name: &str) -> bool {
    AGGREGATES.contains(&name.to_ascii_lowercase().as_str())
}

/// Calls the scalar function `name` (lower case) with evaluated `args`.
/// `item` is the current item, consulted by `META()` without arguments.
pub fn call(name: &str, args: &[Value], item: &Value) -> Result<Value, EvalError> {
    if is_aggregate(name) {
        return Err(EvalError::Aggregate(name.to_string()));
    }

    match name {
        // Strings
        "lower" => {
            arity(name, args, 1, 1)?;
            Ok(map_string(&args[0], |s| Value::from(s.to_lowercase())))
        }
        "upper" => {
            arity(name, args, 1, 1)?;
            Ok(map_string(&args[0], |s| Value::from(s.to_uppercase())))
        }
        "length" => {
            arity(name, args, 1, 1)?;
            Ok(map_string(&args[0], |s| Value::from(s.chars().count())))
        }
        "trim" => {
            arity(name, args, 1, 1)?;
            Ok(map_string(&args[0], |s| Value::from(s.trim())))
        }
        "regexp_contains" => {
            arity(name, args, 2, 2)?;
            regexp_contains(&args[0], &args[1])
        }

        // Numbers
        "abs" => {
            arity(name, args, 1, 1)?;
            Ok(map_number(&args[0], |n| match n {
                Value::Integer(i) => i
                    .checked_abs()
                    .map_or(Value::Float((*i as f64).abs()), Value::Integer),
                Value::Float(f) => Value::Float(f.abs()),
                _ => Value::Null,
            }))
        }
        "ceil" => {
            arity(name, args, 1, 1)?;
            Ok(map_number(&args[0], |n| whole(n, f64::ceil)))
        }
        "floor" => {
            arity(name, args, 1, 1)?;
            Ok(map_number(&args[0], |n| whole(n, f64::floor)))
        }
        "round" => {
            arity(name, args, 1, 2)?;
            round(&args[0], args.get(1))
        }

        // Types and conditionals
        "type" => {
            arity(name, args, 1, 1)?;
            Ok(Value::from(args[0].value_type().to_string()))
        }
        "ifmissing" => {
            arity(name, args, 2, usize::MAX)?;
            Ok(first_where(args, |v| !v.is_missing()))
        }
        "ifnull" => {
            arity(name, args, 2, usize::MAX)?;
            Ok(first_where(args, |v| !v.is_null()))
        }
        "ifmissingornull" => {
            arity(name, args, 2, usize::MAX)?;
            Ok(first_where(args, |v| v.value_type() > ValueType::Null))
        }

        // Arrays and objects
        "array_length" => {
            arity(name, args, 1, 1)?;
            Ok(match args[0].resolved() {
                Value::Missing => Value::Missing,
                Value::Array(items) => Value::from(items.len()),
                _ => Value::Null,
            })
        }
        "array_contains" => {
            arity(name, args, 2, 2)?;
            Ok(match (args[0].resolved(), &args[1]) {
                (Value::Missing, _) => Value::Missing,
                (_, needle) if needle.is_missing() => Value::Missing,
                (Value::Array(items), needle) => {
                    Value::Boolean(items.iter().any(|item| item.equals(needle)))
                }
                _ => Value::Null,
            })
        }
        "object_names" => {
            arity(name, args, 1, 1)?;
            Ok(match args[0].resolved() {
                Value::Missing => Value::Missing,
                Value::Object(fields) => {
                    Value::Array(fields.keys().map(|k| Value::from(k.as_str())).collect())
                }
                _ => Value::Null,
            })
        }

        // Metadata attached to fetched documents
        "meta" => {
            arity(name, args, 0, 1)?;
            Ok(args.first().unwrap_or(item).meta())
        }

        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min} to {max}")
    };
    Err(EvalError::Arity {
        name: name.to_string(),
        expected,
        actual: args.len(),
    })
}

fn map_string(arg: &Value, f: impl FnOnce(&str) -> Value) -> Value {
    match arg.resolved() {
        Value::Missing => Value::Missing,
        Value::String(s) => f(s),
        _ => Value::Null,
    }
}

fn map_number(arg: &Value, f: impl FnOnce(&Value) -> Value) -> Value {
    match arg.resolved() {
        Value::Missing => Value::Missing,
        n @ (Value::Integer(_) | Value::Float(_)) => f(n),
        _ => Value::Null,
    }
}

/// Applies a rounding function, keeping integers as they are.
fn whole(n: &Value, f: fn(f64) -> f64) -> Value {
    match n {
        Value::Float(x) => {
            let rounded = f(*x);
            if rounded.abs() < 9.2e18 {
                Value::Integer(rounded as i64)
            } else {
                Value::Float(rounded)
            }
        }
        other => other.clone(),
    }
}

/// `ROUND(n [, digits])`, rounding half away from zero.
fn round(n: &Value, digits: Option<&Value>) -> Result<Value, EvalError> {
    let digits = match digits.map(Value::resolved) {
        None => 0,
        Some(Value::Missing) => return Ok(Value::Missing),
        Some(d) => match d.as_i64() {
            Some(d) => d.clamp(0, 28) as u32,
            None => return Ok(Value::Null),
        },
    };

    Ok(map_number(n, |n| match n {
        Value::Integer(_) => n.clone(),
        Value::Float(x) => {
            if let Some(d) = Decimal::from_f64(*x) {
                let rounded = d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
                if rounded.is_integer()
                    && let Some(i) = rounded.to_i64()
                {
                    return Value::Integer(i);
                }
                if let Some(f) = rounded.to_f64() {
                    return Value::Float(f);
                }
            }
            Value::Float(*x)
        }
        _ => Value::Null,
    }))
}

fn first_where(args: &[Value], keep: impl Fn(&Value) -> bool) -> Value {
    args.iter()
        .find(|v| keep(v))
        .cloned()
        .unwrap_or(Value::Null)
}

fn regexp_contains(subject: &Value, pattern: &Value) -> Result<Value, EvalError> {
    if subject.is_missing() || pattern.is_missing() {
        return Ok(Value::Missing);
    }
    let (Some(subject), Some(pattern)) = (subject.as_str(), pattern.as_str()) else {
        return Ok(Value::Null);
    };
    let re = Regex::new(pattern).map_err(|e| EvalError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(Value::Boolean(re.is_match(subject)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call1(name: &str, arg: Value) -> Value {
        call(name, &[arg], &Value::Missing).unwrap()
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call1("lower", Value::from("AbC")), Value::from("abc"));
        assert_eq!(call1("upper", Value::from("abc")), Value::from("ABC"));
        assert_eq!(call1("length", Value::from("héllo")), Value::from(5));
        assert_eq!(call1("trim", Value::from("  x ")), Value::from("x"));
        assert_eq!(call1("lower", Value::Missing), Value::Missing);
        assert_eq!(call1("lower", Value::from(1)), Value::Null);
    }

    #[test]
    fn test_number_functions() {
        assert_eq!(call1("abs", Value::from(-3)), Value::from(3));
        assert_eq!(call1("ceil", Value::from(1.2)), Value::from(2));
        assert_eq!(call1("floor", Value::from(-1.2)), Value::from(-2));
        assert_eq!(call1("round", Value::from(2.5)), Value::from(3));
        assert_eq!(
            call("round", &[Value::from(2.345), Value::from(2)], &Value::Missing).unwrap(),
            Value::from(2.35)
        );
        assert_eq!(call1("abs", Value::from("x")), Value::Null);
    }

    #[test]
    fn test_conditionals() {
        let args = [Value::Missing, Value::Null, Value::from(1)];
        assert_eq!(call("ifmissing", &args, &Value::Missing).unwrap(), Value::Null);
        assert_eq!(call("ifnull", &args, &Value::Missing).unwrap(), Value::Missing);
        assert_eq!(
            call("ifmissingornull", &args, &Value::Missing).unwrap(),
            Value::from(1)
        );
    }

    #[test]
    fn test_collections() {
        let array = Value::from(vec![Value::from(1), Value::from("a")]);
        assert_eq!(call1("array_length", array.clone()), Value::from(2));
        assert_eq!(
            call("array_contains", &[array, Value::from(1.0)], &Value::Missing).unwrap(),
            Value::Boolean(true)
        );
        let object: Value = serde_json::json!({"b": 1, "a": 2}).into();
        assert_eq!(
            call1("object_names", object),
            Value::from(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(call1("type", Value::Null), Value::from("null"));
    }

    #[test]
    fn test_meta_reads_item_attachments() {
        let mut doc = Value::from(serde_json::json!({"x": 1}));
        doc.set_annotation("id", Value::from("k1"));
        let meta = call("meta", &[], &doc).unwrap();
        assert_eq!(meta.field("id"), Some(&Value::from("k1")));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            call("nope", &[], &Value::Missing),
            Err(EvalError::UnknownFunction(_))
        ));
        assert!(matches!(
            call("lower", &[], &Value::Missing),
            Err(EvalError::Arity { .. })
        ));
        assert!(matches!(
            call("count", &[], &Value::Missing),
            Err(EvalError::Aggregate(_))
        ));
        assert!(matches!(
            call(
                "regexp_contains",
                &[Value::from("a"), Value::from("(")],
                &Value::Missing
            ),
            Err(EvalError::Pattern { .. })
        ));
        assert!(is_aggregate("COUNT"));
    }
}

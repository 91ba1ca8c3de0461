//! Three-valued AND / OR / NOT.
//!
//! A definite boolean outcome wins as soon as it is seen. Otherwise MISSING
//! dominates NULL, which dominates the neutral result.
//!
//! The folds take operands lazily, as results of evaluating them, so the
//! remaining operands are never evaluated once the outcome is settled.

use crate::value::{Value, ValueType};

/// True when `value` settles an AND: it ranks above NULL and is not truthy.
pub fn and_short_circuit(value: &Value) -> bool {
    value.value_type() > ValueType::Null && !value.truth()
}

/// True when `value` settles an OR: it ranks above NULL and is truthy.
pub fn or_short_circuit(value: &Value) -> bool {
    value.value_type() > ValueType::Null && value.truth()
}

/// Unknown operands seen before the result is settled.
#[derive(Debug, Default)]
struct Unknowns {
    missing: bool,
    null: bool,
}

impl Unknowns {
    fn record(&mut self, value: &Value) {
        match value.value_type() {
            ValueType::Missing => self.missing = true,
            ValueType::Null => self.null = true,
            _ => {}
        }
    }

    fn resolve(self, otherwise: bool) -> Value {
        if self.missing {
            Value::Missing
        } else if self.null {
            Value::Null
        } else {
            Value::Boolean(otherwise)
        }
    }
}

/// Conjunction of `operands`, evaluated left to right.
///
/// # Examples
/// ```
/// use docql::logic::and_values;
/// use docql::value::Value;
///
/// let operands = [Value::Null, Value::Boolean(true)];
/// let result = and_values(operands.into_iter().map(Ok::<_, ()>));
/// assert_eq!(result, Ok(Value::Null));
/// ```
pub fn and_values<I, E>(operands: I) -> Result<Value, E>
where
    I: IntoIterator<Item = Result<Value, E>>,
{
    let mut unknowns = Unknowns::default();
    for operand in operands {
        let value = operand?;
        if and_short_circuit(&value) {
            return Ok(Value::Boolean(false));
        }
        unknowns.record(&value);
    }
    Ok(unknowns.resolve(true))
}

/// Disjunction of `operands`, evaluated left to right.
pub fn or_values<I, E>(operands: I) -> Result<Value, E>
where
    I: IntoIterator<Item = Result<Value, E>>,
{
    let mut unknowns = Unknowns::default();
    for operand in operands {
        let value = operand?;
        if or_short_circuit(&value) {
            return Ok(Value::Boolean(true));
        }
        unknowns.record(&value);
    }
    Ok(unknowns.resolve(false))
}

/// MISSING and NULL pass through; anything else negates its truth.
pub fn not_value(value: &Value) -> Value {
    match value.value_type() {
        ValueType::Missing => Value::Missing,
        ValueType::Null => Value::Null,
        _ => Value::Boolean(!value.truth()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;

    fn and(values: &[Value]) -> Value {
        and_values(values.iter().cloned().map(Ok::<_, Infallible>)).unwrap()
    }

    fn or(values: &[Value]) -> Value {
        or_values(values.iter().cloned().map(Ok::<_, Infallible>)).unwrap()
    }

    const T: Value = Value::Boolean(true);
    const F: Value = Value::Boolean(false);

    #[test]
    fn test_and_truth_table() {
        assert_eq!(and(&[T, T]), T);
        assert_eq!(and(&[T, F]), F);
        assert_eq!(and(&[Value::Missing, T]), Value::Missing);
        assert_eq!(and(&[Value::Null, T]), Value::Null);
        assert_eq!(and(&[Value::Missing, Value::Null]), Value::Missing);
        assert_eq!(and(&[Value::Null, Value::Missing]), Value::Missing);
        assert_eq!(and(&[F, Value::Missing]), F);
        assert_eq!(and(&[Value::Missing, F]), F);
        assert_eq!(and(&[]), T);
    }

    #[test]
    fn test_or_truth_table() {
        assert_eq!(or(&[F, F]), F);
        assert_eq!(or(&[F, T]), T);
        assert_eq!(or(&[Value::Missing, F]), Value::Missing);
        assert_eq!(or(&[Value::Null, F]), Value::Null);
        assert_eq!(or(&[Value::Missing, Value::Null]), Value::Missing);
        assert_eq!(or(&[T, Value::Missing]), T);
        assert_eq!(or(&[]), F);
    }

    #[test]
    fn test_non_boolean_operands_use_truth() {
        assert_eq!(and(&[Value::from(1), Value::from("x")]), T);
        assert_eq!(and(&[Value::from(0), T]), F);
        assert_eq!(or(&[Value::from(""), Value::from(vec![Value::Null])]), T);
    }

    #[test]
    fn test_short_circuit_stops_evaluation() {
        let evaluated = Cell::new(0);
        let operands = [F, T, T].into_iter().map(|v| {
            evaluated.set(evaluated.get() + 1);
            Ok::<_, Infallible>(v)
        });
        assert_eq!(and_values(operands).unwrap(), F);
        assert_eq!(evaluated.get(), 1);

        let evaluated = Cell::new(0);
        let operands = [Value::Null, T, F].into_iter().map(|v| {
            evaluated.set(evaluated.get() + 1);
            Ok::<_, Infallible>(v)
        });
        assert_eq!(or_values(operands).unwrap(), T);
        assert_eq!(evaluated.get(), 2);
    }

    #[test]
    fn test_errors_propagate() {
        let operands = vec![Ok(T), Err("boom"), Ok(F)];
        assert_eq!(and_values(operands), Err("boom"));
    }

    #[test]
    fn test_not() {
        assert_eq!(not_value(&T), F);
        assert_eq!(not_value(&Value::from(0)), T);
        assert_eq!(not_value(&Value::Null), Value::Null);
        assert_eq!(not_value(&Value::Missing), Value::Missing);
    }

    #[test]
    fn test_short_circuit_predicates() {
        assert!(and_short_circuit(&F));
        assert!(!and_short_circuit(&Value::Null));
        assert!(!and_short_circuit(&Value::Missing));
        assert!(or_short_circuit(&Value::from("yes")));
        assert!(!or_short_circuit(&Value::Null));
    }
}

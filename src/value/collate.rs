use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{Value, ValueType};

/// 2^63 as a float; the first float outside the `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

impl Value {
    /// Total order over all values.
    ///
    /// Values of different types order by their [`ValueType`]. Numbers compare
    /// by value regardless of encoding, with NaN below every other number.
    /// Arrays compare element by element, then by length. Objects compare by
    /// field count, then by their sorted field names, then by values.
    pub fn collate(&self, other: &Value) -> Ordering {
        let (left, right) = (self.resolved(), other.resolved());
        let (left_type, right_type) = (left.value_type(), right.value_type());
        if left_type != right_type {
            return left_type.cmp(&right_type);
        }

        match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => collate_arrays(a, b),
            (Value::Object(a), Value::Object(b)) => collate_objects(a, b),
            _ if left_type == ValueType::Number => collate_numbers(left, right),
            _ => Ordering::Equal,
        }
    }

    /// Value equality, consistent with [`Value::collate`].
    pub fn equals(&self, other: &Value) -> bool {
        self.collate(other) == Ordering::Equal
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.collate(other))
    }
}

fn collate_arrays(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.collate(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn collate_objects(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.keys().cmp(b.keys()))
        .then_with(|| {
            a.values()
                .zip(b.values())
                .map(|(x, y)| x.collate(y))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
}

fn collate_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => collate_floats(*x, *y),
        (Value::Integer(x), Value::Float(y)) => collate_int_float(*x, *y),
        (Value::Float(x), Value::Integer(y)) => collate_int_float(*y, *x).reverse(),
        _ => Ordering::Equal,
    }
}

fn collate_floats(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer with a float, without rounding the integer.
fn collate_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_order() {
        let ordered = [
            Value::Missing,
            Value::Null,
            Value::Boolean(true),
            Value::Integer(-5),
            Value::from(""),
            Value::Array(vec![]),
            Value::Object(BTreeMap::new()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].collate(&pair[1]), Ordering::Less);
            assert_eq!(pair[1].collate(&pair[0]), Ordering::Greater);
        }
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(Value::Integer(2).collate(&Value::Float(2.0)), Ordering::Equal);
        assert_eq!(Value::Integer(2).collate(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Integer(-2).collate(&Value::Float(-2.5)), Ordering::Greater);
        assert_eq!(Value::Integer(i64::MAX).collate(&Value::Float(I64_BOUND)), Ordering::Less);
        assert_eq!(Value::Integer(i64::MIN).collate(&Value::Float(-I64_BOUND)), Ordering::Equal);
        assert_eq!(Value::Float(f64::NAN).collate(&Value::Float(f64::NEG_INFINITY)), Ordering::Less);
        assert_eq!(Value::Float(-0.0).collate(&Value::Integer(0)), Ordering::Equal);
    }

    #[test]
    fn booleans_false_before_true() {
        assert_eq!(Value::Boolean(false).collate(&Value::Boolean(true)), Ordering::Less);
        assert!(Value::Boolean(true).equals(&Value::Boolean(true)));
        assert!(!Value::Boolean(true).equals(&Value::Integer(1)));
    }

    #[test]
    fn arrays_and_objects() {
        let short = Value::Array(vec![Value::Integer(1)]);
        let long = Value::Array(vec![Value::Integer(1), Value::Integer(0)]);
        assert_eq!(short.collate(&long), Ordering::Less);

        let a = Value::parsed(r#"{"a": 1, "b": 2}"#);
        let b = Value::parsed(r#"{"a": 1, "c": 0}"#);
        let c = Value::parsed(r#"{"z": 1}"#);
        assert_eq!(a.collate(&b), Ordering::Less);
        assert_eq!(c.collate(&a), Ordering::Less);
    }

    #[test]
    fn wrappers_compare_as_their_contents() {
        let plain = Value::Boolean(true);
        let parsed = Value::parsed("true");
        let annotated = Value::annotated(Value::Boolean(true));
        assert!(plain.equals(&parsed));
        assert!(parsed.equals(&annotated));
        assert_eq!(annotated.collate(&Value::Boolean(false)), Ordering::Greater);
    }
}

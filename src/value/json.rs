//! JSON wire form of values.
//!
//! `Missing` has no JSON spelling: at the top level and inside arrays it is
//! written as `null`, inside objects the field is left out. Booleans are the
//! bare `true`/`false` tokens; non-finite floats become `null`.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::Value;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing | Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Float(_) => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(None)?;
                for (key, value) in fields.iter().filter(|(_, v)| !v.is_missing()) {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Parsed(parsed) => parsed.resolve().serialize(serializer),
            Value::Annotated(annotated) => annotated.value().serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v.resolved() {
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => serde_json::Value::Array(arr.iter().map(serde_json::Value::from).collect()),
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter()
                    .filter(|(_, v)| !v.is_missing())
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
            _ => serde_json::Value::Null,
        }
    }
}

/// Compact JSON text of a value, keys in sorted order.
///
/// ```
/// use docql::Value;
/// use docql::value::to_json;
///
/// assert_eq!(to_json(&Value::Boolean(true)), "true");
/// assert_eq!(to_json(&Value::parsed(r#"{"b": 1, "a": [false]}"#)), r#"{"a":[false],"b":1}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    serde_json::Value::from(value).to_string()
}

/// Pretty JSON text of a value with 2-space indentation.
pub fn to_json_pretty(value: &Value) -> String {
    format!("{:#}", serde_json::Value::from(value))
}

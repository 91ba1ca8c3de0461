use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

mod collate;
mod json;
mod lazy;

pub use json::{to_json, to_json_pretty};
pub use lazy::{AnnotatedValue, ParsedValue};

/// The type tag of a [`Value`].
///
/// Declaration order is the cross-type collation order: a value of a lower tag
/// always sorts before a value of a higher tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Missing,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Missing => "missing",
            ValueType::Null => "null",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Errors raised by the structural mutators of [`Value`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// Attempt to set or unset a field/index on a value that has none.
    #[error("cannot set {target} on a {value_type} value")]
    Unsettable { target: String, value_type: ValueType },

    /// Array index outside the bounds of the array.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
}

/// A JSON-compatible value as seen by the query language.
///
/// Besides the JSON types there is `Missing`, the absence of a value, which
/// sorts below `Null`. Numbers keep their integer or float encoding but compare
/// by value across encodings.
///
/// Two variants defer work: `Parsed` holds raw JSON text that is decoded on
/// first use, and `Annotated` carries attachments (document metadata) next to
/// an inner value. Both forward every operation to the value they wrap.
///
/// # Examples
///
/// ```
/// use docql::{Value, ValueType};
///
/// let doc = Value::parsed(r#"{"name": "Alice", "tags": ["a", "b"]}"#);
/// assert_eq!(doc.value_type(), ValueType::Object);
/// assert_eq!(doc.field("name"), Some(&Value::from("Alice")));
/// assert!(Value::Integer(1).equals(&Value::Float(1.0)));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// No value at all
    Missing,

    /// JSON null
    Null,

    /// JSON boolean
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered list of values
    Array(Vec<Value>),

    /// Object with string keys, kept sorted
    Object(BTreeMap<String, Value>),

    /// Raw JSON decoded on first access
    Parsed(Arc<ParsedValue>),

    /// A value with attachments
    Annotated(Arc<AnnotatedValue>),
}

impl Value {
    /// Wraps raw JSON text that is only decoded when first inspected.
    pub fn parsed(raw: impl Into<String>) -> Self {
        Value::Parsed(Arc::new(ParsedValue::new(raw)))
    }

    /// Wraps `value` so that attachments can be carried alongside it.
    pub fn annotated(value: Value) -> Self {
        match value {
            Value::Annotated(_) => value,
            other => Value::Annotated(Arc::new(AnnotatedValue::new(other))),
        }
    }

    /// Returns the concrete value behind any lazy or annotated wrapper.
    pub fn resolved(&self) -> &Value {
        match self {
            Value::Parsed(parsed) => parsed.resolve(),
            Value::Annotated(annotated) => annotated.value().resolved(),
            other => other,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self.resolved() {
            Value::Missing => ValueType::Missing,
            Value::Null => ValueType::Null,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) | Value::Float(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            Value::Parsed(_) | Value::Annotated(_) => ValueType::Missing,
        }
    }

    /// The native JSON form of this value, for interop.
    pub fn actual(&self) -> serde_json::Value {
        serde_json::Value::from(self)
    }

    pub fn is_missing(&self) -> bool {
        self.value_type() == ValueType::Missing
    }

    pub fn is_null(&self) -> bool {
        self.value_type() == ValueType::Null
    }

    /// Boolean interpretation used by the logical operators.
    ///
    /// Booleans are their own truth; numbers are true when non-zero; strings,
    /// arrays and objects when non-empty. Missing and null are false.
    pub fn truth(&self) -> bool {
        match self.resolved() {
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.resolved() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.resolved() {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view of a number; floats qualify only when they are whole.
    pub fn as_i64(&self) -> Option<i64> {
        match self.resolved() {
            Value::Integer(n) => Some(*n),
            Value::Float(n) if n.fract() == 0.0 && n.abs() < 9.2e18 => Some(*n as i64),
            _ => None,
        }
    }

    /// A shallow copy; lazy state is shared with the original.
    pub fn copy(&self) -> Value {
        self.clone()
    }

    /// A deep, fully materialised copy that may be mutated without affecting
    /// any other holder of the original.
    pub fn copy_for_update(&self) -> Value {
        match self {
            Value::Parsed(parsed) => parsed.resolve().copy_for_update(),
            Value::Annotated(annotated) => {
                let mut copy = annotated.as_ref().clone();
                *copy.value_mut() = annotated.value().copy_for_update();
                Value::Annotated(Arc::new(copy))
            }
            Value::Array(items) => Value::Array(items.iter().map(Value::copy_for_update).collect()),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.copy_for_update()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    // ========================================
    // Navigation
    // ========================================

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.resolved() {
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// All fields of an object value.
    pub fn fields(&self) -> Option<&BTreeMap<String, Value>> {
        match self.resolved() {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Sets `name` on an object. Setting `Missing` removes the field.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), ValueError> {
        match self.materialize() {
            Value::Object(fields) => {
                if value.is_missing() {
                    fields.remove(name);
                } else {
                    fields.insert(name.to_string(), value);
                }
                Ok(())
            }
            other => Err(unsettable(name, other.value_type())),
        }
    }

    pub fn unset_field(&mut self, name: &str) -> Result<(), ValueError> {
        match self.materialize() {
            Value::Object(fields) => {
                fields.remove(name);
                Ok(())
            }
            other => Err(unsettable(name, other.value_type())),
        }
    }

    /// Element at `index`; negative indices count from the end.
    pub fn index(&self, index: i64) -> Option<&Value> {
        match self.resolved() {
            Value::Array(items) => normalize_index(index, items.len()).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Replaces an existing element. Arrays cannot hold `Missing`, it is stored as `Null`.
    pub fn set_index(&mut self, index: i64, value: Value) -> Result<(), ValueError> {
        match self.materialize() {
            Value::Array(items) => {
                let len = items.len();
                let slot = normalize_index(index, len)
                    .and_then(|i| items.get_mut(i))
                    .ok_or(ValueError::IndexOutOfRange { index, len })?;
                *slot = if value.is_missing() { Value::Null } else { value };
                Ok(())
            }
            other => Err(unsettable(&index.to_string(), other.value_type())),
        }
    }

    /// Elements in `[start, end)`; negative bounds count from the end.
    pub fn slice(&self, start: i64, end: i64) -> Option<Value> {
        match self.resolved() {
            Value::Array(items) => {
                let len = items.len();
                let start = normalize_bound(start, len)?;
                let end = normalize_bound(end, len)?;
                (start <= end).then(|| Value::Array(items[start..end].to_vec()))
            }
            _ => None,
        }
    }

    /// Elements from `start` to the end of the array.
    pub fn slice_tail(&self, start: i64) -> Option<Value> {
        match self.resolved() {
            Value::Array(items) => {
                let start = normalize_bound(start, items.len())?;
                Some(Value::Array(items[start..].to_vec()))
            }
            _ => None,
        }
    }

    /// Appends every nested value depth-first. Scalars contribute nothing.
    pub fn descendants(&self, buffer: &mut Vec<Value>) {
        match self.resolved() {
            Value::Array(items) => {
                for item in items {
                    buffer.push(item.clone());
                    item.descendants(buffer);
                }
            }
            Value::Object(fields) => {
                for value in fields.values() {
                    buffer.push(value.clone());
                    value.descendants(buffer);
                }
            }
            _ => {}
        }
    }

    // ========================================
    // Annotations
    // ========================================

    /// Attachment `key`, if this value is annotated.
    pub fn annotation(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Annotated(annotated) => annotated.attachment(key),
            _ => None,
        }
    }

    /// Sets an attachment, wrapping the value in an annotation first if needed.
    pub fn set_annotation(&mut self, key: &str, value: Value) {
        if !matches!(self, Value::Annotated(_)) {
            let inner = std::mem::replace(self, Value::Missing);
            *self = Value::annotated(inner);
        }
        if let Value::Annotated(annotated) = self {
            Arc::make_mut(annotated).set_attachment(key, value);
        }
    }

    /// All attachments as an object, or `Missing` when there are none.
    pub fn meta(&self) -> Value {
        match self {
            Value::Annotated(annotated) => Value::Object(annotated.attachments().clone()),
            _ => Value::Missing,
        }
    }

    /// Replaces a lazily parsed value with its decoded form and returns the
    /// concrete value that mutations should apply to. Annotations are kept.
    fn materialize(&mut self) -> &mut Value {
        if let Value::Parsed(parsed) = self {
            let resolved = parsed.resolve().clone();
            *self = resolved;
        }
        match self {
            Value::Annotated(annotated) => Arc::make_mut(annotated).value_mut().materialize(),
            other => other,
        }
    }
}

fn unsettable(target: &str, value_type: ValueType) -> ValueError {
    ValueError::Unsettable {
        target: target.to_string(),
        value_type,
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn normalize_bound(bound: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let bound = if bound < 0 { len + bound } else { bound };
    (0..=len).contains(&bound).then_some(bound as usize)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Integer)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Object(fields)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved() {
            Value::Missing => f.write_str("missing"),
            _ => f.write_str(&to_json(self)),
        }
    }
}

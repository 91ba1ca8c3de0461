use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use once_cell::sync::OnceCell;

use super::Value;

/// Raw JSON text that is decoded at most once, on first use.
///
/// Text that is not valid JSON resolves to `Missing`.
pub struct ParsedValue {
    raw: String,
    parsed: OnceCell<Value>,
}

impl ParsedValue {
    pub fn new(raw: impl Into<String>) -> Self {
        ParsedValue {
            raw: raw.into(),
            parsed: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_resolved(&self) -> bool {
        self.parsed.get().is_some()
    }

    pub fn resolve(&self) -> &Value {
        self.parsed
            .get_or_init(|| match serde_json::from_str::<serde_json::Value>(&self.raw) {
                Ok(json) => Value::from(json),
                Err(err) => {
                    warn!("unparseable document treated as missing: {}", err);
                    Value::Missing
                }
            })
    }
}

impl fmt::Debug for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parsed.get() {
            Some(value) => f.debug_tuple("Parsed").field(value).finish(),
            None => f.debug_tuple("Unparsed").field(&self.raw).finish(),
        }
    }
}

/// A value together with named attachments such as document metadata.
#[derive(Debug, Clone)]
pub struct AnnotatedValue {
    value: Value,
    attachments: BTreeMap<String, Value>,
}

impl AnnotatedValue {
    pub fn new(value: Value) -> Self {
        AnnotatedValue {
            value,
            attachments: BTreeMap::new(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn attachment(&self, key: &str) -> Option<&Value> {
        self.attachments.get(key)
    }

    pub fn attachments(&self) -> &BTreeMap<String, Value> {
        &self.attachments
    }

    pub fn set_attachment(&mut self, key: &str, value: Value) {
        self.attachments.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_once_on_demand() {
        let parsed = ParsedValue::new(r#"[1, 2]"#);
        assert!(!parsed.is_resolved());
        assert_eq!(parsed.resolve(), &Value::Array(vec![Value::Integer(1), Value::Integer(2)]));
        assert!(parsed.is_resolved());
        assert_eq!(parsed.raw(), "[1, 2]");
    }

    #[test]
    fn invalid_json_is_missing() {
        assert!(ParsedValue::new("{not json").resolve().is_missing());
    }
}

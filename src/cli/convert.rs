//! Turning command-line text into values, parameters and datastores

use crate::ast::DEFAULT_NAMESPACE;
use crate::datastore::MemoryDatastore;
use crate::value::Value;

use super::CliError;

/// Parses JSON text into a value.
pub fn parse_json(text: &str) -> Result<Value, CliError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(json.into())
}

/// Parses a `name=<json>` named parameter. A value that is not valid JSON is
/// taken as a plain string.
pub fn parse_param(text: &str) -> Result<(String, Value), CliError> {
    let (name, value) = text
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::InvalidParam(text.to_string()))?;
    let name = name.trim_start_matches('$').to_string();
    let value = parse_json(value).unwrap_or_else(|_| Value::from(value));
    Ok((name, value))
}

/// Builds an in-memory datastore from a JSON object mapping
/// `keyspace` or `namespace:keyspace` to an object of documents by key.
///
/// ```text
/// { "users": { "u1": {"name": "ann"} }, "travel:hotels": { ... } }
/// ```
pub fn load_datastore(text: &str) -> Result<MemoryDatastore, CliError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    let store = MemoryDatastore::new();
    if let Some(keyspaces) = json.as_object() {
        for (name, documents) in keyspaces {
            let (namespace, keyspace) = name
                .split_once(':')
                .unwrap_or((DEFAULT_NAMESPACE, name.as_str()));
            store.load(namespace, keyspace, documents)?;
        }
    }
    Ok(store)
}

//! Process-wide table from `"#operator"` names to decode functions.
//!
//! The built-in operators are present from first use. Further operators are
//! registered once at startup; a name can only be registered once.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::debug;
use once_cell::sync::Lazy;

use super::{
    AnsiJoin, Fetch, Filter, InitialProject, KeyScan, Let, Limit, OPERATOR_KEY, Offset, Operator,
    Order, PlanContext, PlanError, PrimaryScan, Sequence,
};

/// Decodes one operator envelope. Either the whole operator is built or an
/// error is returned.
pub type OperatorFactory =
    fn(&serde_json::Value, &PlanContext<'_>) -> Result<Box<dyn Operator>, PlanError>;

static REGISTRY: Lazy<RwLock<HashMap<String, OperatorFactory>>> = Lazy::new(|| {
    let builtins: [(&str, OperatorFactory); 11] = [
        ("AnsiJoin", boxed::<AnsiJoin>),
        ("Fetch", boxed::<Fetch>),
        ("Filter", boxed::<Filter>),
        ("InitialProject", boxed::<InitialProject>),
        ("KeyScan", boxed::<KeyScan>),
        ("Let", boxed::<Let>),
        ("Limit", boxed::<Limit>),
        ("Offset", boxed::<Offset>),
        ("Order", boxed::<Order>),
        ("PrimaryScan", boxed::<PrimaryScan>),
        ("Sequence", boxed::<Sequence>),
    ];
    let factories = builtins
        .into_iter()
        .map(|(name, factory)| (name.to_string(), factory))
        .collect();
    RwLock::new(factories)
});

fn boxed<T: Operator + 'static>(
    raw: &serde_json::Value,
    context: &PlanContext<'_>,
) -> Result<Box<dyn Operator>, PlanError> {
    Ok(Box::new(T::decode(raw, context)?))
}

/// Adds an operator variant under `name`.
pub fn register_operator(name: &str, factory: OperatorFactory) -> Result<(), PlanError> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if registry.contains_key(name) {
        return Err(PlanError::DuplicateOperator(name.to_string()));
    }
    registry.insert(name.to_string(), factory);
    debug!("registered operator {name}");
    Ok(())
}

/// Names of all registered operators, sorted.
pub fn operator_names() -> Vec<String> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    names
}

/// Decodes `raw` as the operator registered under `name`.
pub fn make_operator(
    name: &str,
    raw: &serde_json::Value,
    context: &PlanContext<'_>,
) -> Result<Box<dyn Operator>, PlanError> {
    // Copy the factory out so nested decodes can take the lock again.
    let factory = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .copied()
        .ok_or_else(|| PlanError::UnknownOperator(name.to_string()))?;
    debug!("decoding {name}");
    factory(raw, context)
}

/// Decodes an envelope, dispatching on its `"#operator"` field.
pub fn decode_operator(
    raw: &serde_json::Value,
    context: &PlanContext<'_>,
) -> Result<Box<dyn Operator>, PlanError> {
    let name = raw
        .get(OPERATOR_KEY)
        .and_then(serde_json::Value::as_str)
        .ok_or(PlanError::MissingField(OPERATOR_KEY))?;
    make_operator(name, raw, context)
}

/// Decodes a plan from JSON text.
pub fn plan_from_str(
    text: &str,
    context: &PlanContext<'_>,
) -> Result<Box<dyn Operator>, PlanError> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    decode_operator(&raw, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDatastore;
    use crate::parser::DefaultParser;
    use serde_json::json;

    fn decode_nothing(
        _raw: &serde_json::Value,
        _context: &PlanContext<'_>,
    ) -> Result<Box<dyn Operator>, PlanError> {
        Ok(Box::new(Sequence::new(vec![])))
    }

    #[test]
    fn test_builtins_are_registered() {
        let names = operator_names();
        for name in ["AnsiJoin", "Fetch", "PrimaryScan", "Sequence"] {
            assert!(names.iter().any(|n| n == name), "{name} missing");
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        assert!(matches!(
            register_operator("Fetch", decode_nothing),
            Err(PlanError::DuplicateOperator(name)) if name == "Fetch"
        ));

        register_operator("RegistryTestNoop", decode_nothing).unwrap();
        assert!(matches!(
            register_operator("RegistryTestNoop", decode_nothing),
            Err(PlanError::DuplicateOperator(_))
        ));
    }

    #[test]
    fn test_unknown_operator() {
        let store = MemoryDatastore::new();
        let context = PlanContext::new(&DefaultParser, &store);
        assert!(matches!(
            make_operator("Bogus", &json!({}), &context),
            Err(PlanError::UnknownOperator(name)) if name == "Bogus"
        ));
        assert!(matches!(
            decode_operator(&json!({"condition": "true"}), &context),
            Err(PlanError::MissingField("#operator"))
        ));
    }

    #[test]
    fn test_plan_from_str() {
        let store = MemoryDatastore::new();
        let context = PlanContext::new(&DefaultParser, &store);
        let plan = plan_from_str(r##"{"#operator": "Filter", "condition": "x > 1"}"##, &context)
            .unwrap();
        assert_eq!(plan.name(), "Filter");
        assert!(matches!(
            plan_from_str("{not json", &context),
            Err(PlanError::Unmarshal(_))
        ));
    }
}

//! # Execution plans
//!
//! A plan is a tree of immutable [`Operator`]s. Plans travel as JSON: every
//! operator becomes an object whose `"#operator"` key names its variant,
//! embedded expressions are stored as their canonical text, and child
//! operators nest under keys starting with `~`.
//!
//! ```text
//! {
//!   "#operator": "AnsiJoin",
//!   "alias": "b",
//!   "on_clause": "((`a`.`id`) = (`b`.`aid`))",
//!   "outer": true,
//!   "~child": { "#operator": "Fetch", "keyspace": "inventory", ... }
//! }
//! ```
//!
//! Decoding goes through the process-wide [registry](registry): the
//! `"#operator"` name selects a decode function, which re-parses expression
//! text with the [`ExpressionParser`] and resolves keyspaces through the
//! [`Datastore`] supplied in a [`PlanContext`]. A decode either yields a
//! complete operator or an error naming the offending field.

mod clauses;
mod fetch;
mod join;
mod printer;
pub mod registry;
mod scan;
mod sequence;

pub use clauses::{Filter, InitialProject, Let, Limit, Offset, Order};
pub use fetch::Fetch;
pub use join::AnsiJoin;
pub use printer::{PlanPrinter, explain};
pub use registry::{
    OperatorFactory, decode_operator, make_operator, plan_from_str, register_operator,
};
pub use scan::{KeyScan, PrimaryScan};
pub use sequence::Sequence;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::ast::Expr;
use crate::datastore::{Datastore, DatastoreError, Keyspace};
use crate::evaluator::EvalError;
use crate::parser::{ExpressionParser, ParseError};
use crate::semantics::SemanticError;
use crate::value::ValueError;

/// Key holding an operator's variant name.
pub const OPERATOR_KEY: &str = "#operator";

#[derive(Debug, Error)]
pub enum PlanError {
    /// Expression text that does not parse
    #[error("cannot parse {field} {text:?}: {source}")]
    Parse {
        field: &'static str,
        text: String,
        source: ParseError,
    },

    /// Expression text that parses but is the wrong kind of expression
    #[error("{field}: cannot resolve {expected} expression from {text:?}")]
    Shape {
        field: &'static str,
        expected: &'static str,
        text: String,
    },

    #[error("malformed plan: {0}")]
    Unmarshal(#[from] serde_json::Error),

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("unknown operator {0:?}")]
    UnknownOperator(String),

    #[error("operator {0:?} is already registered")]
    DuplicateOperator(String),

    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("{clause} must be a non-negative integer, got {value}")]
    InvalidValue { clause: &'static str, value: String },

    #[error("{0} is not supported")]
    Unsupported(String),
}

/// A node of an execution plan.
///
/// Operators are built once and only read afterwards; they can be shared
/// between threads and executed concurrently.
pub trait Operator: fmt::Debug + Send + Sync {
    /// Registered variant name, written as `"#operator"`.
    fn name(&self) -> &'static str;

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError>;

    /// The JSON envelope of this operator and its children.
    fn marshal(&self) -> serde_json::Value;

    /// Builds the operator from its JSON envelope.
    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError>
    where
        Self: Sized;

    fn as_any(&self) -> &dyn Any;
}

/// One method per operator variant.
pub trait OperatorVisitor {
    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> Result<(), PlanError>;
    fn visit_key_scan(&mut self, op: &KeyScan) -> Result<(), PlanError>;
    fn visit_fetch(&mut self, op: &Fetch) -> Result<(), PlanError>;
    fn visit_ansi_join(&mut self, op: &AnsiJoin) -> Result<(), PlanError>;
    fn visit_filter(&mut self, op: &Filter) -> Result<(), PlanError>;
    fn visit_let(&mut self, op: &Let) -> Result<(), PlanError>;
    fn visit_initial_project(&mut self, op: &InitialProject) -> Result<(), PlanError>;
    fn visit_order(&mut self, op: &Order) -> Result<(), PlanError>;
    fn visit_offset(&mut self, op: &Offset) -> Result<(), PlanError>;
    fn visit_limit(&mut self, op: &Limit) -> Result<(), PlanError>;
    fn visit_sequence(&mut self, op: &Sequence) -> Result<(), PlanError>;
}

/// What decoding needs from the outside world.
#[derive(Clone, Copy)]
pub struct PlanContext<'a> {
    parser: &'a dyn ExpressionParser,
    datastore: &'a dyn Datastore,
}

impl<'a> PlanContext<'a> {
    pub fn new(parser: &'a dyn ExpressionParser, datastore: &'a dyn Datastore) -> Self {
        PlanContext { parser, datastore }
    }

    pub fn datastore(&self) -> &'a dyn Datastore {
        self.datastore
    }

    /// Parses the expression text stored under `field`.
    pub fn parse(&self, field: &'static str, text: &str) -> Result<Expr, PlanError> {
        self.parser
            .parse_expression(text)
            .map_err(|source| PlanError::Parse {
                field,
                text: text.to_string(),
                source,
            })
    }

    /// Parses `field` and requires the result to be a path.
    pub fn parse_path(&self, field: &'static str, text: &str) -> Result<Expr, PlanError> {
        let expr = self.parse(field, text)?;
        if expr.is_path() {
            Ok(expr)
        } else {
            Err(PlanError::Shape {
                field,
                expected: "path",
                text: text.to_string(),
            })
        }
    }

    pub fn keyspace(&self, namespace: &str, keyspace: &str) -> Result<Arc<dyn Keyspace>, PlanError> {
        Ok(self.datastore.keyspace(namespace, keyspace)?)
    }
}

impl fmt::Debug for PlanContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanContext").finish_non_exhaustive()
    }
}

/// Starts an envelope for operator `name`.
fn envelope(name: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert(OPERATOR_KEY.to_string(), name.into());
    map
}

/// Canonical text of an expression, as stored in plans.
fn text(expr: &Expr) -> serde_json::Value {
    serde_json::Value::String(expr.to_string())
}

/// Decodes the variant-specific fields of an envelope.
fn fields<T: DeserializeOwned>(raw: &serde_json::Value) -> Result<T, PlanError> {
    Ok(T::deserialize(raw)?)
}

/// Decodes a nested operator stored under `field`.
fn child(
    field: &'static str,
    raw: Option<&serde_json::Value>,
    context: &PlanContext<'_>,
) -> Result<Box<dyn Operator>, PlanError> {
    let raw = raw.ok_or(PlanError::MissingField(field))?;
    decode_operator(raw, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{KeyspaceTerm, Projection, ResultTerm, SortTerm};
    use crate::datastore::MemoryDatastore;
    use crate::parser::{DefaultParser, parse_expression};
    use serde_json::json;

    fn store() -> MemoryDatastore {
        let store = MemoryDatastore::new();
        store.create_keyspace("travel-sample", "inventory");
        store.create_keyspace("default", "users");
        store
    }

    fn roundtrip(op: &dyn Operator, store: &MemoryDatastore) -> Box<dyn Operator> {
        let context = PlanContext::new(&DefaultParser, store);
        let encoded = op.marshal();
        let decoded = decode_operator(&encoded, &context).unwrap();
        assert_eq!(decoded.name(), op.name());
        assert_eq!(decoded.marshal(), encoded);
        decoded
    }

    #[test]
    fn test_fetch_envelope() {
        let store = store();
        let keyspace = store.keyspace("travel-sample", "inventory").unwrap();
        let term = KeyspaceTerm::new("travel-sample", "inventory")
            .with_projection(Expr::SelfRef)
            .with_alias("b");
        let fetch = Fetch::new(keyspace, term.clone());

        let encoded = fetch.marshal();
        assert_eq!(encoded["#operator"], "Fetch");
        assert_eq!(encoded["namespace"], "travel-sample");
        assert_eq!(encoded["keyspace"], "inventory");
        assert_eq!(encoded["as"], "b");
        assert_eq!(encoded["projection"], "self");

        let decoded = roundtrip(&fetch, &store);
        let decoded = decoded.as_any().downcast_ref::<Fetch>().unwrap();
        assert_eq!(decoded.term(), &term);
        assert_eq!(decoded.keyspace().name(), "inventory");
    }

    #[test]
    fn test_fetch_omits_empty_fields() {
        let store = store();
        let keyspace = store.keyspace("default", "users").unwrap();
        let encoded = Fetch::new(keyspace, KeyspaceTerm::new("default", "users")).marshal();
        assert!(encoded.get("as").is_none());
        assert!(encoded.get("projection").is_none());
        let context = PlanContext::new(&DefaultParser, &store);
        roundtrip(&Fetch::decode(&encoded, &context).unwrap(), &store);
    }

    #[test]
    fn test_fetch_projection_must_be_a_path() {
        let store = store();
        let context = PlanContext::new(&DefaultParser, &store);
        let raw = json!({
            "#operator": "Fetch",
            "namespace": "default",
            "keyspace": "users",
            "projection": "1 + 2",
        });
        let err = Fetch::decode(&raw, &context).unwrap_err();
        assert!(matches!(err, PlanError::Shape { field: "projection", .. }));
        assert!(err.to_string().contains("cannot resolve path expression"));
    }

    #[test]
    fn test_fetch_unknown_keyspace() {
        let store = store();
        let context = PlanContext::new(&DefaultParser, &store);
        let raw = json!({"#operator": "Fetch", "namespace": "default", "keyspace": "nope"});
        assert!(matches!(
            decode_operator(&raw, &context),
            Err(PlanError::Datastore(DatastoreError::KeyspaceNotFound { .. }))
        ));
    }

    #[test]
    fn test_ansi_join_envelope() {
        let store = store();
        let context = PlanContext::new(&DefaultParser, &store);
        let raw = json!({
            "#operator": "AnsiJoin",
            "alias": "b",
            "on_clause": "a.id = b.aid",
            "outer": true,
            "~child": {
                "#operator": "Fetch",
                "namespace": "travel-sample",
                "keyspace": "inventory",
                "as": "b",
            },
        });
        let op = decode_operator(&raw, &context).unwrap();
        let join = op.as_any().downcast_ref::<AnsiJoin>().unwrap();
        assert!(join.outer());
        assert_eq!(join.alias(), "b");
        assert_eq!(join.on_clause(), &parse_expression("a.id = b.aid").unwrap());

        let child = join.child().as_any().downcast_ref::<Fetch>().unwrap();
        assert_eq!(child.term().effective_alias(), "b");
        assert_eq!(child.keyspace().namespace_id(), "travel-sample");

        let encoded = op.marshal();
        assert_eq!(encoded["on_clause"], "((`a`.`id`) = (`b`.`aid`))");
        assert_eq!(encoded["~child"]["#operator"], "Fetch");
        roundtrip(op.as_ref(), &store);
    }

    #[test]
    fn test_inner_join_omits_outer() {
        let store = store();
        let keyspace = store.keyspace("default", "users").unwrap();
        let child = Fetch::new(keyspace, KeyspaceTerm::new("default", "users"));
        let join = AnsiJoin::new(false, "users", parse_expression("true").unwrap(), Box::new(child));
        assert!(join.marshal().get("outer").is_none());
    }

    #[test]
    fn test_failed_child_fails_the_parent() {
        let store = store();
        let context = PlanContext::new(&DefaultParser, &store);
        let raw = json!({
            "#operator": "AnsiJoin",
            "alias": "b",
            "on_clause": "a.id = b.aid",
            "~child": {"#operator": "Filter", "condition": "a ="},
        });
        assert!(matches!(
            decode_operator(&raw, &context),
            Err(PlanError::Parse { field: "condition", .. })
        ));

        let raw = json!({"#operator": "AnsiJoin", "alias": "b", "on_clause": "true"});
        assert!(matches!(
            decode_operator(&raw, &context),
            Err(PlanError::MissingField("~child"))
        ));
    }

    #[test]
    fn test_sequence_roundtrip() {
        let store = store();
        let keyspace = store.keyspace("default", "users").unwrap();
        let projection = Projection {
            distinct: true,
            raw: false,
            terms: vec![
                ResultTerm::new(parse_expression("u.name").unwrap(), Some("n".to_string())),
                ResultTerm::star(),
            ],
        };
        let plan = Sequence::new(vec![
            Box::new(PrimaryScan::new(keyspace.clone())) as Box<dyn Operator>,
            Box::new(Fetch::new(
                keyspace,
                KeyspaceTerm::new("default", "users").with_alias("u"),
            )),
            Box::new(Let::new(vec![crate::ast::Binding::new(
                "x",
                parse_expression("u.age + 1").unwrap(),
            )])),
            Box::new(Filter::new(parse_expression("x > 21").unwrap())),
            Box::new(InitialProject::new(projection)),
            Box::new(Order::new(vec![SortTerm {
                expr: parse_expression("n").unwrap(),
                descending: true,
            }])),
            Box::new(Offset::new(Expr::constant(1))),
            Box::new(Limit::new(Expr::constant(10))),
        ]);

        let decoded = roundtrip(&plan, &store);
        let decoded = decoded.as_any().downcast_ref::<Sequence>().unwrap();
        assert_eq!(decoded.children().len(), 8);
        let project = decoded.children()[4]
            .as_any()
            .downcast_ref::<InitialProject>()
            .unwrap();
        assert!(project.projection().distinct);
        assert_eq!(project.projection().terms.len(), 2);
    }
}

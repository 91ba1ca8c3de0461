//! docql - a query core for JSON documents.
//!
//! Statements in a N1QL-like language are lexed and parsed into an
//! expression tree, checked, planned into operators and run over the
//! keyspaces of a [`Datastore`](datastore::Datastore). Values follow JSON
//! with MISSING alongside NULL, and logic is three-valued.
//!
//! ```
//! use docql::parser::parse_expression;
//! use docql::Value;
//!
//! let doc: Value = serde_json::json!({"name": "ann", "age": 31}).into();
//! let expr = parse_expression("age >= 18 AND nickname IS NOT VALUED").unwrap();
//! assert_eq!(expr.evaluate(&doc).unwrap(), Value::Boolean(true));
//! ```
pub mod ast;
pub mod cli;
pub mod datastore;
pub mod evaluator;
pub mod exec;
pub mod functions;
pub mod lexer;
pub mod logic;
pub mod parser;
pub mod plan;
pub mod planner;
pub mod semantics;
pub mod stringer;
pub mod value;
pub mod visitor;

pub use ast::{Expr, Select, Token};
pub use datastore::{Datastore, DatastoreError, Keyspace, MemoryDatastore};
pub use evaluator::{EvalContext, EvalError, Evaluator, Parameters};
pub use exec::Engine;
pub use lexer::{LexError, Lexer, Position};
pub use parser::{DefaultParser, ExpressionParser, ParseError, Parser};
pub use plan::{Operator, PlanError};
pub use semantics::{SemChecker, SemanticError};
pub use value::{Value, ValueType, to_json, to_json_pretty};
pub use visitor::Visitor;

//! CLI support for docql
//!
//! The commands behind the `docql` binary, usable without it: evaluating an
//! expression against a document, checking a statement, planning and running
//! queries over documents loaded from JSON.

mod check;
mod convert;
mod query;

pub use check::{CheckOptions, EvalOptions, execute_check, execute_eval};
pub use convert::{load_datastore, parse_json, parse_param};
pub use query::{
    ExecOptions, ExecResult, PlanOptions, QueryOptions, execute_exec, execute_plan, execute_query,
};

use std::io;

use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::plan::PlanError;
use crate::semantics::SemanticError;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,

    #[error("Invalid parameter '{0}': expected name=<json>")]
    InvalidParam(String),
}

//! Plan and run queries over documents loaded from JSON

use super::check::parameters;
use super::{CliError, load_datastore};
use crate::datastore::MemoryDatastore;
use crate::exec::Engine;
use crate::parser::{DefaultParser, parse_select};
use crate::plan::{PlanContext, explain, plan_from_str};
use crate::semantics::SemChecker;
use crate::value::Value;

/// Options for the query command
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// The SELECT statement to run
    pub query: String,
    /// Keyspaces as JSON (see [`load_datastore`])
    pub data: String,
    /// Named parameters as `name=<json>`
    pub params: Vec<String>,
    /// Positional parameters as JSON, `$1` first
    pub args: Vec<String>,
}

/// Options for the plan command
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// The SELECT statement to plan
    pub query: String,
    /// Keyspaces as JSON; the plan refers to them by name. Without them
    /// only statements with no FROM clause can be planned.
    pub data: Option<String>,
    /// Print an indented outline instead of the JSON plan
    pub explain: bool,
}

/// Options for the exec command
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// A JSON plan as produced by the plan command
    pub plan: String,
    /// Keyspaces as JSON, empty when absent
    pub data: Option<String>,
    /// Named parameters as `name=<json>`
    pub params: Vec<String>,
    /// Positional parameters as JSON, `$1` first
    pub args: Vec<String>,
    /// Decode and print the outline without running
    pub explain: bool,
}

/// Result of the exec command
#[derive(Debug)]
pub enum ExecResult {
    Explained(String),
    Rows(Vec<Value>),
}

/// Run a query and return its result rows.
pub fn execute_query(options: &QueryOptions) -> Result<Vec<Value>, CliError> {
    let store = load_datastore(&options.data)?;
    let engine =
        Engine::new(&store).with_parameters(parameters(&options.params, &options.args)?);
    Ok(engine.query(&options.query)?)
}

/// Plan a query; returns pretty JSON, or the outline with `explain`.
pub fn execute_plan(options: &PlanOptions) -> Result<String, CliError> {
    let store = datastore(options.data.as_deref())?;
    let select = parse_select(&options.query)?;
    SemChecker::new().check(&select)?;

    let plan = Engine::new(&store).planner().plan(&select)?;
    if options.explain {
        Ok(explain(plan.as_ref())?)
    } else {
        Ok(serde_json::to_string_pretty(&plan.marshal())?)
    }
}

/// Decode a JSON plan and run it (or only explain it).
pub fn execute_exec(options: &ExecOptions) -> Result<ExecResult, CliError> {
    let store = datastore(options.data.as_deref())?;
    let context = PlanContext::new(&DefaultParser, &store);
    let plan = plan_from_str(&options.plan, &context)?;
    if options.explain {
        return Ok(ExecResult::Explained(explain(plan.as_ref())?));
    }

    let engine =
        Engine::new(&store).with_parameters(parameters(&options.params, &options.args)?);
    Ok(ExecResult::Rows(engine.execute_plan(plan.as_ref())?))
}

fn datastore(data: Option<&str>) -> Result<MemoryDatastore, CliError> {
    match data {
        Some(text) => load_datastore(text),
        None => Ok(MemoryDatastore::new()),
    }
}

//! Evaluate expressions and check statements

use super::{CliError, parse_json, parse_param};
use crate::evaluator::{EvalContext, Parameters};
use crate::parser::{parse_expression, parse_select};
use crate::semantics::SemChecker;
use crate::value::Value;

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The expression to evaluate
    pub expr: String,
    /// JSON document the expression is evaluated against
    pub input: Option<String>,
    /// Named parameters as `name=<json>`
    pub params: Vec<String>,
    /// Positional parameters as JSON, `$1` first
    pub args: Vec<String>,
}

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The statement to check
    pub query: String,
}

/// Builds query parameters from `name=<json>` and positional JSON arguments.
pub(super) fn parameters(params: &[String], args: &[String]) -> Result<Parameters, CliError> {
    let mut parameters = Parameters::new();
    for param in params {
        let (name, value) = parse_param(param)?;
        parameters = parameters.with_named(name, value);
    }
    for arg in args {
        parameters = parameters.with_positional(parse_json(arg)?);
    }
    Ok(parameters)
}

/// Evaluate an expression against a JSON document (an empty object when none
/// is given).
pub fn execute_eval(options: &EvalOptions) -> Result<Value, CliError> {
    let expr = parse_expression(&options.expr)?;
    let item = match &options.input {
        Some(text) => parse_json(text)?,
        None => Value::Object(Default::default()),
    };
    let parameters = parameters(&options.params, &options.args)?;
    let context = EvalContext::new(&item, &parameters);
    Ok(expr.evaluate_in(&context)?)
}

/// Parse a statement, validate it and return its canonical text.
pub fn execute_check(options: &CheckOptions) -> Result<String, CliError> {
    let select = parse_select(&options.query)?;
    SemChecker::new().check(&select)?;
    Ok(select.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_with_input_and_params() {
        let options = EvalOptions {
            expr: "price * $qty + $1".to_string(),
            input: Some(r#"{"price": 2.5}"#.to_string()),
            params: vec!["qty=4".to_string()],
            args: vec!["1".to_string()],
        };
        assert_eq!(execute_eval(&options).unwrap(), Value::from(11));
    }

    #[test]
    fn test_eval_without_input() {
        let options = EvalOptions {
            expr: "name IS MISSING".to_string(),
            ..Default::default()
        };
        assert_eq!(execute_eval(&options).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_check_reports_semantic_errors() {
        let ok = CheckOptions {
            query: "SELECT a FROM ks WHERE a > 1".to_string(),
        };
        assert_eq!(
            execute_check(&ok).unwrap(),
            "select `a` from `default`:`ks` where (1 < `a`)"
        );

        let bad = CheckOptions {
            query: "SELECT a FROM ks WHERE MAX(a) > 1".to_string(),
        };
        assert!(matches!(execute_check(&bad), Err(CliError::Semantic(_))));
    }
}

//! Plan execution.
//!
//! [`Executor`] runs a plan synchronously. Items flow through the operators
//! as rows: the item object (one field per keyspace alias), the key a scan
//! produced for it, the LET variables bound so far and, once projected, its
//! result. [`Engine`] ties parsing, checking, planning and execution together
//! and also runs the subqueries found inside expressions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::ast::{Expr, Projection, Select};
use crate::datastore::Datastore;
use crate::evaluator::{EvalContext, EvalError, Parameters, SubqueryExecutor};
use crate::parser::parse_select;
use crate::plan::{
    AnsiJoin, Fetch, Filter, InitialProject, KeyScan, Let, Limit, Offset, Operator,
    OperatorVisitor, Order, PlanError, PrimaryScan, Sequence,
};
use crate::planner::Planner;
use crate::semantics::SemChecker;
use crate::value::Value;

#[derive(Debug, Clone)]
struct Row {
    item: Value,
    key: Option<String>,
    bindings: Vec<(String, Value)>,
    output: Option<Value>,
}

impl Row {
    fn new(item: Value) -> Self {
        Row {
            item,
            key: None,
            bindings: Vec::new(),
            output: None,
        }
    }

    fn with_key(&self, key: String) -> Self {
        Row {
            key: Some(key),
            ..self.clone()
        }
    }

    /// The value this row contributes to the query result.
    fn result(self) -> Value {
        self.output.unwrap_or(self.item)
    }
}

fn empty_object() -> Value {
    Value::Object(BTreeMap::new())
}

/// Runs plans over rows, evaluating expressions inside an outer context.
pub struct Executor<'c, 'a> {
    context: &'c EvalContext<'a>,
    rows: Vec<Row>,
}

impl<'c, 'a> Executor<'c, 'a> {
    /// Starts with a single empty item.
    pub fn new(context: &'c EvalContext<'a>) -> Self {
        Executor {
            context,
            rows: vec![Row::new(empty_object())],
        }
    }

    /// Starts with `items` instead of a single empty item.
    pub fn with_items(context: &'c EvalContext<'a>, items: Vec<Value>) -> Self {
        Executor {
            context,
            rows: items.into_iter().map(Row::new).collect(),
        }
    }

    /// Runs `plan` and returns its results.
    pub fn run(mut self, plan: &dyn Operator) -> Result<Vec<Value>, PlanError> {
        plan.accept(&mut self)?;
        Ok(self.rows.into_iter().map(Row::result).collect())
    }

    fn eval(&self, expr: &Expr, row: &Row) -> Result<Value, EvalError> {
        let over = self.context.over(&row.item);
        if row.bindings.is_empty() {
            expr.evaluate_in(&over)
        } else {
            expr.evaluate_in(&over.scope(row.bindings.clone()))
        }
    }

    /// Like `eval`, with the projection aliases visible beneath the row's
    /// own names.
    fn eval_ordering(&self, expr: &Expr, row: &Row) -> Result<Value, EvalError> {
        let Some(output) = &row.output else {
            return self.eval(expr, row);
        };
        let projected = self.context.over(output);
        let over = projected.over(&row.item);
        if row.bindings.is_empty() {
            expr.evaluate_in(&over)
        } else {
            expr.evaluate_in(&over.scope(row.bindings.clone()))
        }
    }

    fn retain(&mut self, condition: &Expr) -> Result<(), PlanError> {
        let rows = std::mem::take(&mut self.rows);
        for row in rows {
            if self.eval(condition, &row)?.truth() {
                self.rows.push(row);
            }
        }
        Ok(())
    }

    /// Evaluates an OFFSET or LIMIT count.
    fn count(&self, clause: &'static str, expr: &Expr) -> Result<usize, PlanError> {
        let value = expr.evaluate_in(self.context)?;
        value
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PlanError::InvalidValue {
                clause,
                value: value.to_string(),
            })
    }

    fn project(&self, projection: &Projection, row: &Row) -> Result<Option<Value>, PlanError> {
        if projection.raw {
            let value = match projection.terms.first().and_then(|t| t.expr.as_ref()) {
                Some(expr) => self.eval(expr, row)?,
                None => row.item.clone(),
            };
            return Ok((!value.is_missing()).then_some(value));
        }

        let mut fields = BTreeMap::new();
        for (i, term) in projection.terms.iter().enumerate() {
            if term.star {
                let source = match &term.expr {
                    Some(expr) => self.eval(expr, row)?,
                    None => row.item.clone(),
                };
                if let Some(source) = source.fields() {
                    fields.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                continue;
            }

            let Some(expr) = &term.expr else { continue };
            let value = self.eval(expr, row)?;
            if value.is_missing() {
                continue;
            }
            let name = match (&term.alias, expr.alias()) {
                (Some(alias), _) => alias.clone(),
                (None, Some(alias)) => alias.to_string(),
                (None, None) => format!("${}", i + 1),
            };
            fields.insert(name, value);
        }
        Ok(Some(Value::Object(fields)))
    }
}

impl OperatorVisitor for Executor<'_, '_> {
    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> Result<(), PlanError> {
        let keys = op.keyspace().keys()?;
        let rows = std::mem::take(&mut self.rows);
        for row in &rows {
            self.rows
                .extend(keys.iter().map(|key| row.with_key(key.clone())));
        }
        Ok(())
    }

    fn visit_key_scan(&mut self, op: &KeyScan) -> Result<(), PlanError> {
        let rows = std::mem::take(&mut self.rows);
        for row in &rows {
            let keys = self.eval(op.keys(), row)?;
            match keys.resolved() {
                Value::String(key) => self.rows.push(row.with_key(key.clone())),
                Value::Array(keys) => {
                    for key in keys.iter().filter_map(Value::as_str) {
                        self.rows.push(row.with_key(key.to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn visit_fetch(&mut self, op: &Fetch) -> Result<(), PlanError> {
        let keys: Vec<String> = self.rows.iter().filter_map(|r| r.key.clone()).collect();
        let documents: HashMap<String, Value> = op
            .keyspace()
            .fetch(&keys)?
            .into_iter()
            .filter_map(|doc| {
                let key = doc.annotation("id")?.as_str()?.to_string();
                Some((key, doc))
            })
            .collect();
        debug!("fetched {} of {} keys", documents.len(), keys.len());

        let term = op.term();
        let alias = term.effective_alias();
        let rows = std::mem::take(&mut self.rows);
        for mut row in rows {
            let Some(doc) = row.key.take().and_then(|key| documents.get(&key)) else {
                continue;
            };
            let value = match &term.projection {
                Some(path) => path.evaluate_in(&self.context.over(doc))?,
                None => doc.clone(),
            };
            row.item.set_field(alias, value)?;
            self.rows.push(row);
        }
        Ok(())
    }

    fn visit_ansi_join(&mut self, op: &AnsiJoin) -> Result<(), PlanError> {
        let rows = std::mem::take(&mut self.rows);
        for row in rows {
            let mut inner = Executor {
                context: self.context,
                rows: vec![Row {
                    key: None,
                    output: None,
                    ..row.clone()
                }],
            };
            op.child().accept(&mut inner)?;

            let mut matched = false;
            for candidate in inner.rows {
                if self.eval(op.on_clause(), &candidate)?.truth() {
                    matched = true;
                    self.rows.push(candidate);
                }
            }
            if !matched && op.outer() {
                self.rows.push(row);
            }
        }
        Ok(())
    }

    fn visit_filter(&mut self, op: &Filter) -> Result<(), PlanError> {
        self.retain(op.condition())
    }

    fn visit_let(&mut self, op: &Let) -> Result<(), PlanError> {
        let mut rows = std::mem::take(&mut self.rows);
        for row in &mut rows {
            for binding in op.bindings() {
                let value = self.eval(&binding.expr, row)?;
                row.bindings.push((binding.variable.clone(), value));
            }
        }
        self.rows = rows;
        Ok(())
    }

    fn visit_initial_project(&mut self, op: &InitialProject) -> Result<(), PlanError> {
        let projection = op.projection();
        let rows = std::mem::take(&mut self.rows);
        let mut seen: Vec<Value> = Vec::new();
        for mut row in rows {
            let Some(output) = self.project(projection, &row)? else {
                continue;
            };
            if projection.distinct {
                if seen.iter().any(|v| v.equals(&output)) {
                    continue;
                }
                seen.push(output.clone());
            }
            row.output = Some(output);
            self.rows.push(row);
        }
        Ok(())
    }

    fn visit_order(&mut self, op: &Order) -> Result<(), PlanError> {
        let rows = std::mem::take(&mut self.rows);
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let keys = op
                .terms()
                .iter()
                .map(|term| self.eval_ordering(&term.expr, &row))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), term) in a.iter().zip(b).zip(op.terms()) {
                let ordering = x.collate(y);
                let ordering = if term.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    fn visit_offset(&mut self, op: &Offset) -> Result<(), PlanError> {
        let n = self.count("OFFSET", op.expr())?.min(self.rows.len());
        self.rows.drain(..n);
        Ok(())
    }

    fn visit_limit(&mut self, op: &Limit) -> Result<(), PlanError> {
        let n = self.count("LIMIT", op.expr())?;
        self.rows.truncate(n);
        Ok(())
    }

    fn visit_sequence(&mut self, op: &Sequence) -> Result<(), PlanError> {
        for child in op.children() {
            child.accept(self)?;
        }
        Ok(())
    }
}

/// Parses, checks, plans and runs queries against a datastore.
///
/// # Examples
///
/// ```
/// use docql::datastore::MemoryDatastore;
/// use docql::exec::Engine;
/// use docql::Value;
///
/// let store = MemoryDatastore::new();
/// let users = store.create_keyspace("default", "users");
/// users.insert("u1", r#"{"name": "ann", "age": 31}"#);
/// users.insert("u2", r#"{"name": "bob", "age": 17}"#);
///
/// let engine = Engine::new(&store);
/// let rows = engine.query("SELECT RAW u.name FROM users u WHERE u.age >= 18").unwrap();
/// assert_eq!(rows, vec![Value::from("ann")]);
/// ```
pub struct Engine<'d> {
    datastore: &'d dyn Datastore,
    parameters: Parameters,
}

impl<'d> Engine<'d> {
    pub fn new(datastore: &'d dyn Datastore) -> Self {
        Engine {
            datastore,
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn planner(&self) -> Planner<'d> {
        Planner::new(self.datastore)
    }

    /// Parses and runs a SELECT statement.
    pub fn query(&self, text: &str) -> Result<Vec<Value>, PlanError> {
        let select = parse_select(text)?;
        self.run_select(&select)
    }

    /// Checks, plans and runs a parsed statement.
    pub fn run_select(&self, select: &Select) -> Result<Vec<Value>, PlanError> {
        SemChecker::new().check(select)?;
        let plan = self.planner().plan(select)?;
        self.execute_plan(plan.as_ref())
    }

    /// Runs an already built (or decoded) plan.
    pub fn execute_plan(&self, plan: &dyn Operator) -> Result<Vec<Value>, PlanError> {
        debug!("executing {}", plan.name());
        let item = empty_object();
        let context = EvalContext::new(&item, &self.parameters).with_subqueries(self);
        Executor::new(&context).run(plan)
    }
}

impl SubqueryExecutor for Engine<'_> {
    fn execute(&self, query: &Select, context: &EvalContext<'_>) -> Result<Value, EvalError> {
        let run = || -> Result<Vec<Value>, PlanError> {
            SemChecker::new().check(query)?;
            let plan = self.planner().plan(query)?;
            Executor::new(context).run(plan.as_ref())
        };
        run()
            .map(Value::Array)
            .map_err(|e| EvalError::Subquery(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDatastore;
    use crate::plan::Filter;

    #[test]
    fn test_executor_over_items() {
        let parameters = Parameters::new();
        let item = empty_object();
        let context = EvalContext::new(&item, &parameters);
        let items = vec![
            Value::from(serde_json::json!({"x": 1})),
            Value::from(serde_json::json!({"x": 5})),
        ];
        let filter = Filter::new(crate::parser::parse_expression("x > 2").unwrap());
        let out = Executor::with_items(&context, items).run(&filter).unwrap();
        assert_eq!(out, vec![Value::from(serde_json::json!({"x": 5}))]);
    }

    #[test]
    fn test_negative_limit_is_rejected() {
        let store = MemoryDatastore::new();
        store.create_keyspace("default", "ks").insert("a", "{}");
        let err = Engine::new(&store)
            .query("SELECT * FROM ks LIMIT -1")
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidValue { clause: "LIMIT", .. }));
    }
}

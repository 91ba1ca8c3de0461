use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::{
    ast::{Binding, CollectionMap, CollectionPredicate, Expr, FunctionCall, Select, WhenTerm},
    functions, logic,
    value::{Value, ValueType},
    visitor::Visitor,
};

/// Errors that can occur during expression evaluation.
///
/// Data that does not fit an operator is not an error: it evaluates to
/// MISSING or NULL. These are reserved for malformed expressions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown function {0}()")]
    UnknownFunction(String),

    #[error("{name}() takes {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    /// Reference to a parameter the caller did not supply
    #[error("no value supplied for parameter {0}")]
    UnboundParameter(String),

    #[error("aggregate {0}() cannot be evaluated on a single item")]
    Aggregate(String),

    #[error("subqueries cannot be evaluated without an executor")]
    NoSubqueryExecutor,

    #[error("subquery failed: {0}")]
    Subquery(String),

    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
}

/// Named (`$name`) and positional (`$1`) query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    named: HashMap<String, Value>,
    positional: Vec<Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn with_positional(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Parameter `$position`, counting from 1.
    pub fn positional(&self, position: usize) -> Option<&Value> {
        position
            .checked_sub(1)
            .and_then(|i| self.positional.get(i))
    }
}

/// Runs a nested query on behalf of the evaluator.
pub trait SubqueryExecutor {
    /// Evaluates `query` with `context` as its outer scope and returns the
    /// result rows as an array value.
    fn execute(&self, query: &Select, context: &EvalContext<'_>) -> Result<Value, EvalError>;
}

/// Everything an expression can refer to while being evaluated.
///
/// Names resolve innermost scope outwards. Each scope offers its bound
/// variables first, then the fields of its item if it introduced one.
#[derive(Clone)]
pub struct EvalContext<'a> {
    item: &'a Value,
    /// False for scopes that only add variables over the parent's item.
    owns_item: bool,
    variables: Vec<(String, Value)>,
    parent: Option<&'a EvalContext<'a>>,
    parameters: &'a Parameters,
    subqueries: Option<&'a dyn SubqueryExecutor>,
}

impl<'a> EvalContext<'a> {
    pub fn new(item: &'a Value, parameters: &'a Parameters) -> Self {
        EvalContext {
            item,
            owns_item: true,
            variables: Vec::new(),
            parent: None,
            parameters,
            subqueries: None,
        }
    }

    pub fn with_subqueries(mut self, executor: &'a dyn SubqueryExecutor) -> Self {
        self.subqueries = Some(executor);
        self
    }

    /// A nested scope over the same item, with `variables` bound on top.
    pub fn scope<'b>(&'b self, variables: Vec<(String, Value)>) -> EvalContext<'b> {
        EvalContext {
            item: self.item,
            owns_item: false,
            variables,
            parent: Some(self),
            parameters: self.parameters,
            subqueries: self.subqueries,
        }
    }

    /// A nested scope whose current item is `item`, keeping the outer
    /// variables visible. Correlated subqueries evaluate in such a scope.
    pub fn over<'b>(&'b self, item: &'b Value) -> EvalContext<'b> {
        EvalContext {
            item,
            owns_item: true,
            variables: Vec::new(),
            parent: Some(self),
            parameters: self.parameters,
            subqueries: self.subqueries,
        }
    }

    pub fn item(&self) -> &Value {
        self.item
    }

    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    pub fn subqueries(&self) -> Option<&'a dyn SubqueryExecutor> {
        self.subqueries
    }

    /// Value of a bound variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.parent.and_then(|p| p.variable(name)))
    }

    /// Resolves an identifier against the nearest scope that knows it: its
    /// variables, then its own item's fields.
    pub fn lookup(&self, name: &str) -> Value {
        let mut scope = Some(self);
        while let Some(context) = scope {
            let found = context
                .variables
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .or_else(|| context.owns_item.then(|| context.item.field(name)).flatten());
            if let Some(value) = found {
                return value.clone();
            }
            scope = context.parent;
        }
        Value::Missing
    }
}

impl std::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("item", &self.item)
            .field("variables", &self.variables)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl Expr {
    /// Evaluates against `item` with no parameters and no subquery support.
    ///
    /// # Examples
    ///
    /// ```
    /// use docql::parser::parse_expression;
    /// use docql::Value;
    ///
    /// let doc: Value = serde_json::json!({"price": 120, "tags": ["a"]}).into();
    /// let expr = parse_expression("price > 100 AND ANY t IN tags SATISFIES t = 'a' END").unwrap();
    /// assert_eq!(expr.evaluate(&doc).unwrap(), Value::Boolean(true));
    /// ```
    pub fn evaluate(&self, item: &Value) -> Result<Value, EvalError> {
        let parameters = Parameters::new();
        self.evaluate_in(&EvalContext::new(item, &parameters))
    }

    pub fn evaluate_in(&self, context: &EvalContext<'_>) -> Result<Value, EvalError> {
        self.accept(&mut Evaluator::new(context))
    }
}

/// Expression evaluator; one per context.
pub struct Evaluator<'c, 'a> {
    context: &'c EvalContext<'a>,
}

/// Binding arrays, or the value that replaces the whole collection
/// expression when some binding is not an array.
enum Rows {
    Arrays(Vec<Vec<Value>>),
    Absent(Value),
}

impl<'c, 'a> Evaluator<'c, 'a> {
    pub fn new(context: &'c EvalContext<'a>) -> Self {
        Evaluator { context }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        expr.accept(self)
    }

    fn eval_all(&mut self, operands: &[Expr]) -> Result<Vec<Value>, EvalError> {
        operands.iter().map(|e| self.eval(e)).collect()
    }

    /// Evaluates each binding expression into the array it ranges over.
    fn binding_rows(&mut self, bindings: &[Binding]) -> Result<Rows, EvalError> {
        let mut arrays = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let value = self.eval(&binding.expr)?;
            if value.is_missing() {
                return Ok(Rows::Absent(Value::Missing));
            }
            if binding.descend {
                let mut buffer = Vec::new();
                value.descendants(&mut buffer);
                arrays.push(buffer);
            } else {
                match value.resolved() {
                    Value::Array(items) => arrays.push(items.clone()),
                    _ => return Ok(Rows::Absent(Value::Null)),
                }
            }
        }
        Ok(Rows::Arrays(arrays))
    }

    /// Runs `f` once per row of the bindings, in a scope where each variable
    /// is bound to its element of that row. Stops when `f` returns `Some`.
    /// Bindings range in parallel, up to the shortest array.
    fn each_row<T>(
        &mut self,
        bindings: &[Binding],
        mut f: impl FnMut(&mut Evaluator<'_, '_>) -> Result<Option<T>, EvalError>,
    ) -> Result<Result<Option<T>, Value>, EvalError> {
        let arrays = match self.binding_rows(bindings)? {
            Rows::Arrays(arrays) => arrays,
            Rows::Absent(value) => return Ok(Err(value)),
        };
        let len = arrays.iter().map(Vec::len).min().unwrap_or(0);

        for i in 0..len {
            let variables = bindings
                .iter()
                .zip(&arrays)
                .map(|(b, array)| (b.variable.clone(), array[i].clone()))
                .collect();
            let scope = self.context.scope(variables);
            if let Some(found) = f(&mut Evaluator::new(&scope))? {
                return Ok(Ok(Some(found)));
            }
        }
        Ok(Ok(None))
    }

    fn arithmetic<'e>(
        &mut self,
        operands: impl IntoIterator<Item = &'e Expr>,
        op: Arith,
    ) -> Result<Value, EvalError> {
        let values = operands
            .into_iter()
            .map(|e| self.eval(e))
            .collect::<Result<Vec<_>, _>>()?;
        if values.iter().any(Value::is_missing) {
            return Ok(Value::Missing);
        }
        if values.iter().any(|v| v.value_type() != ValueType::Number) {
            return Ok(Value::Null);
        }
        let mut values = values.iter();
        let Some(first) = values.next() else {
            return Ok(Value::Null);
        };
        let mut acc = first.resolved().clone();
        for value in values {
            acc = apply_arith(op, &acc, value.resolved());
            if acc.is_null() {
                break;
            }
        }
        Ok(acc)
    }

    /// Evaluates both operands and applies `f` when neither is MISSING or NULL.
    fn compare(
        &mut self,
        first: &Expr,
        second: &Expr,
        f: impl FnOnce(&Value, &Value) -> Value,
    ) -> Result<Value, EvalError> {
        let a = self.eval(first)?;
        let b = self.eval(second)?;
        Ok(propagate(&[&a, &b]).unwrap_or_else(|| f(&a, &b)))
    }

    fn membership(
        &mut self,
        item: &Expr,
        collection: &Expr,
        descend: bool,
    ) -> Result<Value, EvalError> {
        let item = self.eval(item)?;
        let collection = self.eval(collection)?;
        if item.is_missing() || collection.is_missing() {
            return Ok(Value::Missing);
        }

        let candidates = if descend {
            match collection.value_type() {
                ValueType::Array | ValueType::Object => {
                    let mut buffer = Vec::new();
                    collection.descendants(&mut buffer);
                    buffer
                }
                _ => return Ok(Value::Null),
            }
        } else {
            match collection.resolved() {
                Value::Array(items) => items.clone(),
                _ => return Ok(Value::Null),
            }
        };
        if item.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Boolean(candidates.iter().any(|c| c.equals(&item))))
    }

    fn type_test(&mut self, operand: &Expr, f: impl FnOnce(ValueType) -> Value) -> Result<Value, EvalError> {
        let value = self.eval(operand)?;
        Ok(f(value.value_type()))
    }

    fn case_result(&mut self, else_term: Option<&Expr>) -> Result<Value, EvalError> {
        match else_term {
            Some(else_term) => self.eval(else_term),
            None => Ok(Value::Null),
        }
    }

    fn collection_map(&mut self, map: &CollectionMap, first_only: bool) -> Result<Value, EvalError> {
        let mut mapped = Vec::new();
        let outcome = self.each_row(&map.bindings, |inner| {
            if let Some(when) = &map.when
                && !inner.eval(when)?.truth()
            {
                return Ok(None);
            }
            let value = inner.eval(&map.mapping)?;
            if first_only {
                return Ok(Some(value));
            }
            if !value.is_missing() {
                mapped.push(value);
            }
            Ok(None)
        })?;

        Ok(match outcome {
            Err(absent) => absent,
            Ok(Some(first)) => first,
            Ok(None) if first_only => Value::Missing,
            Ok(None) => Value::Array(mapped),
        })
    }

    fn collection_predicate(
        &mut self,
        pred: &CollectionPredicate,
        every: bool,
    ) -> Result<Value, EvalError> {
        // ANY stops at the first satisfying row, EVERY at the first failing one
        let outcome = self.each_row(&pred.bindings, |inner| {
            let satisfied = inner.eval(&pred.satisfies)?.truth();
            Ok((satisfied != every).then_some(()))
        })?;

        Ok(match outcome {
            Err(absent) => absent,
            Ok(Some(())) => Value::Boolean(!every),
            Ok(None) => Value::Boolean(every),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
}

/// MISSING if any value is missing, else NULL if any is null.
fn propagate(values: &[&Value]) -> Option<Value> {
    if values.iter().any(|v| v.is_missing()) {
        Some(Value::Missing)
    } else if values.iter().any(|v| v.is_null()) {
        Some(Value::Null)
    } else {
        None
    }
}

/// Arithmetic on two numbers. Integers stay integers until they overflow;
/// mixed operands go through `Decimal` so that whole results stay whole.
/// Division or remainder by zero is NULL.
fn apply_arith(op: Arith, a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => integer_arith(op, *x, *y),
        (Value::Float(x), Value::Float(y)) => float_arith(op, *x, *y),
        (Value::Integer(x), Value::Float(y)) => {
            if let Some(xd) = Decimal::from_i64(*x)
                && let Some(yd) = Decimal::from_f64(*y)
                && let Some(result) = decimal_arith(op, xd, yd)
            {
                return result;
            }
            float_arith(op, *x as f64, *y)
        }
        (Value::Float(x), Value::Integer(y)) => {
            if let Some(xd) = Decimal::from_f64(*x)
                && let Some(yd) = Decimal::from_i64(*y)
                && let Some(result) = decimal_arith(op, xd, yd)
            {
                return result;
            }
            float_arith(op, *x, *y as f64)
        }
        _ => Value::Null,
    }
}

fn integer_arith(op: Arith, x: i64, y: i64) -> Value {
    let exact = match op {
        Arith::Add => x.checked_add(y),
        Arith::Sub => x.checked_sub(y),
        Arith::Mult => x.checked_mul(y),
        Arith::Div => {
            if y == 0 {
                return Value::Null;
            }
            match x.checked_rem(y) {
                Some(0) => x.checked_div(y),
                _ => return Value::Float(x as f64 / y as f64),
            }
        }
        Arith::Mod => {
            if y == 0 {
                return Value::Null;
            }
            Some(x.checked_rem(y).unwrap_or(0))
        }
    };
    exact.map_or_else(|| float_arith(op, x as f64, y as f64), Value::Integer)
}

fn float_arith(op: Arith, x: f64, y: f64) -> Value {
    let result = match op {
        Arith::Add => x + y,
        Arith::Sub => x - y,
        Arith::Mult => x * y,
        Arith::Div | Arith::Mod if y == 0.0 => return Value::Null,
        Arith::Div => x / y,
        Arith::Mod => x % y,
    };
    Value::Float(result)
}

fn decimal_arith(op: Arith, x: Decimal, y: Decimal) -> Option<Value> {
    let result = match op {
        Arith::Add => x.checked_add(y)?,
        Arith::Sub => x.checked_sub(y)?,
        Arith::Mult => x.checked_mul(y)?,
        Arith::Div | Arith::Mod if y.is_zero() => return Some(Value::Null),
        Arith::Div => x.checked_div(y)?,
        Arith::Mod => x.checked_rem(y)?,
    };
    if result.is_integer()
        && let Some(i) = result.to_i64()
    {
        return Some(Value::Integer(i));
    }
    result.to_f64().map(Value::Float)
}

/// Translates a LIKE pattern into an anchored regex: `%` matches any run,
/// `_` any single character, and a backslash escapes the next character.
fn like_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut re = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => re.push_str(r"\\"),
            },
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| EvalError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Integral number usable as an array position.
fn position(value: &Value) -> Option<i64> {
    match value.resolved() {
        Value::Integer(n) => Some(*n),
        Value::Float(_) => value.as_i64(),
        _ => None,
    }
}

impl Visitor for Evaluator<'_, '_> {
    type Output = Value;
    type Error = EvalError;

    // Arithmetic

    fn visit_add(&mut self, operands: &[Expr]) -> Result<Value, EvalError> {
        self.arithmetic(operands, Arith::Add)
    }

    fn visit_sub(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.arithmetic([first, second], Arith::Sub)
    }

    fn visit_mult(&mut self, operands: &[Expr]) -> Result<Value, EvalError> {
        self.arithmetic(operands, Arith::Mult)
    }

    fn visit_div(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.arithmetic([first, second], Arith::Div)
    }

    fn visit_mod(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.arithmetic([first, second], Arith::Mod)
    }

    fn visit_neg(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        let value = self.eval(operand)?;
        Ok(match value.resolved() {
            Value::Missing => Value::Missing,
            Value::Integer(n) => n
                .checked_neg()
                .map_or(Value::Float(-(*n as f64)), Value::Integer),
            Value::Float(n) => Value::Float(-n),
            _ => Value::Null,
        })
    }

    // Case

    fn visit_searched_case(
        &mut self,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<Value, EvalError> {
        for term in whens {
            if self.eval(&term.when)?.truth() {
                return self.eval(&term.then);
            }
        }
        self.case_result(else_term)
    }

    fn visit_simple_case(
        &mut self,
        search: &Expr,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<Value, EvalError> {
        let search = self.eval(search)?;
        if search.value_type() > ValueType::Null {
            for term in whens {
                if self.eval(&term.when)?.equals(&search) {
                    return self.eval(&term.then);
                }
            }
        }
        self.case_result(else_term)
    }

    // Collections

    fn visit_any(&mut self, pred: &CollectionPredicate) -> Result<Value, EvalError> {
        self.collection_predicate(pred, false)
    }

    fn visit_every(&mut self, pred: &CollectionPredicate) -> Result<Value, EvalError> {
        self.collection_predicate(pred, true)
    }

    fn visit_exists(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        let value = self.eval(operand)?;
        Ok(match value.resolved() {
            Value::Missing => Value::Missing,
            Value::Array(items) => Value::Boolean(!items.is_empty()),
            _ => Value::Null,
        })
    }

    fn visit_in(&mut self, item: &Expr, collection: &Expr) -> Result<Value, EvalError> {
        self.membership(item, collection, false)
    }

    fn visit_within(&mut self, item: &Expr, collection: &Expr) -> Result<Value, EvalError> {
        self.membership(item, collection, true)
    }

    fn visit_first(&mut self, map: &CollectionMap) -> Result<Value, EvalError> {
        self.collection_map(map, true)
    }

    fn visit_array(&mut self, map: &CollectionMap) -> Result<Value, EvalError> {
        self.collection_map(map, false)
    }

    // Comparison

    fn visit_between(&mut self, item: &Expr, low: &Expr, high: &Expr) -> Result<Value, EvalError> {
        let item = self.eval(item)?;
        let low = self.eval(low)?;
        let high = self.eval(high)?;
        Ok(propagate(&[&item, &low, &high]).unwrap_or_else(|| {
            Value::Boolean(item.collate(&low).is_ge() && item.collate(&high).is_le())
        }))
    }

    fn visit_eq(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.compare(first, second, |a, b| Value::Boolean(a.equals(b)))
    }

    fn visit_le(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.compare(first, second, |a, b| Value::Boolean(a.collate(b).is_le()))
    }

    fn visit_lt(&mut self, first: &Expr, second: &Expr) -> Result<Value, EvalError> {
        self.compare(first, second, |a, b| Value::Boolean(a.collate(b).is_lt()))
    }

    fn visit_like(&mut self, first: &Expr, pattern: &Expr) -> Result<Value, EvalError> {
        let subject = self.eval(first)?;
        let pattern = self.eval(pattern)?;
        if let Some(unknown) = propagate(&[&subject, &pattern]) {
            return Ok(unknown);
        }
        let (Some(subject), Some(pattern)) = (subject.as_str(), pattern.as_str()) else {
            return Ok(Value::Null);
        };
        Ok(Value::Boolean(like_regex(pattern)?.is_match(subject)))
    }

    fn visit_is_missing(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| Value::Boolean(t == ValueType::Missing))
    }

    fn visit_is_not_missing(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| Value::Boolean(t != ValueType::Missing))
    }

    fn visit_is_null(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| match t {
            ValueType::Missing => Value::Missing,
            t => Value::Boolean(t == ValueType::Null),
        })
    }

    fn visit_is_not_null(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| match t {
            ValueType::Missing => Value::Missing,
            t => Value::Boolean(t != ValueType::Null),
        })
    }

    fn visit_is_valued(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| Value::Boolean(t > ValueType::Null))
    }

    fn visit_is_not_valued(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        self.type_test(operand, |t| Value::Boolean(t <= ValueType::Null))
    }

    fn visit_concat(&mut self, operands: &[Expr]) -> Result<Value, EvalError> {
        let values = self.eval_all(operands)?;
        if values.iter().any(Value::is_missing) {
            return Ok(Value::Missing);
        }
        let mut result = String::new();
        for value in &values {
            match value.as_str() {
                Some(s) => result.push_str(s),
                None => return Ok(Value::Null),
            }
        }
        Ok(Value::String(result))
    }

    fn visit_constant(&mut self, value: &Value) -> Result<Value, EvalError> {
        Ok(value.clone())
    }

    fn visit_identifier(&mut self, name: &str) -> Result<Value, EvalError> {
        Ok(self.context.lookup(name))
    }

    fn visit_self(&mut self) -> Result<Value, EvalError> {
        Ok(self.context.item().copy())
    }

    // Construction

    fn visit_array_construct(&mut self, elements: &[Expr]) -> Result<Value, EvalError> {
        let values = self.eval_all(elements)?;
        Ok(Value::Array(
            values
                .into_iter()
                .map(|v| if v.is_missing() { Value::Null } else { v })
                .collect(),
        ))
    }

    fn visit_object_construct(&mut self, pairs: &[(String, Expr)]) -> Result<Value, EvalError> {
        let mut fields = BTreeMap::new();
        for (name, expr) in pairs {
            let value = self.eval(expr)?;
            if !value.is_missing() {
                fields.insert(name.clone(), value);
            }
        }
        Ok(Value::Object(fields))
    }

    // Logic

    fn visit_and(&mut self, operands: &[Expr]) -> Result<Value, EvalError> {
        logic::and_values(operands.iter().map(|e| self.eval(e)))
    }

    fn visit_or(&mut self, operands: &[Expr]) -> Result<Value, EvalError> {
        logic::or_values(operands.iter().map(|e| self.eval(e)))
    }

    fn visit_not(&mut self, operand: &Expr) -> Result<Value, EvalError> {
        Ok(logic::not_value(&self.eval(operand)?))
    }

    // Navigation

    fn visit_element(&mut self, source: &Expr, index: &Expr) -> Result<Value, EvalError> {
        let source = self.eval(source)?;
        let index = self.eval(index)?;
        if source.is_missing() || index.is_missing() {
            return Ok(Value::Missing);
        }
        let Some(position) = position(&index) else {
            return Ok(Value::Null);
        };
        Ok(source.index(position).cloned().unwrap_or(Value::Missing))
    }

    fn visit_field(&mut self, source: &Expr, name: &Expr) -> Result<Value, EvalError> {
        let source = self.eval(source)?;
        let name = match name {
            Expr::FieldName(name) => Value::from(name.as_str()),
            computed => self.eval(computed)?,
        };
        if source.is_missing() || name.is_missing() {
            return Ok(Value::Missing);
        }
        let Some(name) = name.as_str() else {
            return Ok(Value::Null);
        };
        Ok(source.field(name).cloned().unwrap_or(Value::Missing))
    }

    fn visit_field_name(&mut self, name: &str) -> Result<Value, EvalError> {
        Ok(Value::from(name))
    }

    fn visit_slice(
        &mut self,
        source: &Expr,
        start: &Expr,
        end: Option<&Expr>,
    ) -> Result<Value, EvalError> {
        let source = self.eval(source)?;
        let start = self.eval(start)?;
        let end = end.map(|e| self.eval(e)).transpose()?;
        if source.is_missing() || start.is_missing() || end.as_ref().is_some_and(Value::is_missing)
        {
            return Ok(Value::Missing);
        }

        let Some(start) = position(&start) else {
            return Ok(Value::Null);
        };
        let sliced = match end {
            None => source.slice_tail(start),
            Some(end) => match position(&end) {
                Some(end) => source.slice(start, end),
                None => return Ok(Value::Null),
            },
        };
        Ok(sliced.unwrap_or(Value::Missing))
    }

    fn visit_function(&mut self, call: &FunctionCall) -> Result<Value, EvalError> {
        if call.is_aggregate() {
            return Err(EvalError::Aggregate(call.name.clone()));
        }
        let args = self.eval_all(&call.args)?;
        functions::call(&call.name, &args, self.context.item())
    }

    fn visit_subquery(&mut self, query: &Select) -> Result<Value, EvalError> {
        let executor = self
            .context
            .subqueries()
            .ok_or(EvalError::NoSubqueryExecutor)?;
        executor.execute(query, self.context)
    }

    // Parameters

    fn visit_named_parameter(&mut self, name: &str) -> Result<Value, EvalError> {
        self.context
            .parameters()
            .named(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundParameter(format!("${name}")))
    }

    fn visit_positional_parameter(&mut self, position: usize) -> Result<Value, EvalError> {
        self.context
            .parameters()
            .positional(position)
            .cloned()
            .ok_or_else(|| EvalError::UnboundParameter(format!("${position}")))
    }
}

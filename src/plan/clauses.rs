//! Operators for the clauses applied to fetched items: LET, WHERE, the
//! projection, ORDER BY, OFFSET and LIMIT.

use std::any::Any;

use serde::Deserialize;

use super::{Operator, OperatorVisitor, PlanContext, PlanError, envelope, fields, text};
use crate::ast::{Binding, Expr, Projection, ResultTerm, SortTerm};

/// Keeps the items for which `condition` is true.
#[derive(Debug)]
pub struct Filter {
    condition: Expr,
}

#[derive(Deserialize)]
struct FilterFields {
    condition: String,
}

impl Filter {
    pub fn new(condition: Expr) -> Self {
        Filter { condition }
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }
}

impl Operator for Filter {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_filter(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("condition".to_string(), text(&self.condition));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: FilterFields = fields(raw)?;
        Ok(Filter {
            condition: context.parse("condition", &f.condition)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Binds LET variables for every item, each visible to the ones after it.
#[derive(Debug)]
pub struct Let {
    bindings: Vec<Binding>,
}

#[derive(Deserialize)]
struct LetFields {
    bindings: Vec<BindingFields>,
}

#[derive(Deserialize)]
struct BindingFields {
    var: String,
    expr: String,
}

impl Let {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Let { bindings }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl Operator for Let {
    fn name(&self) -> &'static str {
        "Let"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_let(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let bindings = self
            .bindings
            .iter()
            .map(|b| serde_json::json!({"var": b.variable, "expr": text(&b.expr)}))
            .collect();

        let mut r = envelope(self.name());
        r.insert("bindings".to_string(), serde_json::Value::Array(bindings));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: LetFields = fields(raw)?;
        let mut bindings = Vec::with_capacity(f.bindings.len());
        for b in f.bindings {
            let expr = context.parse("bindings", &b.expr)?;
            bindings.push(Binding::new(b.var, expr));
        }
        Ok(Let { bindings })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Computes the result of every item from the projection.
#[derive(Debug)]
pub struct InitialProject {
    projection: Projection,
}

#[derive(Deserialize)]
struct InitialProjectFields {
    #[serde(default)]
    distinct: bool,
    #[serde(default)]
    raw: bool,
    result_terms: Vec<ResultTermFields>,
}

#[derive(Deserialize)]
struct ResultTermFields {
    #[serde(default)]
    expr: Option<String>,
    #[serde(default)]
    star: bool,
    #[serde(rename = "as", default)]
    alias: Option<String>,
}

impl InitialProject {
    pub fn new(projection: Projection) -> Self {
        InitialProject { projection }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

impl Operator for InitialProject {
    fn name(&self) -> &'static str {
        "InitialProject"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_initial_project(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let terms = self
            .projection
            .terms
            .iter()
            .map(|term| {
                let mut t = serde_json::Map::new();
                if let Some(expr) = &term.expr {
                    t.insert("expr".to_string(), text(expr));
                }
                if term.star {
                    t.insert("star".to_string(), true.into());
                }
                if let Some(alias) = &term.alias {
                    t.insert("as".to_string(), alias.as_str().into());
                }
                serde_json::Value::Object(t)
            })
            .collect();

        let mut r = envelope(self.name());
        if self.projection.distinct {
            r.insert("distinct".to_string(), true.into());
        }
        if self.projection.raw {
            r.insert("raw".to_string(), true.into());
        }
        r.insert("result_terms".to_string(), serde_json::Value::Array(terms));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: InitialProjectFields = fields(raw)?;
        let mut terms = Vec::with_capacity(f.result_terms.len());
        for t in f.result_terms {
            let expr = match &t.expr {
                Some(text) => Some(context.parse("result_terms", text)?),
                None if t.star => None,
                None => return Err(PlanError::MissingField("expr")),
            };
            terms.push(ResultTerm {
                expr,
                star: t.star,
                alias: t.alias,
            });
        }

        Ok(InitialProject {
            projection: Projection {
                distinct: f.distinct,
                raw: f.raw,
                terms,
            },
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sorts items by the ORDER BY terms; ties keep their input order.
#[derive(Debug)]
pub struct Order {
    terms: Vec<SortTerm>,
}

#[derive(Deserialize)]
struct OrderFields {
    sort_terms: Vec<SortTermFields>,
}

#[derive(Deserialize)]
struct SortTermFields {
    expr: String,
    #[serde(default)]
    desc: bool,
}

impl Order {
    pub fn new(terms: Vec<SortTerm>) -> Self {
        Order { terms }
    }

    pub fn terms(&self) -> &[SortTerm] {
        &self.terms
    }
}

impl Operator for Order {
    fn name(&self) -> &'static str {
        "Order"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_order(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let terms = self
            .terms
            .iter()
            .map(|term| {
                let mut t = serde_json::Map::new();
                t.insert("expr".to_string(), text(&term.expr));
                if term.descending {
                    t.insert("desc".to_string(), true.into());
                }
                serde_json::Value::Object(t)
            })
            .collect();

        let mut r = envelope(self.name());
        r.insert("sort_terms".to_string(), serde_json::Value::Array(terms));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: OrderFields = fields(raw)?;
        let terms = f
            .sort_terms
            .iter()
            .map(|t| {
                Ok(SortTerm {
                    expr: context.parse("sort_terms", &t.expr)?,
                    descending: t.desc,
                })
            })
            .collect::<Result<_, PlanError>>()?;
        Ok(Order { terms })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Deserialize)]
struct CountFields {
    expr: String,
}

/// Skips the first `expr` items.
#[derive(Debug)]
pub struct Offset {
    expr: Expr,
}

impl Offset {
    pub fn new(expr: Expr) -> Self {
        Offset { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl Operator for Offset {
    fn name(&self) -> &'static str {
        "Offset"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_offset(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("expr".to_string(), text(&self.expr));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: CountFields = fields(raw)?;
        Ok(Offset {
            expr: context.parse("expr", &f.expr)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps at most `expr` items.
#[derive(Debug)]
pub struct Limit {
    expr: Expr,
}

impl Limit {
    pub fn new(expr: Expr) -> Self {
        Limit { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl Operator for Limit {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_limit(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("expr".to_string(), text(&self.expr));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: CountFields = fields(raw)?;
        Ok(Limit {
            expr: context.parse("expr", &f.expr)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

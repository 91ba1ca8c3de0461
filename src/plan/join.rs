use std::any::Any;

use serde::Deserialize;

use super::{Operator, OperatorVisitor, PlanContext, PlanError, child, envelope, fields, text};
use crate::ast::Expr;

/// ANSI join. For every item from the left, `child` is run with that item as
/// its input; the rows it yields are kept where `on_clause` holds. An outer
/// join keeps a left item that matched nothing.
#[derive(Debug)]
pub struct AnsiJoin {
    outer: bool,
    alias: String,
    on_clause: Expr,
    child: Box<dyn Operator>,
}

#[derive(Deserialize)]
struct AnsiJoinFields {
    #[serde(default)]
    on_clause: String,
    #[serde(default)]
    outer: bool,
    #[serde(default)]
    alias: String,
    #[serde(rename = "~child")]
    child: Option<serde_json::Value>,
}

impl AnsiJoin {
    pub fn new(
        outer: bool,
        alias: impl Into<String>,
        on_clause: Expr,
        child: Box<dyn Operator>,
    ) -> Self {
        AnsiJoin {
            outer,
            alias: alias.into(),
            on_clause,
            child,
        }
    }

    pub fn outer(&self) -> bool {
        self.outer
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn on_clause(&self) -> &Expr {
        &self.on_clause
    }

    pub fn child(&self) -> &dyn Operator {
        self.child.as_ref()
    }
}

impl Operator for AnsiJoin {
    fn name(&self) -> &'static str {
        "AnsiJoin"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_ansi_join(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("alias".to_string(), self.alias.as_str().into());
        r.insert("on_clause".to_string(), text(&self.on_clause));
        if self.outer {
            r.insert("outer".to_string(), true.into());
        }
        r.insert("~child".to_string(), self.child.marshal());
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: AnsiJoinFields = fields(raw)?;
        if f.on_clause.is_empty() {
            return Err(PlanError::MissingField("on_clause"));
        }
        let on_clause = context.parse("on_clause", &f.on_clause)?;
        let child = child("~child", f.child.as_ref(), context)?;

        Ok(AnsiJoin {
            outer: f.outer,
            alias: f.alias,
            on_clause,
            child,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

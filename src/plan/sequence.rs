use std::any::Any;

use serde::Deserialize;

use super::{Operator, OperatorVisitor, PlanContext, PlanError, decode_operator, envelope, fields};

/// Runs its children one after the other, each over the output of the last.
#[derive(Debug)]
pub struct Sequence {
    children: Vec<Box<dyn Operator>>,
}

#[derive(Deserialize)]
struct SequenceFields {
    #[serde(rename = "~children")]
    children: Option<Vec<serde_json::Value>>,
}

impl Sequence {
    pub fn new(children: Vec<Box<dyn Operator>>) -> Self {
        Sequence { children }
    }

    pub fn children(&self) -> &[Box<dyn Operator>] {
        &self.children
    }
}

impl Operator for Sequence {
    fn name(&self) -> &'static str {
        "Sequence"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_sequence(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        let children = self.children.iter().map(|c| c.marshal()).collect();
        r.insert("~children".to_string(), serde_json::Value::Array(children));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: SequenceFields = fields(raw)?;
        let children = f
            .children
            .ok_or(PlanError::MissingField("~children"))?
            .iter()
            .map(|child| decode_operator(child, context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Sequence { children })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

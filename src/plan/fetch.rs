use std::any::Any;
use std::sync::Arc;

use serde::Deserialize;

use super::{Operator, OperatorVisitor, PlanContext, PlanError, envelope, fields, text};
use crate::ast::KeyspaceTerm;
use crate::datastore::Keyspace;

/// Fetches the documents whose keys the preceding scan produced and binds
/// each one (through the term's projection, if any) to the term's alias.
#[derive(Debug)]
pub struct Fetch {
    keyspace: Arc<dyn Keyspace>,
    term: KeyspaceTerm,
}

#[derive(Deserialize)]
struct FetchFields {
    #[serde(default)]
    projection: Option<String>,
    namespace: String,
    keyspace: String,
    #[serde(rename = "as", default)]
    alias: String,
}

impl Fetch {
    pub fn new(keyspace: Arc<dyn Keyspace>, term: KeyspaceTerm) -> Self {
        Fetch { keyspace, term }
    }

    pub fn keyspace(&self) -> &Arc<dyn Keyspace> {
        &self.keyspace
    }

    pub fn term(&self) -> &KeyspaceTerm {
        &self.term
    }
}

impl Operator for Fetch {
    fn name(&self) -> &'static str {
        "Fetch"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_fetch(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        if let Some(projection) = &self.term.projection {
            r.insert("projection".to_string(), text(projection));
        }
        r.insert("namespace".to_string(), self.term.namespace.as_str().into());
        r.insert("keyspace".to_string(), self.term.keyspace.as_str().into());
        if !self.term.alias.is_empty() {
            r.insert("as".to_string(), self.term.alias.as_str().into());
        }
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: FetchFields = fields(raw)?;

        let mut term = KeyspaceTerm::new(f.namespace, f.keyspace).with_alias(f.alias);
        if let Some(projection) = &f.projection {
            term = term.with_projection(context.parse_path("projection", projection)?);
        }

        let keyspace = context.keyspace(&term.namespace, &term.keyspace)?;
        Ok(Fetch { keyspace, term })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

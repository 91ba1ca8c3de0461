use std::any::Any;
use std::sync::Arc;

use serde::Deserialize;

use super::{Operator, OperatorVisitor, PlanContext, PlanError, envelope, fields, text};
use crate::ast::Expr;
use crate::datastore::Keyspace;

/// Produces every key of a keyspace.
#[derive(Debug)]
pub struct PrimaryScan {
    keyspace: Arc<dyn Keyspace>,
}

#[derive(Deserialize)]
struct PrimaryScanFields {
    namespace: String,
    keyspace: String,
}

impl PrimaryScan {
    pub fn new(keyspace: Arc<dyn Keyspace>) -> Self {
        PrimaryScan { keyspace }
    }

    pub fn keyspace(&self) -> &Arc<dyn Keyspace> {
        &self.keyspace
    }
}

impl Operator for PrimaryScan {
    fn name(&self) -> &'static str {
        "PrimaryScan"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_primary_scan(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("namespace".to_string(), self.keyspace.namespace_id().into());
        r.insert("keyspace".to_string(), self.keyspace.name().into());
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: PrimaryScanFields = fields(raw)?;
        Ok(PrimaryScan {
            keyspace: context.keyspace(&f.namespace, &f.keyspace)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Produces the keys named by a USE KEYS expression: a string or an array
/// of strings.
#[derive(Debug)]
pub struct KeyScan {
    keys: Expr,
}

#[derive(Deserialize)]
struct KeyScanFields {
    keys: String,
}

impl KeyScan {
    pub fn new(keys: Expr) -> Self {
        KeyScan { keys }
    }

    pub fn keys(&self) -> &Expr {
        &self.keys
    }
}

impl Operator for KeyScan {
    fn name(&self) -> &'static str {
        "KeyScan"
    }

    fn accept(&self, visitor: &mut dyn OperatorVisitor) -> Result<(), PlanError> {
        visitor.visit_key_scan(self)
    }

    fn marshal(&self) -> serde_json::Value {
        let mut r = envelope(self.name());
        r.insert("keys".to_string(), text(&self.keys));
        r.into()
    }

    fn decode(raw: &serde_json::Value, context: &PlanContext<'_>) -> Result<Self, PlanError> {
        let f: KeyScanFields = fields(raw)?;
        Ok(KeyScan {
            keys: context.parse("keys", &f.keys)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

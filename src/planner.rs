//! Builds execution plans from SELECT statements.
//!
//! Planning is direct: every keyspace is read with a primary scan (or a key
//! scan under USE KEYS) followed by a fetch, and each clause maps to one
//! operator in a [`Sequence`]. Grouping and aggregation are not planned.

use log::debug;

use crate::ast::{FromTerm, KeyspaceTerm, Select};
use crate::datastore::Datastore;
use crate::plan::{
    AnsiJoin, Fetch, Filter, InitialProject, KeyScan, Let, Limit, Offset, Operator, Order,
    PlanError, PrimaryScan, Sequence,
};
use crate::semantics::contains_aggregate;

pub struct Planner<'d> {
    datastore: &'d dyn Datastore,
}

impl<'d> Planner<'d> {
    pub fn new(datastore: &'d dyn Datastore) -> Self {
        Planner { datastore }
    }

    pub fn plan(&self, select: &Select) -> Result<Box<dyn Operator>, PlanError> {
        let node = &select.subselect;
        if !node.with.is_empty() {
            return Err(PlanError::Unsupported("WITH".to_string()));
        }
        if node.group.is_some() {
            return Err(PlanError::Unsupported("GROUP BY".to_string()));
        }
        let projected = node.projection.terms.iter().filter_map(|t| t.expr.as_ref());
        let ordered = select.order.iter().map(|t| &t.expr);
        if let Some(expr) = projected.chain(ordered).find(|e| contains_aggregate(e)) {
            return Err(PlanError::Unsupported(format!("aggregate {expr}")));
        }

        let mut children: Vec<Box<dyn Operator>> = Vec::new();
        if let Some(from) = &node.from {
            self.plan_from(from, &mut children)?;
        }
        if !node.let_bindings.is_empty() {
            children.push(Box::new(Let::new(node.let_bindings.clone())));
        }
        if let Some(condition) = &node.where_clause {
            children.push(Box::new(Filter::new(condition.clone())));
        }
        children.push(Box::new(InitialProject::new(node.projection.clone())));
        if !select.order.is_empty() {
            children.push(Box::new(Order::new(select.order.clone())));
        }
        if let Some(offset) = &select.offset {
            children.push(Box::new(Offset::new(offset.clone())));
        }
        if let Some(limit) = &select.limit {
            children.push(Box::new(Limit::new(limit.clone())));
        }

        debug!("planned {} operators", children.len());
        Ok(Box::new(Sequence::new(children)))
    }

    fn plan_from(
        &self,
        from: &FromTerm,
        children: &mut Vec<Box<dyn Operator>>,
    ) -> Result<(), PlanError> {
        match from {
            FromTerm::Keyspace(term) => self.plan_keyspace(term, children),
            FromTerm::AnsiJoin(join) => {
                self.plan_from(&join.left, children)?;

                let mut right = Vec::new();
                self.plan_keyspace(&join.right, &mut right)?;
                children.push(Box::new(AnsiJoin::new(
                    join.outer,
                    join.right.effective_alias(),
                    join.on_clause.clone(),
                    Box::new(Sequence::new(right)),
                )));
                Ok(())
            }
        }
    }

    fn plan_keyspace(
        &self,
        term: &KeyspaceTerm,
        children: &mut Vec<Box<dyn Operator>>,
    ) -> Result<(), PlanError> {
        let keyspace = self.datastore.keyspace(&term.namespace, &term.keyspace)?;
        match &term.keys {
            Some(keys) => children.push(Box::new(KeyScan::new(keys.clone()))),
            None => children.push(Box::new(PrimaryScan::new(keyspace.clone()))),
        }
        children.push(Box::new(Fetch::new(keyspace, term.clone())));
        Ok(())
    }
}

use super::{
    AnsiJoin, Fetch, Filter, InitialProject, KeyScan, Let, Limit, Offset, Operator,
    OperatorVisitor, Order, PlanError, PrimaryScan, Sequence,
};
use crate::stringer::quote_name;

/// Renders a plan as an indented outline, one operator per line.
///
/// ```text
/// Sequence
///   PrimaryScan `default`:`users`
///   Fetch `default`:`users` as u
///   Filter (21 < (`u`.`age`))
///   InitialProject (`u`.`name`)
/// ```
#[derive(Debug, Default)]
pub struct PlanPrinter {
    depth: usize,
    out: String,
}

/// Explains `plan` with a fresh [`PlanPrinter`].
pub fn explain(plan: &dyn Operator) -> Result<String, PlanError> {
    let mut printer = PlanPrinter::new();
    plan.accept(&mut printer)?;
    Ok(printer.finish())
}

impl PlanPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, op: &dyn Operator) -> Result<(), PlanError> {
        self.depth += 1;
        let result = op.accept(self);
        self.depth -= 1;
        result
    }
}

fn keyspace(namespace: &str, keyspace: &str) -> String {
    format!("{}:{}", quote_name(namespace), quote_name(keyspace))
}

impl OperatorVisitor for PlanPrinter {
    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> Result<(), PlanError> {
        let ks = op.keyspace();
        self.line(&format!("PrimaryScan {}", keyspace(ks.namespace_id(), ks.name())));
        Ok(())
    }

    fn visit_key_scan(&mut self, op: &KeyScan) -> Result<(), PlanError> {
        self.line(&format!("KeyScan {}", op.keys()));
        Ok(())
    }

    fn visit_fetch(&mut self, op: &Fetch) -> Result<(), PlanError> {
        let term = op.term();
        let mut text = format!("Fetch {}", keyspace(&term.namespace, &term.keyspace));
        if let Some(projection) = &term.projection {
            text.push_str(&format!(" path {projection}"));
        }
        if !term.alias.is_empty() {
            text.push_str(&format!(" as {}", term.alias));
        }
        self.line(&text);
        Ok(())
    }

    fn visit_ansi_join(&mut self, op: &AnsiJoin) -> Result<(), PlanError> {
        let kind = if op.outer() { "AnsiJoin outer" } else { "AnsiJoin" };
        self.line(&format!("{kind} {} on {}", op.alias(), op.on_clause()));
        self.nested(op.child())
    }

    fn visit_filter(&mut self, op: &Filter) -> Result<(), PlanError> {
        self.line(&format!("Filter {}", op.condition()));
        Ok(())
    }

    fn visit_let(&mut self, op: &Let) -> Result<(), PlanError> {
        let bindings: Vec<String> = op
            .bindings()
            .iter()
            .map(|b| format!("{} = {}", quote_name(&b.variable), b.expr))
            .collect();
        self.line(&format!("Let {}", bindings.join(", ")));
        Ok(())
    }

    fn visit_initial_project(&mut self, op: &InitialProject) -> Result<(), PlanError> {
        let projection = op.projection();
        let terms: Vec<String> = projection
            .terms
            .iter()
            .map(|term| {
                let mut text = match (&term.expr, term.star) {
                    (Some(expr), true) => format!("{expr}.*"),
                    (Some(expr), false) => expr.to_string(),
                    (None, _) => "*".to_string(),
                };
                if let Some(alias) = &term.alias {
                    text.push_str(&format!(" as {}", quote_name(alias)));
                }
                text
            })
            .collect();

        let mut head = "InitialProject".to_string();
        if projection.distinct {
            head.push_str(" distinct");
        }
        if projection.raw {
            head.push_str(" raw");
        }
        self.line(&format!("{head} {}", terms.join(", ")));
        Ok(())
    }

    fn visit_order(&mut self, op: &Order) -> Result<(), PlanError> {
        let terms: Vec<String> = op
            .terms()
            .iter()
            .map(|t| {
                if t.descending {
                    format!("{} desc", t.expr)
                } else {
                    t.expr.to_string()
                }
            })
            .collect();
        self.line(&format!("Order {}", terms.join(", ")));
        Ok(())
    }

    fn visit_offset(&mut self, op: &Offset) -> Result<(), PlanError> {
        self.line(&format!("Offset {}", op.expr()));
        Ok(())
    }

    fn visit_limit(&mut self, op: &Limit) -> Result<(), PlanError> {
        self.line(&format!("Limit {}", op.expr()));
        Ok(())
    }

    fn visit_sequence(&mut self, op: &Sequence) -> Result<(), PlanError> {
        self.line("Sequence");
        for child in op.children() {
            self.nested(child.as_ref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, KeyspaceTerm};
    use crate::datastore::{Datastore, MemoryDatastore};
    use crate::parser::parse_expression;

    #[test]
    fn test_explain_nests_children() {
        let store = MemoryDatastore::new();
        store.create_keyspace("default", "users");
        let users = store.keyspace("default", "users").unwrap();

        let join = AnsiJoin::new(
            true,
            "v",
            parse_expression("u.id = v.uid").unwrap(),
            Box::new(Fetch::new(
                users.clone(),
                KeyspaceTerm::new("default", "users").with_alias("v"),
            )),
        );
        let plan = Sequence::new(vec![
            Box::new(PrimaryScan::new(users)) as Box<dyn Operator>,
            Box::new(join),
            Box::new(Limit::new(Expr::constant(2))),
        ]);

        let text = explain(&plan).unwrap();
        assert_eq!(
            text,
            "Sequence\n\
             \x20 PrimaryScan `default`:`users`\n\
             \x20 AnsiJoin outer v on ((`u`.`id`) = (`v`.`uid`))\n\
             \x20   Fetch `default`:`users` as v\n\
             \x20 Limit 2\n"
        );
    }
}

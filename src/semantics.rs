//! Clause-context validation.
//!
//! [`SemChecker`] walks a statement and rejects expressions that are not
//! allowed where they appear. Which clause it is in is tracked as a bit mask;
//! each clause is entered through a [`FlagScope`] that puts the previous mask
//! back when it is dropped, on success and on error alike.
//!
//! A sub-select starts with a clean mask, so an aggregate in a subquery's
//! projection is fine even when the subquery sits inside a WHERE clause.

use std::ops::{Deref, DerefMut};

use log::debug;
use thiserror::Error;

use crate::ast::{
    AnsiJoinTerm, Binding, CollectionMap, CollectionPredicate, Expr, FunctionCall, KeyspaceTerm,
    Select, Subselect, WhenTerm,
};
use crate::value::Value;
use crate::visitor::{NodeVisitor, Visitor, map_bindings};

/// Inside a WHERE clause.
pub const SEM_WHERE: u32 = 1 << 0;
/// Inside an ON clause.
pub const SEM_ON: u32 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("aggregate {function}() is not allowed in the {clause} clause")]
    AggregateInClause {
        function: String,
        clause: &'static str,
    },
}

/// One validation pass. Not shared between passes.
#[derive(Debug, Default)]
pub struct SemChecker {
    flags: u32,
}

/// Restores the checker's flags when dropped.
pub struct FlagScope<'a> {
    checker: &'a mut SemChecker,
    saved: u32,
}

impl Deref for FlagScope<'_> {
    type Target = SemChecker;

    fn deref(&self) -> &SemChecker {
        self.checker
    }
}

impl DerefMut for FlagScope<'_> {
    fn deref_mut(&mut self) -> &mut SemChecker {
        self.checker
    }
}

impl Drop for FlagScope<'_> {
    fn drop(&mut self) {
        self.checker.flags = self.saved;
    }
}

impl SemChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The clause flags currently in effect.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Sets `set` and clears `unset` until the returned guard is dropped.
    pub fn enter(&mut self, set: u32, unset: u32) -> FlagScope<'_> {
        let saved = self.flags;
        self.flags = (saved & !unset) | set;
        FlagScope {
            checker: self,
            saved,
        }
    }

    /// Validates a whole statement.
    pub fn check(&mut self, select: &Select) -> Result<(), SemanticError> {
        let result = select.accept(self);
        if let Err(err) = &result {
            debug!("semantic check failed: {err}");
        }
        result
    }

    fn each<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>) -> Result<(), SemanticError> {
        for expr in exprs {
            expr.accept(self)?;
        }
        Ok(())
    }

    fn whens(&mut self, whens: &[WhenTerm], else_term: Option<&Expr>) -> Result<(), SemanticError> {
        for term in whens {
            self.each([&term.when, &term.then])?;
        }
        self.each(else_term)
    }

    fn clause(&self) -> Option<&'static str> {
        if self.flags & SEM_ON != 0 {
            Some("ON")
        } else if self.flags & SEM_WHERE != 0 {
            Some("WHERE")
        } else {
            None
        }
    }
}

impl Visitor for SemChecker {
    type Output = ();
    type Error = SemanticError;

    // Arithmetic

    fn visit_add(&mut self, operands: &[Expr]) -> Result<(), SemanticError> {
        self.each(operands)
    }

    fn visit_sub(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_mult(&mut self, operands: &[Expr]) -> Result<(), SemanticError> {
        self.each(operands)
    }

    fn visit_div(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_mod(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_neg(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    // Case

    fn visit_searched_case(
        &mut self,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<(), SemanticError> {
        self.whens(whens, else_term)
    }

    fn visit_simple_case(
        &mut self,
        search: &Expr,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<(), SemanticError> {
        search.accept(self)?;
        self.whens(whens, else_term)
    }

    // Collections

    fn visit_any(&mut self, pred: &CollectionPredicate) -> Result<(), SemanticError> {
        map_bindings(&pred.bindings, self)?;
        pred.satisfies.accept(self)
    }

    fn visit_every(&mut self, pred: &CollectionPredicate) -> Result<(), SemanticError> {
        map_bindings(&pred.bindings, self)?;
        pred.satisfies.accept(self)
    }

    fn visit_exists(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_in(&mut self, item: &Expr, collection: &Expr) -> Result<(), SemanticError> {
        self.each([item, collection])
    }

    fn visit_within(&mut self, item: &Expr, collection: &Expr) -> Result<(), SemanticError> {
        self.each([item, collection])
    }

    fn visit_first(&mut self, map: &CollectionMap) -> Result<(), SemanticError> {
        map_bindings(&map.bindings, self)?;
        map.mapping.accept(self)?;
        self.each(map.when.as_ref())
    }

    fn visit_array(&mut self, map: &CollectionMap) -> Result<(), SemanticError> {
        map_bindings(&map.bindings, self)?;
        map.mapping.accept(self)?;
        self.each(map.when.as_ref())
    }

    // Comparison

    fn visit_between(&mut self, item: &Expr, low: &Expr, high: &Expr) -> Result<(), SemanticError> {
        self.each([item, low, high])
    }

    fn visit_eq(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_le(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_lt(&mut self, first: &Expr, second: &Expr) -> Result<(), SemanticError> {
        self.each([first, second])
    }

    fn visit_like(&mut self, first: &Expr, pattern: &Expr) -> Result<(), SemanticError> {
        self.each([first, pattern])
    }

    fn visit_is_missing(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_is_not_missing(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_is_null(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_is_not_null(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_is_valued(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_is_not_valued(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    fn visit_concat(&mut self, operands: &[Expr]) -> Result<(), SemanticError> {
        self.each(operands)
    }

    fn visit_constant(&mut self, _value: &Value) -> Result<(), SemanticError> {
        Ok(())
    }

    fn visit_identifier(&mut self, _name: &str) -> Result<(), SemanticError> {
        Ok(())
    }

    fn visit_self(&mut self) -> Result<(), SemanticError> {
        Ok(())
    }

    // Construction

    fn visit_array_construct(&mut self, elements: &[Expr]) -> Result<(), SemanticError> {
        self.each(elements)
    }

    fn visit_object_construct(&mut self, pairs: &[(String, Expr)]) -> Result<(), SemanticError> {
        self.each(pairs.iter().map(|(_, value)| value))
    }

    // Logic

    fn visit_and(&mut self, operands: &[Expr]) -> Result<(), SemanticError> {
        self.each(operands)
    }

    fn visit_or(&mut self, operands: &[Expr]) -> Result<(), SemanticError> {
        self.each(operands)
    }

    fn visit_not(&mut self, operand: &Expr) -> Result<(), SemanticError> {
        operand.accept(self)
    }

    // Navigation

    fn visit_element(&mut self, source: &Expr, index: &Expr) -> Result<(), SemanticError> {
        self.each([source, index])
    }

    fn visit_field(&mut self, source: &Expr, name: &Expr) -> Result<(), SemanticError> {
        self.each([source, name])
    }

    fn visit_field_name(&mut self, _name: &str) -> Result<(), SemanticError> {
        Ok(())
    }

    fn visit_slice(
        &mut self,
        source: &Expr,
        start: &Expr,
        end: Option<&Expr>,
    ) -> Result<(), SemanticError> {
        self.each([source, start])?;
        self.each(end)
    }

    fn visit_function(&mut self, call: &FunctionCall) -> Result<(), SemanticError> {
        if call.is_aggregate()
            && let Some(clause) = self.clause()
        {
            return Err(SemanticError::AggregateInClause {
                function: call.name.clone(),
                clause,
            });
        }
        self.each(&call.args)
    }

    fn visit_subquery(&mut self, query: &Select) -> Result<(), SemanticError> {
        query.accept(self)
    }

    // Parameters

    fn visit_named_parameter(&mut self, _name: &str) -> Result<(), SemanticError> {
        Ok(())
    }

    fn visit_positional_parameter(&mut self, _position: usize) -> Result<(), SemanticError> {
        Ok(())
    }
}

impl NodeVisitor for SemChecker {
    type Output = ();
    type Error = SemanticError;

    fn visit_select(&mut self, node: &Select) -> Result<(), SemanticError> {
        node.subselect.accept(self)?;
        for term in &node.order {
            term.expr.accept(self)?;
        }
        self.each(node.offset.as_ref())?;
        self.each(node.limit.as_ref())
    }

    fn visit_subselect(&mut self, node: &Subselect) -> Result<(), SemanticError> {
        let mut scope = self.enter(0, SEM_WHERE | SEM_ON);
        let checker: &mut SemChecker = &mut scope;

        map_bindings(&node.with, checker)?;

        if let Some(from) = &node.from {
            from.accept(checker)?;
        }

        map_bindings(&node.let_bindings, checker)?;

        if let Some(condition) = &node.where_clause {
            let mut clause = checker.enter(SEM_WHERE, 0);
            condition.accept(&mut *clause)?;
        }

        if let Some(group) = &node.group {
            checker.each(&group.by)?;
            map_bindings(&group.letting, checker)?;
            checker.each(group.having.as_ref())?;
        }

        checker.each(node.projection.terms.iter().filter_map(|t| t.expr.as_ref()))
    }

    fn visit_keyspace_term(&mut self, node: &KeyspaceTerm) -> Result<(), SemanticError> {
        self.each(node.projection.as_ref())?;
        self.each(node.keys.as_ref())
    }

    fn visit_ansi_join(&mut self, node: &AnsiJoinTerm) -> Result<(), SemanticError> {
        node.left.accept(self)?;
        self.visit_keyspace_term(&node.right)?;

        let mut clause = self.enter(SEM_ON, 0);
        node.on_clause.accept(&mut *clause)
    }
}

/// Bindings whose expressions contain an aggregate call.
pub fn aggregate_bindings(bindings: &[Binding]) -> Vec<&str> {
    bindings
        .iter()
        .filter(|b| contains_aggregate(&b.expr))
        .map(|b| b.variable.as_str())
        .collect()
}

/// True if `expr` calls an aggregate outside any nested subquery.
pub fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function(call) if call.is_aggregate() => true,
        other => other.children().into_iter().any(contains_aggregate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_select;

    fn check(text: &str) -> Result<(), SemanticError> {
        SemChecker::new().check(&parse_select(text).unwrap())
    }

    #[test]
    fn test_aggregate_in_projection_is_allowed() {
        assert!(check("SELECT COUNT(*) FROM ks GROUP BY ks.type HAVING COUNT(*) > 1").is_ok());
    }

    #[test]
    fn test_aggregate_in_where_is_rejected() {
        let err = check("SELECT a FROM ks WHERE SUM(a) > 1").unwrap_err();
        assert_eq!(
            err,
            SemanticError::AggregateInClause {
                function: "sum".to_string(),
                clause: "WHERE",
            }
        );
    }

    #[test]
    fn test_aggregate_in_on_is_rejected() {
        let err = check("SELECT 1 FROM a JOIN b ON MAX(b.x) = a.x").unwrap_err();
        assert!(matches!(err, SemanticError::AggregateInClause { clause: "ON", .. }));
    }

    #[test]
    fn test_from_is_checked_before_where() {
        let err = check("SELECT 1 FROM a JOIN b ON MIN(b.x) = 1 WHERE AVG(a.x) > 1").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::AggregateInClause { ref function, clause: "ON" } if function == "min"
        ));
    }

    #[test]
    fn test_subquery_starts_with_clean_flags() {
        assert!(check("SELECT a FROM ks WHERE a IN (SELECT RAW MAX(x) FROM other)").is_ok());
        assert!(
            check("SELECT a FROM ks WHERE a IN (SELECT RAW x FROM other WHERE COUNT(x) > 0)")
                .is_err()
        );
    }

    #[test]
    fn test_where_flag_does_not_leak_into_projection() {
        // WHERE is visited before the projection; its flag must be gone by then
        assert!(check("SELECT ARRAY_AGG(a) FROM ks WHERE a > 1").is_ok());
    }

    #[test]
    fn test_flags_restored_after_error() {
        let select = parse_select("SELECT a FROM ks WHERE COUNT(a) > 1").unwrap();
        let mut checker = SemChecker::new();
        {
            let mut scope = checker.enter(SEM_ON, 0);
            assert_eq!(scope.flags(), SEM_ON);
            assert!(select.accept(&mut *scope).is_err());
            assert_eq!(scope.flags(), SEM_ON);
        }
        assert_eq!(checker.flags(), 0);
    }

    #[test]
    fn test_flags_restored_after_success() {
        let select = parse_select("SELECT a FROM ks WHERE a > 1").unwrap();
        let mut checker = SemChecker::new();
        let mut scope = checker.enter(SEM_WHERE, 0);
        assert!(select.accept(&mut *scope).is_ok());
        assert_eq!(scope.flags(), SEM_WHERE);
    }

    #[test]
    fn test_contains_aggregate() {
        let select = parse_select("SELECT 1 LET s = SUM(x) + 1, t = x").unwrap();
        assert_eq!(aggregate_bindings(&select.subselect.let_bindings), vec!["s"]);
    }
}

//! Canonical text form of expressions and statements.
//!
//! Every compound expression is parenthesised and every name is back-quoted,
//! so the output parses back to the same tree regardless of precedence or
//! reserved words. Plans embed expressions in this form.

use crate::ast::{
    AnsiJoinTerm, Binding, CollectionMap, CollectionPredicate, Expr, FromTerm, FunctionCall,
    KeyspaceTerm, ResultTerm, Select, Subselect, WhenTerm,
};
use crate::value::{Value, to_json};
use crate::visitor::{NodeVisitor, Visitor};
use std::convert::Infallible;
use std::fmt;

/// Renders expressions; also renders statements through [`NodeVisitor`].
#[derive(Debug, Default)]
pub struct Stringer;

impl Stringer {
    pub fn new() -> Self {
        Stringer
    }

    /// Text of `expr`.
    pub fn visit(&mut self, expr: &Expr) -> String {
        match expr.accept(self) {
            Ok(text) => text,
            Err(never) => match never {},
        }
    }

    /// Text of a statement.
    pub fn visit_statement(&mut self, select: &Select) -> String {
        match select.accept(self) {
            Ok(text) => text,
            Err(never) => match never {},
        }
    }

    fn join(&mut self, operands: &[Expr], separator: &str) -> String {
        let parts: Vec<String> = operands.iter().map(|e| self.visit(e)).collect();
        parts.join(separator)
    }

    fn infix(&mut self, operands: &[Expr], op: &str) -> Result<String, Infallible> {
        Ok(format!("({})", self.join(operands, &format!(" {op} "))))
    }

    fn binary(&mut self, first: &Expr, op: &str, second: &Expr) -> Result<String, Infallible> {
        Ok(format!("({} {op} {})", self.visit(first), self.visit(second)))
    }

    fn postfix_test(&mut self, operand: &Expr, test: &str) -> Result<String, Infallible> {
        Ok(format!("({} {test})", self.visit(operand)))
    }

    fn whens(&mut self, whens: &[WhenTerm], else_term: Option<&Expr>) -> String {
        let mut text = String::new();
        for term in whens {
            text.push_str(&format!(
                " when {} then {}",
                self.visit(&term.when),
                self.visit(&term.then)
            ));
        }
        if let Some(else_term) = else_term {
            text.push_str(&format!(" else {}", self.visit(else_term)));
        }
        text.push_str(" end");
        text
    }

    fn bindings(&mut self, bindings: &[Binding]) -> String {
        let parts: Vec<String> = bindings
            .iter()
            .map(|b| {
                let op = if b.descend { "within" } else { "in" };
                format!("{} {op} {}", quote_name(&b.variable), self.visit(&b.expr))
            })
            .collect();
        parts.join(", ")
    }

    fn predicate(&mut self, keyword: &str, pred: &CollectionPredicate) -> Result<String, Infallible> {
        Ok(format!(
            "{keyword} {} satisfies {} end",
            self.bindings(&pred.bindings),
            self.visit(&pred.satisfies)
        ))
    }

    fn map(&mut self, keyword: &str, map: &CollectionMap) -> Result<String, Infallible> {
        let mut text = format!(
            "{keyword} {} for {}",
            self.visit(&map.mapping),
            self.bindings(&map.bindings)
        );
        if let Some(when) = &map.when {
            text.push_str(&format!(" when {}", self.visit(when)));
        }
        text.push_str(" end");
        Ok(text)
    }

    fn assignments(&mut self, bindings: &[Binding]) -> String {
        let parts: Vec<String> = bindings
            .iter()
            .map(|b| format!("{} = {}", quote_name(&b.variable), self.visit(&b.expr)))
            .collect();
        parts.join(", ")
    }

    fn result_term(&mut self, term: &ResultTerm) -> String {
        let mut text = match (&term.expr, term.star) {
            (None, _) => "*".to_string(),
            (Some(expr), true) => format!("{}.*", self.visit(expr)),
            (Some(expr), false) => self.visit(expr),
        };
        if let Some(alias) = &term.alias {
            text.push_str(&format!(" as {}", quote_name(alias)));
        }
        text
    }

    /// Navigation applied to `self`, written the way a FROM clause spells it.
    fn path_suffix(&mut self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::SelfRef => Some(String::new()),
            Expr::Field(source, name) => {
                let prefix = self.path_suffix(source)?;
                Some(match name.as_ref() {
                    Expr::FieldName(name) => format!("{prefix}.{}", quote_name(name)),
                    name => format!("{prefix}.[{}]", self.visit(name)),
                })
            }
            Expr::Element(source, index) => {
                let prefix = self.path_suffix(source)?;
                Some(format!("{prefix}[{}]", self.visit(index)))
            }
            Expr::Slice { source, start, end } => {
                let prefix = self.path_suffix(source)?;
                let end = end.as_deref().map(|e| self.visit(e)).unwrap_or_default();
                Some(format!("{prefix}[{}:{end}]", self.visit(start)))
            }
            _ => None,
        }
    }
}

/// Back-quotes `name`, doubling any back-quote inside it.
pub fn quote_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn constant_text(value: &Value) -> String {
    match value {
        Value::Missing => "missing".to_string(),
        value => to_json(value),
    }
}

impl Visitor for Stringer {
    type Output = String;
    type Error = Infallible;

    // Arithmetic

    fn visit_add(&mut self, operands: &[Expr]) -> Result<String, Infallible> {
        self.infix(operands, "+")
    }

    fn visit_sub(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "-", second)
    }

    fn visit_mult(&mut self, operands: &[Expr]) -> Result<String, Infallible> {
        self.infix(operands, "*")
    }

    fn visit_div(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "/", second)
    }

    fn visit_mod(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "%", second)
    }

    fn visit_neg(&mut self, operand: &Expr) -> Result<String, Infallible> {
        // `-5` would read back as a negative constant
        Ok(match operand {
            Expr::Constant(Value::Integer(_) | Value::Float(_)) => {
                format!("(-({}))", self.visit(operand))
            }
            _ => format!("(-{})", self.visit(operand)),
        })
    }

    // Case

    fn visit_searched_case(
        &mut self,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<String, Infallible> {
        Ok(format!("case{}", self.whens(whens, else_term)))
    }

    fn visit_simple_case(
        &mut self,
        search: &Expr,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<String, Infallible> {
        let search = self.visit(search);
        Ok(format!("case {search}{}", self.whens(whens, else_term)))
    }

    // Collections

    fn visit_any(&mut self, pred: &CollectionPredicate) -> Result<String, Infallible> {
        self.predicate("any", pred)
    }

    fn visit_every(&mut self, pred: &CollectionPredicate) -> Result<String, Infallible> {
        self.predicate("every", pred)
    }

    fn visit_exists(&mut self, operand: &Expr) -> Result<String, Infallible> {
        Ok(format!("(exists {})", self.visit(operand)))
    }

    fn visit_in(&mut self, item: &Expr, collection: &Expr) -> Result<String, Infallible> {
        self.binary(item, "in", collection)
    }

    fn visit_within(&mut self, item: &Expr, collection: &Expr) -> Result<String, Infallible> {
        self.binary(item, "within", collection)
    }

    fn visit_first(&mut self, map: &CollectionMap) -> Result<String, Infallible> {
        self.map("first", map)
    }

    fn visit_array(&mut self, map: &CollectionMap) -> Result<String, Infallible> {
        self.map("array", map)
    }

    // Comparison

    fn visit_between(&mut self, item: &Expr, low: &Expr, high: &Expr) -> Result<String, Infallible> {
        Ok(format!(
            "({} between {} and {})",
            self.visit(item),
            self.visit(low),
            self.visit(high)
        ))
    }

    fn visit_eq(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "=", second)
    }

    fn visit_le(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "<=", second)
    }

    fn visit_lt(&mut self, first: &Expr, second: &Expr) -> Result<String, Infallible> {
        self.binary(first, "<", second)
    }

    fn visit_like(&mut self, first: &Expr, pattern: &Expr) -> Result<String, Infallible> {
        self.binary(first, "like", pattern)
    }

    fn visit_is_missing(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is missing")
    }

    fn visit_is_not_missing(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is not missing")
    }

    fn visit_is_null(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is null")
    }

    fn visit_is_not_null(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is not null")
    }

    fn visit_is_valued(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is valued")
    }

    fn visit_is_not_valued(&mut self, operand: &Expr) -> Result<String, Infallible> {
        self.postfix_test(operand, "is not valued")
    }

    fn visit_concat(&mut self, operands: &[Expr]) -> Result<String, Infallible> {
        self.infix(operands, "||")
    }

    fn visit_constant(&mut self, value: &Value) -> Result<String, Infallible> {
        Ok(constant_text(value))
    }

    fn visit_identifier(&mut self, name: &str) -> Result<String, Infallible> {
        Ok(quote_name(name))
    }

    fn visit_self(&mut self) -> Result<String, Infallible> {
        Ok("self".to_string())
    }

    // Construction

    fn visit_array_construct(&mut self, elements: &[Expr]) -> Result<String, Infallible> {
        Ok(format!("[{}]", self.join(elements, ", ")))
    }

    fn visit_object_construct(&mut self, pairs: &[(String, Expr)]) -> Result<String, Infallible> {
        let parts: Vec<String> = pairs
            .iter()
            .map(|(name, value)| {
                let key = serde_json::Value::String(name.clone()).to_string();
                format!("{key}: {}", self.visit(value))
            })
            .collect();
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    // Logic

    fn visit_and(&mut self, operands: &[Expr]) -> Result<String, Infallible> {
        self.infix(operands, "and")
    }

    fn visit_or(&mut self, operands: &[Expr]) -> Result<String, Infallible> {
        self.infix(operands, "or")
    }

    fn visit_not(&mut self, operand: &Expr) -> Result<String, Infallible> {
        Ok(format!("(not {})", self.visit(operand)))
    }

    // Navigation

    fn visit_element(&mut self, source: &Expr, index: &Expr) -> Result<String, Infallible> {
        Ok(format!("({}[{}])", self.visit(source), self.visit(index)))
    }

    fn visit_field(&mut self, source: &Expr, name: &Expr) -> Result<String, Infallible> {
        let source = self.visit(source);
        Ok(match name {
            Expr::FieldName(name) => format!("({source}.{})", quote_name(name)),
            name => format!("({source}.[{}])", self.visit(name)),
        })
    }

    fn visit_field_name(&mut self, name: &str) -> Result<String, Infallible> {
        Ok(quote_name(name))
    }

    fn visit_slice(
        &mut self,
        source: &Expr,
        start: &Expr,
        end: Option<&Expr>,
    ) -> Result<String, Infallible> {
        let source = self.visit(source);
        let start = self.visit(start);
        let end = end.map(|e| self.visit(e)).unwrap_or_default();
        Ok(format!("({source}[{start}:{end}])"))
    }

    fn visit_function(&mut self, call: &FunctionCall) -> Result<String, Infallible> {
        if call.args.is_empty() && call.is_aggregate() {
            return Ok(format!("{}(*)", call.name));
        }
        Ok(format!("{}({})", call.name, self.join(&call.args, ", ")))
    }

    fn visit_subquery(&mut self, query: &Select) -> Result<String, Infallible> {
        Ok(format!("({})", self.visit_statement(query)))
    }

    // Parameters

    fn visit_named_parameter(&mut self, name: &str) -> Result<String, Infallible> {
        Ok(format!("${name}"))
    }

    fn visit_positional_parameter(&mut self, position: usize) -> Result<String, Infallible> {
        Ok(format!("${position}"))
    }
}

impl NodeVisitor for Stringer {
    type Output = String;
    type Error = Infallible;

    fn visit_select(&mut self, node: &Select) -> Result<String, Infallible> {
        let mut text = node.subselect.accept(self)?;
        if !node.order.is_empty() {
            let terms: Vec<String> = node
                .order
                .iter()
                .map(|term| {
                    let expr = self.visit(&term.expr);
                    if term.descending {
                        format!("{expr} desc")
                    } else {
                        expr
                    }
                })
                .collect();
            text.push_str(&format!(" order by {}", terms.join(", ")));
        }
        if let Some(offset) = &node.offset {
            text.push_str(&format!(" offset {}", self.visit(offset)));
        }
        if let Some(limit) = &node.limit {
            text.push_str(&format!(" limit {}", self.visit(limit)));
        }
        Ok(text)
    }

    fn visit_subselect(&mut self, node: &Subselect) -> Result<String, Infallible> {
        let mut text = String::new();

        if !node.with.is_empty() {
            let parts: Vec<String> = node
                .with
                .iter()
                .map(|b| {
                    let expr = match &b.expr {
                        Expr::Subquery(query) => self.visit_statement(query),
                        expr => self.visit(expr),
                    };
                    format!("{} as ({expr})", quote_name(&b.variable))
                })
                .collect();
            text.push_str(&format!("with {} ", parts.join(", ")));
        }

        text.push_str("select ");
        let projection = &node.projection;
        if projection.distinct {
            text.push_str("distinct ");
        }
        if projection.raw {
            text.push_str("raw ");
        }
        let terms: Vec<String> = projection.terms.iter().map(|t| self.result_term(t)).collect();
        text.push_str(&terms.join(", "));

        if let Some(from) = &node.from {
            text.push_str(&format!(" from {}", from.accept(self)?));
        }
        if !node.let_bindings.is_empty() {
            text.push_str(&format!(" let {}", self.assignments(&node.let_bindings)));
        }
        if let Some(condition) = &node.where_clause {
            text.push_str(&format!(" where {}", self.visit(condition)));
        }
        if let Some(group) = &node.group {
            text.push_str(&format!(" group by {}", self.join(&group.by, ", ")));
            if !group.letting.is_empty() {
                text.push_str(&format!(" letting {}", self.assignments(&group.letting)));
            }
            if let Some(having) = &group.having {
                text.push_str(&format!(" having {}", self.visit(having)));
            }
        }
        Ok(text)
    }

    fn visit_keyspace_term(&mut self, node: &KeyspaceTerm) -> Result<String, Infallible> {
        let mut text = format!(
            "{}:{}",
            quote_name(&node.namespace),
            quote_name(&node.keyspace)
        );
        if let Some(suffix) = node.projection.as_ref().and_then(|p| self.path_suffix(p)) {
            text.push_str(&suffix);
        }
        if !node.alias.is_empty() {
            text.push_str(&format!(" as {}", quote_name(&node.alias)));
        }
        if let Some(keys) = &node.keys {
            text.push_str(&format!(" use keys {}", self.visit(keys)));
        }
        Ok(text)
    }

    fn visit_ansi_join(&mut self, node: &AnsiJoinTerm) -> Result<String, Infallible> {
        let left = node.left.accept(self)?;
        let right = self.visit_keyspace_term(&node.right)?;
        let join = if node.outer { "left outer join" } else { "join" };
        Ok(format!(
            "{left} {join} {right} on {}",
            self.visit(&node.on_clause)
        ))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Stringer::new().visit(self))
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Stringer::new().visit_statement(self))
    }
}

impl fmt::Display for FromTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accept(&mut Stringer::new()) {
            Ok(text) => f.write_str(&text),
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_select};

    fn canonical(text: &str) -> String {
        parse_expression(text).unwrap().to_string()
    }

    #[test]
    fn test_canonical_text() {
        assert_eq!(canonical("a.id = b.aid"), "((`a`.`id`) = (`b`.`aid`))");
        assert_eq!(canonical("self"), "self");
        assert_eq!(canonical("a + b * 2"), "(`a` + (`b` * 2))");
        assert_eq!(canonical("x > 1"), "(1 < `x`)");
        assert_eq!(canonical("`we``ird`"), "`we``ird`");
        assert_eq!(canonical("missing"), "missing");
        assert_eq!(canonical("'it''s'"), "\"it's\"");
        assert_eq!(canonical("-(5)"), "(-(5))");
        assert_eq!(canonical("count(*)"), "count(*)");
        assert_eq!(canonical("$1 || $name"), "($1 || $name)");
    }

    #[test]
    fn test_collection_text() {
        assert_eq!(
            canonical("ANY v IN a SATISFIES v = 1 END"),
            "any `v` in `a` satisfies (`v` = 1) end"
        );
        assert_eq!(
            canonical("ARRAY v.x FOR v WITHIN a WHEN v IS VALUED END"),
            "array (`v`.`x`) for `v` within `a` when (`v` is valued) end"
        );
        assert_eq!(
            canonical("CASE t WHEN 1 THEN 'a' ELSE 'b' END"),
            "case `t` when 1 then \"a\" else \"b\" end"
        );
    }

    #[test]
    fn test_text_reparses_to_same_tree() {
        for text in [
            "a + b + c - d",
            "(a + b) + c",
            "NOT (a = 1) AND b IN [1, 2, 3] OR c LIKE 'x%'",
            "a[1:] || a[0:2] || a.[name]",
            "{\"k\": [1, {\"n\": null}], \"m\": -2.5}",
            "FIRST x FOR x IN xs WHEN x BETWEEN 1 AND 10 END",
            "EVERY x IN xs, y WITHIN ys SATISFIES x < y END",
            "EXISTS (SELECT RAW 1 FROM ks)",
            "-a - -1",
        ] {
            let expr = parse_expression(text).unwrap();
            let reparsed = parse_expression(&expr.to_string()).unwrap();
            assert_eq!(reparsed, expr, "text: {text}");
        }
    }

    #[test]
    fn test_statement_text_reparses() {
        let text = "WITH w AS (SELECT RAW 1) SELECT DISTINCT b.name AS n, l.* \
                    FROM ns:inventory.profile AS b USE KEYS ['k'] \
                    JOIN landmark l ON l.city = b.city \
                    LET x = 1 WHERE x > 0 GROUP BY b.name LETTING c = 2 HAVING c > 1 \
                    ORDER BY n DESC, l.id OFFSET 2 LIMIT 3";
        let select = parse_select(text).unwrap();
        let printed = select.to_string();
        assert_eq!(parse_select(&printed).unwrap(), select, "printed: {printed}");
    }

    #[test]
    fn test_keyspace_projection_text_reparses() {
        for text in [
            "SELECT RAW h FROM hotels.reviews[1:] h",
            "SELECT RAW h FROM hotels.reviews[0:2].ratings h",
            "SELECT RAW h FROM hotels.[`kind`][-1] h",
        ] {
            let select = parse_select(text).unwrap();
            let printed = select.to_string();
            assert_eq!(parse_select(&printed).unwrap(), select, "printed: {printed}");
        }
    }
}

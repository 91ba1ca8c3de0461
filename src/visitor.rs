//! Double-dispatch traversal of expression and statement trees.
//!
//! A node picks the visitor method matching its variant ([`Expr::accept`]);
//! the visitor supplies the behaviour. None of the methods has a default, so a
//! new expression variant does not compile until every visitor handles it.

use crate::ast::{
    AnsiJoinTerm, Binding, CollectionMap, CollectionPredicate, Expr, FromTerm, FunctionCall,
    KeyspaceTerm, Select, Subselect, WhenTerm,
};
use crate::value::Value;

/// One method per [`Expr`] variant.
pub trait Visitor {
    type Output;
    type Error;

    // Arithmetic
    fn visit_add(&mut self, operands: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_sub(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_mult(&mut self, operands: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_div(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_mod(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_neg(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;

    // Case
    fn visit_searched_case(
        &mut self,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_simple_case(
        &mut self,
        search: &Expr,
        whens: &[WhenTerm],
        else_term: Option<&Expr>,
    ) -> Result<Self::Output, Self::Error>;

    // Collections
    fn visit_any(&mut self, pred: &CollectionPredicate) -> Result<Self::Output, Self::Error>;
    fn visit_every(&mut self, pred: &CollectionPredicate) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, item: &Expr, collection: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_within(&mut self, item: &Expr, collection: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_first(&mut self, map: &CollectionMap) -> Result<Self::Output, Self::Error>;
    fn visit_array(&mut self, map: &CollectionMap) -> Result<Self::Output, Self::Error>;

    // Comparison
    fn visit_between(
        &mut self,
        item: &Expr,
        low: &Expr,
        high: &Expr,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_eq(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_le(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_lt(&mut self, first: &Expr, second: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_like(&mut self, first: &Expr, pattern: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_missing(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_not_missing(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_null(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_not_null(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_valued(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_not_valued(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;

    // Concat
    fn visit_concat(&mut self, operands: &[Expr]) -> Result<Self::Output, Self::Error>;

    // Constant
    fn visit_constant(&mut self, value: &Value) -> Result<Self::Output, Self::Error>;

    // Identifier
    fn visit_identifier(&mut self, name: &str) -> Result<Self::Output, Self::Error>;
    fn visit_self(&mut self) -> Result<Self::Output, Self::Error>;

    // Construction
    fn visit_array_construct(&mut self, elements: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_object_construct(
        &mut self,
        pairs: &[(String, Expr)],
    ) -> Result<Self::Output, Self::Error>;

    // Logic
    fn visit_and(&mut self, operands: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, operands: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, operand: &Expr) -> Result<Self::Output, Self::Error>;

    // Navigation
    fn visit_element(&mut self, source: &Expr, index: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, source: &Expr, name: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field_name(&mut self, name: &str) -> Result<Self::Output, Self::Error>;
    fn visit_slice(
        &mut self,
        source: &Expr,
        start: &Expr,
        end: Option<&Expr>,
    ) -> Result<Self::Output, Self::Error>;

    // Function
    fn visit_function(&mut self, call: &FunctionCall) -> Result<Self::Output, Self::Error>;

    // Subquery
    fn visit_subquery(&mut self, query: &Select) -> Result<Self::Output, Self::Error>;

    // Parameters
    fn visit_named_parameter(&mut self, name: &str) -> Result<Self::Output, Self::Error>;
    fn visit_positional_parameter(&mut self, position: usize)
    -> Result<Self::Output, Self::Error>;
}

impl Expr {
    /// Dispatches to the visitor method for this variant.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match self {
            Expr::Add(operands) => visitor.visit_add(operands),
            Expr::Sub(a, b) => visitor.visit_sub(a, b),
            Expr::Mult(operands) => visitor.visit_mult(operands),
            Expr::Div(a, b) => visitor.visit_div(a, b),
            Expr::Mod(a, b) => visitor.visit_mod(a, b),
            Expr::Neg(a) => visitor.visit_neg(a),
            Expr::SearchedCase { whens, else_term } => {
                visitor.visit_searched_case(whens, else_term.as_deref())
            }
            Expr::SimpleCase {
                search,
                whens,
                else_term,
            } => visitor.visit_simple_case(search, whens, else_term.as_deref()),
            Expr::Any(pred) => visitor.visit_any(pred),
            Expr::Every(pred) => visitor.visit_every(pred),
            Expr::Exists(a) => visitor.visit_exists(a),
            Expr::In(a, b) => visitor.visit_in(a, b),
            Expr::Within(a, b) => visitor.visit_within(a, b),
            Expr::First(map) => visitor.visit_first(map),
            Expr::Array(map) => visitor.visit_array(map),
            Expr::Between { item, low, high } => visitor.visit_between(item, low, high),
            Expr::Eq(a, b) => visitor.visit_eq(a, b),
            Expr::LE(a, b) => visitor.visit_le(a, b),
            Expr::LT(a, b) => visitor.visit_lt(a, b),
            Expr::Like(a, b) => visitor.visit_like(a, b),
            Expr::IsMissing(a) => visitor.visit_is_missing(a),
            Expr::IsNotMissing(a) => visitor.visit_is_not_missing(a),
            Expr::IsNull(a) => visitor.visit_is_null(a),
            Expr::IsNotNull(a) => visitor.visit_is_not_null(a),
            Expr::IsValued(a) => visitor.visit_is_valued(a),
            Expr::IsNotValued(a) => visitor.visit_is_not_valued(a),
            Expr::Concat(operands) => visitor.visit_concat(operands),
            Expr::Constant(value) => visitor.visit_constant(value),
            Expr::Identifier(name) => visitor.visit_identifier(name),
            Expr::SelfRef => visitor.visit_self(),
            Expr::ArrayConstruct(elements) => visitor.visit_array_construct(elements),
            Expr::ObjectConstruct(pairs) => visitor.visit_object_construct(pairs),
            Expr::And(operands) => visitor.visit_and(operands),
            Expr::Or(operands) => visitor.visit_or(operands),
            Expr::Not(a) => visitor.visit_not(a),
            Expr::Element(a, b) => visitor.visit_element(a, b),
            Expr::Field(a, b) => visitor.visit_field(a, b),
            Expr::FieldName(name) => visitor.visit_field_name(name),
            Expr::Slice { source, start, end } => {
                visitor.visit_slice(source, start, end.as_deref())
            }
            Expr::Function(call) => visitor.visit_function(call),
            Expr::Subquery(query) => visitor.visit_subquery(query),
            Expr::NamedParameter(name) => visitor.visit_named_parameter(name),
            Expr::PositionalParameter(position) => visitor.visit_positional_parameter(*position),
        }
    }
}

/// Statement-level counterpart of [`Visitor`].
pub trait NodeVisitor {
    type Output;
    type Error;

    fn visit_select(&mut self, node: &Select) -> Result<Self::Output, Self::Error>;
    fn visit_subselect(&mut self, node: &Subselect) -> Result<Self::Output, Self::Error>;
    fn visit_keyspace_term(&mut self, node: &KeyspaceTerm) -> Result<Self::Output, Self::Error>;
    fn visit_ansi_join(&mut self, node: &AnsiJoinTerm) -> Result<Self::Output, Self::Error>;
}

impl Select {
    pub fn accept<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        visitor.visit_select(self)
    }
}

impl Subselect {
    pub fn accept<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        visitor.visit_subselect(self)
    }
}

impl FromTerm {
    pub fn accept<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match self {
            FromTerm::Keyspace(term) => visitor.visit_keyspace_term(term),
            FromTerm::AnsiJoin(join) => visitor.visit_ansi_join(join),
        }
    }
}

/// Runs `visitor` over each binding expression, stopping at the first error.
pub fn map_bindings<V: Visitor + ?Sized>(
    bindings: &[Binding],
    visitor: &mut V,
) -> Result<(), V::Error> {
    for binding in bindings {
        binding.expr.accept(visitor)?;
    }
    Ok(())
}

//! # Abstract Syntax Tree
//!
//! The tree the parser produces and every later stage consumes.
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (arithmetic, comparison, collections,
//!   navigation, construction, logic, functions, parameters, subqueries)
//! - **[query]** - SELECT statements: clauses, FROM terms, keyspace terms
//!
//! ## Example
//!
//! ```text
//! SELECT b.name, ARRAY r.ratings FOR r IN b.reviews END AS ratings
//! FROM `travel-sample`:inventory AS b
//! LEFT JOIN `travel-sample`:landmark AS l ON l.city = b.city
//! WHERE b.type = "hotel" AND ANY r IN b.reviews SATISFIES r.overall > 4 END
//! ```
//!
//! Expressions are immutable once built; traversals (evaluation, printing,
//! semantic checks) are written as [`Visitor`](crate::visitor::Visitor)s.
pub mod expressions;
pub mod query;
pub mod tokens;

pub use expressions::{Binding, CollectionMap, CollectionPredicate, Expr, FunctionCall, WhenTerm};
pub use query::{
    AnsiJoinTerm, DEFAULT_NAMESPACE, FromTerm, Group, KeyspaceTerm, Projection, ResultTerm, Select,
    SortTerm, Subselect,
};
pub use tokens::{Keyword, Token};

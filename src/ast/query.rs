use crate::ast::{Binding, Expr};

/// Namespace used when a keyspace is named without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Complete SELECT statement.
///
/// Ordering and pagination apply to the result of the subselect.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub subselect: Subselect,

    /// ORDER BY terms (empty when absent)
    pub order: Vec<SortTerm>,

    pub offset: Option<Expr>,
    pub limit: Option<Expr>,
}

/// The clauses of a single query block.
///
/// Clauses are listed in the order they take effect: names bound by an
/// earlier clause are visible in the later ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Subselect {
    /// WITH bindings (empty when absent)
    pub with: Vec<Binding>,
    pub from: Option<FromTerm>,
    /// LET bindings (empty when absent)
    pub let_bindings: Vec<Binding>,
    pub where_clause: Option<Expr>,
    pub group: Option<Group>,
    pub projection: Projection,
}

/// GROUP BY clause with its optional LETTING and HAVING.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub by: Vec<Expr>,
    pub letting: Vec<Binding>,
    pub having: Option<Expr>,
}

/// SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub distinct: bool,
    /// `SELECT RAW expr` returns bare values instead of objects
    pub raw: bool,
    pub terms: Vec<ResultTerm>,
}

/// One entry of the SELECT list.
///
/// # Examples
/// ```text
/// *            // expr: None, star: true
/// b.*          // expr: Some(b), star: true
/// b.name AS n  // expr: Some(b.name), alias: Some("n")
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTerm {
    pub expr: Option<Expr>,
    pub star: bool,
    pub alias: Option<String>,
}

impl ResultTerm {
    pub fn new(expr: Expr, alias: Option<String>) -> Self {
        ResultTerm {
            expr: Some(expr),
            star: false,
            alias,
        }
    }

    pub fn star() -> Self {
        ResultTerm {
            expr: None,
            star: true,
            alias: None,
        }
    }
}

/// `expr [ASC|DESC]`
#[derive(Debug, Clone, PartialEq)]
pub struct SortTerm {
    pub expr: Expr,
    pub descending: bool,
}

/// FROM clause: a keyspace, or joins built on top of one.
#[derive(Debug, Clone, PartialEq)]
pub enum FromTerm {
    Keyspace(KeyspaceTerm),
    AnsiJoin(Box<AnsiJoinTerm>),
}

impl FromTerm {
    /// Every keyspace term, left to right.
    pub fn keyspaces(&self) -> Vec<&KeyspaceTerm> {
        match self {
            FromTerm::Keyspace(term) => vec![term],
            FromTerm::AnsiJoin(join) => {
                let mut terms = join.left.keyspaces();
                terms.push(&join.right);
                terms
            }
        }
    }
}

/// `left [LEFT [OUTER] | INNER] JOIN right ON condition`
#[derive(Debug, Clone, PartialEq)]
pub struct AnsiJoinTerm {
    pub left: FromTerm,
    pub right: KeyspaceTerm,
    pub outer: bool,
    pub on_clause: Expr,
}

/// A keyspace reference in a FROM clause.
///
/// This only names the keyspace; resolving it to a handle is up to the
/// [`Datastore`](crate::datastore::Datastore).
///
/// # Example
/// ```text
/// `travel-sample`:inventory AS b USE KEYS ["k1", "k2"]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct KeyspaceTerm {
    pub namespace: String,
    pub keyspace: String,
    /// Path applied to each fetched document (`self` when absent).
    ///
    /// Must be rooted at [`Expr::SelfRef`] and built from `Field`, `Element`
    /// and `Slice` steps, as the parser produces it. Any other shape has no
    /// keyspace syntax and is left out of the statement text.
    pub projection: Option<Expr>,
    /// Explicit alias; empty when none was given
    pub alias: String,
    /// USE KEYS expression
    pub keys: Option<Expr>,
}

impl KeyspaceTerm {
    pub fn new(namespace: impl Into<String>, keyspace: impl Into<String>) -> Self {
        KeyspaceTerm {
            namespace: namespace.into(),
            keyspace: keyspace.into(),
            projection: None,
            alias: String::new(),
            keys: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_projection(mut self, projection: Expr) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_keys(mut self, keys: Expr) -> Self {
        self.keys = Some(keys);
        self
    }

    /// The name documents from this keyspace are bound to.
    pub fn effective_alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.keyspace
        } else {
            &self.alias
        }
    }
}

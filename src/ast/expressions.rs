use crate::ast::Select;
use crate::functions;
use crate::value::Value;

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Trees are built once by the parser (or a planner) and never mutated
/// afterwards, so they can be evaluated from many threads at once. Every
/// traversal goes through [`Expr::accept`](crate::visitor::Visitor).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Arithmetic
    /// Sum of two or more operands (`a + b + c`)
    Add(Vec<Expr>),
    /// Difference (`a - b`)
    Sub(Box<Expr>, Box<Expr>),
    /// Product of two or more operands (`a * b`)
    Mult(Vec<Expr>),
    /// Quotient (`a / b`)
    Div(Box<Expr>, Box<Expr>),
    /// Remainder (`a % b`)
    Mod(Box<Expr>, Box<Expr>),
    /// Negation (`-a`)
    Neg(Box<Expr>),

    // Case
    /// Searched case
    ///
    /// # Example
    /// ```text
    /// CASE WHEN price > 100 THEN "high" ELSE "low" END
    /// ```
    SearchedCase {
        whens: Vec<WhenTerm>,
        else_term: Option<Box<Expr>>,
    },

    /// Simple case, comparing one value against each WHEN
    ///
    /// # Example
    /// ```text
    /// CASE type WHEN "hotel" THEN 1 WHEN "airline" THEN 2 END
    /// ```
    SimpleCase {
        search: Box<Expr>,
        whens: Vec<WhenTerm>,
        else_term: Option<Box<Expr>>,
    },

    // Collections
    /// True if some element satisfies the condition
    ///
    /// # Example
    /// ```text
    /// ANY s IN schedule SATISFIES s.day = 0 END
    /// ```
    Any(Box<CollectionPredicate>),
    /// True if every element satisfies the condition
    Every(Box<CollectionPredicate>),
    /// True if the operand is a non-empty array
    Exists(Box<Expr>),
    /// Membership in an array (`a IN b`)
    In(Box<Expr>, Box<Expr>),
    /// Membership among all nested values (`a WITHIN b`)
    Within(Box<Expr>, Box<Expr>),
    /// First mapped element matching the condition
    ///
    /// # Example
    /// ```text
    /// FIRST r.name FOR r IN reviews WHEN r.rating > 4 END
    /// ```
    First(Box<CollectionMap>),
    /// Array comprehension
    ///
    /// # Example
    /// ```text
    /// ARRAY r.name FOR r IN reviews WHEN r.rating > 4 END
    /// ```
    Array(Box<CollectionMap>),

    // Comparison
    /// `item BETWEEN low AND high`
    Between {
        item: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// `a = b`
    Eq(Box<Expr>, Box<Expr>),
    /// `a <= b` (`b >= a` parses to this as well)
    LE(Box<Expr>, Box<Expr>),
    /// `a < b` (`b > a` parses to this as well)
    LT(Box<Expr>, Box<Expr>),
    /// `a LIKE pattern` with `%` and `_` wildcards
    Like(Box<Expr>, Box<Expr>),
    IsMissing(Box<Expr>),
    IsNotMissing(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    /// Neither null nor missing
    IsValued(Box<Expr>),
    IsNotValued(Box<Expr>),

    /// String concatenation (`a || b`)
    Concat(Vec<Expr>),

    /// Literal value
    Constant(Value),

    /// Name resolved against bound variables, then the current item
    Identifier(String),

    /// The current item itself (`self`)
    SelfRef,

    // Construction
    /// Array literal (`[a, b]`)
    ArrayConstruct(Vec<Expr>),
    /// Object literal (`{"name": a}`)
    ObjectConstruct(Vec<(String, Expr)>),

    // Logic
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),

    // Navigation
    /// Array element (`a[i]`)
    Element(Box<Expr>, Box<Expr>),
    /// Object field (`a.b`, or `a.[expr]` with a computed name)
    Field(Box<Expr>, Box<Expr>),
    /// Field name appearing on the right of a `.`
    FieldName(String),
    /// Array slice (`a[start:end]`, `a[start:]`)
    Slice {
        source: Box<Expr>,
        start: Box<Expr>,
        end: Option<Box<Expr>>,
    },

    /// Function call; the name is stored in lower case
    Function(FunctionCall),

    /// Nested query (`(SELECT ...)`)
    Subquery(Box<Select>),

    // Parameters
    /// `$name`
    NamedParameter(String),
    /// `$1`, `$2`, ...
    PositionalParameter(usize),
}

/// `WHEN condition THEN result` arm of a case expression.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenTerm {
    pub when: Expr,
    pub then: Expr,
}

/// A variable bound to each element of a collection (`v IN expr`), or to every
/// nested value with `descend` (`v WITHIN expr`). LET and WITH clauses reuse it
/// with `descend` unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub variable: String,
    pub expr: Expr,
    pub descend: bool,
}

impl Binding {
    pub fn new(variable: impl Into<String>, expr: Expr) -> Self {
        Binding {
            variable: variable.into(),
            expr,
            descend: false,
        }
    }
}

/// Body of ANY / EVERY.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPredicate {
    pub bindings: Vec<Binding>,
    pub satisfies: Expr,
}

/// Body of ARRAY / FIRST.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMap {
    pub mapping: Expr,
    pub bindings: Vec<Binding>,
    pub when: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}

impl FunctionCall {
    pub fn new(name: &str, args: Vec<Expr>) -> Self {
        FunctionCall {
            name: name.to_ascii_lowercase(),
            args,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        functions::is_aggregate(&self.name)
    }
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    pub fn identifier(name: impl Into<String>) -> Expr {
        Expr::Identifier(name.into())
    }

    /// `operand.name`
    pub fn field(operand: Expr, name: impl Into<String>) -> Expr {
        Expr::Field(Box::new(operand), Box::new(Expr::FieldName(name.into())))
    }

    /// True for expressions that address a location in a document and can
    /// therefore serve as a projection or an assignment target.
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            Expr::Identifier(_)
                | Expr::SelfRef
                | Expr::Field(..)
                | Expr::Element(..)
                | Expr::Slice { .. }
        )
    }

    /// The name a projection of this expression gets when no alias is given.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) => Some(name),
            Expr::Field(_, name) => match name.as_ref() {
                Expr::FieldName(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Direct sub-expressions, in source order. Subquery bodies are not
    /// included; they are reached through the algebra nodes.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Add(operands)
            | Expr::Mult(operands)
            | Expr::Concat(operands)
            | Expr::And(operands)
            | Expr::Or(operands)
            | Expr::ArrayConstruct(operands) => operands.iter().collect(),
            Expr::Sub(a, b)
            | Expr::Div(a, b)
            | Expr::Mod(a, b)
            | Expr::In(a, b)
            | Expr::Within(a, b)
            | Expr::Eq(a, b)
            | Expr::LE(a, b)
            | Expr::LT(a, b)
            | Expr::Like(a, b)
            | Expr::Element(a, b)
            | Expr::Field(a, b) => vec![a.as_ref(), b.as_ref()],
            Expr::Neg(a)
            | Expr::Exists(a)
            | Expr::IsMissing(a)
            | Expr::IsNotMissing(a)
            | Expr::IsNull(a)
            | Expr::IsNotNull(a)
            | Expr::IsValued(a)
            | Expr::IsNotValued(a)
            | Expr::Not(a) => vec![a.as_ref()],
            Expr::SearchedCase { whens, else_term } => {
                let mut children = when_children(whens);
                children.extend(else_term.as_deref());
                children
            }
            Expr::SimpleCase {
                search,
                whens,
                else_term,
            } => {
                let mut children = vec![search.as_ref()];
                children.extend(when_children(whens));
                children.extend(else_term.as_deref());
                children
            }
            Expr::Any(pred) | Expr::Every(pred) => {
                let mut children: Vec<&Expr> = pred.bindings.iter().map(|b| &b.expr).collect();
                children.push(&pred.satisfies);
                children
            }
            Expr::Array(map) | Expr::First(map) => {
                let mut children = vec![&map.mapping];
                children.extend(map.bindings.iter().map(|b| &b.expr));
                children.extend(map.when.as_ref());
                children
            }
            Expr::Between { item, low, high } => vec![item.as_ref(), low.as_ref(), high.as_ref()],
            Expr::Slice { source, start, end } => {
                let mut children = vec![source.as_ref(), start.as_ref()];
                children.extend(end.as_deref());
                children
            }
            Expr::ObjectConstruct(pairs) => pairs.iter().map(|(_, value)| value).collect(),
            Expr::Function(call) => call.args.iter().collect(),
            Expr::Constant(_)
            | Expr::Identifier(_)
            | Expr::SelfRef
            | Expr::FieldName(_)
            | Expr::Subquery(_)
            | Expr::NamedParameter(_)
            | Expr::PositionalParameter(_) => Vec::new(),
        }
    }
}

fn when_children(whens: &[WhenTerm]) -> Vec<&Expr> {
    whens.iter().flat_map(|w| [&w.when, &w.then]).collect()
}

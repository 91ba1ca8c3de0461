use crate::{
    ast::{
        AnsiJoinTerm, Binding, CollectionMap, CollectionPredicate, DEFAULT_NAMESPACE, Expr,
        FromTerm, FunctionCall, Group, Keyword, KeyspaceTerm, Projection, ResultTerm, Select,
        SortTerm, Subselect, Token, WhenTerm,
    },
    lexer::{LexError, Lexer, Position},
    value::Value,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found} at {position}")]
    Unexpected {
        expected: String,
        found: String,
        position: Position,
    },

    #[error("expression nested deeper than {limit} levels at {position}")]
    TooDeep { limit: usize, position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lex(err) => err.position,
            ParseError::Unexpected { position, .. } | ParseError::TooDeep { position, .. } => {
                *position
            }
        }
    }
}

/// Turns expression text back into a tree. Plan decoding goes through this
/// trait so callers can substitute their own dialect.
pub trait ExpressionParser: Send + Sync {
    fn parse_expression(&self, text: &str) -> Result<Expr, ParseError>;
}

/// [`ExpressionParser`] backed by [`Parser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParser;

impl ExpressionParser for DefaultParser {
    fn parse_expression(&self, text: &str) -> Result<Expr, ParseError> {
        parse_expression(text)
    }
}

/// Parses a standalone expression.
pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(text))?.parse()
}

/// Parses a SELECT statement.
pub fn parse_select(text: &str) -> Result<Select, ParseError> {
    Parser::new(Lexer::new(text))?.parse_select()
}

static EOF: Token = Token::Eof;

/// Deepest nesting of parenthesised expressions, subqueries, NOT and
/// unary minus the parser descends into.
pub const MAX_DEPTH: usize = 48;

pub struct Parser {
    tokens: Vec<(Token, Position)>,
    index: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let (token, position) = lexer.next_spanned()?;
            let done = token == Token::Eof;
            tokens.push((token, position));
            if done {
                break;
            }
        }
        Ok(Parser {
            tokens,
            index: 0,
            depth: 0,
        })
    }

    /// Runs `parse` one nesting level down.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                position: self.position(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.index + offset)
            .map(|(token, _)| token)
            .unwrap_or(&EOF)
    }

    fn position(&self) -> Position {
        self.tokens
            .get(self.index)
            .or(self.tokens.last())
            .map(|(_, position)| *position)
            .unwrap_or_default()
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        *self.current() == Token::Keyword(keyword)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::Unexpected {
            expected: expected.into(),
            found: self.current().to_string(),
            position: self.position(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(expected.to_string()));
        }
        self.advance();
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if !self.eat_keyword(keyword) {
            return Err(self.unexpected(format!("keyword {keyword}")));
        }
        Ok(())
    }

    /// Bare or back-quoted name.
    fn parse_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current() {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn check_name(&self) -> bool {
        matches!(
            self.current(),
            Token::Identifier(_) | Token::QuotedIdentifier(_)
        )
    }

    /// Parse primary expressions: literals, names, parameters, constructors,
    /// CASE, collection expressions, function calls and parenthesised terms
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.current().clone() {
            // Literals
            Token::Integer(n) => Expr::constant(n),
            Token::Float(n) => Expr::constant(n),
            Token::String(s) => Expr::constant(s),
            Token::Keyword(Keyword::True) => Expr::constant(true),
            Token::Keyword(Keyword::False) => Expr::constant(false),
            Token::Keyword(Keyword::Null) => Expr::Constant(Value::Null),
            Token::Keyword(Keyword::Missing) => Expr::Constant(Value::Missing),

            // References
            Token::Keyword(Keyword::SelfItem) => Expr::SelfRef,
            Token::NamedParameter(name) => Expr::NamedParameter(name),
            Token::PositionalParameter(position) => Expr::PositionalParameter(position),
            Token::Identifier(name) => {
                self.advance();
                if self.check(&Token::LParen) {
                    return self.parse_function_call(&name);
                }
                return Ok(Expr::Identifier(name));
            }
            Token::QuotedIdentifier(name) => Expr::Identifier(name),

            Token::LParen => {
                self.advance();
                let expr = if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With)
                {
                    Expr::Subquery(Box::new(self.parse_select_statement()?))
                } else {
                    self.parse_expression()?
                };
                self.expect(Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => {
                self.advance();
                return self.parse_array_literal();
            }
            Token::LBrace => {
                self.advance();
                return self.parse_object_literal();
            }

            Token::Keyword(Keyword::Case) => {
                self.advance();
                return self.parse_case();
            }
            Token::Keyword(Keyword::Any | Keyword::Some) => {
                self.advance();
                return Ok(Expr::Any(Box::new(self.parse_collection_predicate()?)));
            }
            Token::Keyword(Keyword::Every) => {
                self.advance();
                return Ok(Expr::Every(Box::new(self.parse_collection_predicate()?)));
            }
            Token::Keyword(Keyword::Array) => {
                self.advance();
                return Ok(Expr::Array(Box::new(self.parse_collection_map()?)));
            }
            Token::Keyword(Keyword::First) => {
                self.advance();
                return Ok(Expr::First(Box::new(self.parse_collection_map()?)));
            }
            Token::Keyword(Keyword::Exists) => {
                self.advance();
                return Ok(Expr::Exists(Box::new(self.parse_unary()?)));
            }

            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_function_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = vec![];

        // COUNT(*) and friends take no operands
        if self.check(&Token::Star) && *self.peek(1) == Token::RParen {
            self.advance();
        } else {
            while !self.check(&Token::RParen) {
                args.push(self.parse_expression()?);
                if !self.check(&Token::RParen) {
                    self.expect(Token::Comma)?;
                }
            }
        }

        self.expect(Token::RParen)?;
        Ok(Expr::Function(FunctionCall::new(name, args)))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let mut pairs = vec![];

        while !self.check(&Token::RBrace) {
            let key = match self.current() {
                Token::String(s) | Token::Identifier(s) | Token::QuotedIdentifier(s) => s.clone(),
                _ => return Err(self.unexpected("string or identifier as object key")),
            };
            self.advance();
            self.expect(Token::Colon)?;

            let value = self.parse_expression()?;
            pairs.push((key, value));

            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expr::ObjectConstruct(pairs))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = vec![];

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Expr::ArrayConstruct(elements))
    }

    /// After CASE: either `WHEN ...` (searched) or `search WHEN ...` (simple)
    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        let search = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        let mut whens = vec![];
        while self.eat_keyword(Keyword::When) {
            let when = self.parse_expression()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expression()?;
            whens.push(WhenTerm { when, then });
        }
        if whens.is_empty() {
            return Err(self.unexpected("keyword WHEN"));
        }

        let else_term = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;

        Ok(match search {
            Some(search) => Expr::SimpleCase {
                search,
                whens,
                else_term,
            },
            None => Expr::SearchedCase { whens, else_term },
        })
    }

    /// `v IN expr` / `v WITHIN expr`, comma separated
    fn parse_collection_bindings(&mut self) -> Result<Vec<Binding>, ParseError> {
        let mut bindings = vec![];
        loop {
            let variable = self.parse_name("binding variable")?;
            let descend = if self.eat_keyword(Keyword::Within) {
                true
            } else {
                self.expect_keyword(Keyword::In)?;
                false
            };
            let expr = self.parse_expression()?;
            bindings.push(Binding {
                variable,
                expr,
                descend,
            });
            if !self.eat(&Token::Comma) {
                return Ok(bindings);
            }
        }
    }

    /// After ANY / EVERY: `bindings SATISFIES condition END`
    fn parse_collection_predicate(&mut self) -> Result<CollectionPredicate, ParseError> {
        let bindings = self.parse_collection_bindings()?;
        self.expect_keyword(Keyword::Satisfies)?;
        let satisfies = self.parse_expression()?;
        self.expect_keyword(Keyword::End)?;
        Ok(CollectionPredicate {
            bindings,
            satisfies,
        })
    }

    /// After ARRAY / FIRST: `mapping FOR bindings [WHEN condition] END`
    fn parse_collection_map(&mut self) -> Result<CollectionMap, ParseError> {
        let mapping = self.parse_expression()?;
        self.expect_keyword(Keyword::For)?;
        let bindings = self.parse_collection_bindings()?;
        let when = if self.eat_keyword(Keyword::When) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(CollectionMap {
            mapping,
            bindings,
            when,
        })
    }

    /// Parse navigation: `.name`, `.[expr]`, `[index]`, `[start:end]`, `[start:]`
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            if self.check(&Token::Dot) {
                match self.peek(1).clone() {
                    // `alias.*` belongs to the projection
                    Token::Star => break,
                    Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                        self.advance();
                        self.advance();
                        expr = Expr::field(expr, name);
                    }
                    Token::LBracket => {
                        self.advance();
                        self.advance();
                        let name = self.parse_expression()?;
                        self.expect(Token::RBracket)?;
                        expr = Expr::Field(Box::new(expr), Box::new(name));
                    }
                    _ => {
                        self.advance();
                        return Err(self.unexpected("field name after '.'"));
                    }
                }
            } else if self.check(&Token::LBracket) {
                self.advance(); // Consume '['
                let start = self.parse_expression()?;

                if self.eat(&Token::Colon) {
                    let end = if self.check(&Token::RBracket) {
                        None
                    } else {
                        Some(Box::new(self.parse_expression()?))
                    };
                    self.expect(Token::RBracket)?;
                    expr = Expr::Slice {
                        source: Box::new(expr),
                        start: Box::new(start),
                        end,
                    };
                } else {
                    self.expect(Token::RBracket)?;
                    expr = Expr::Element(Box::new(expr), Box::new(start));
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            // A signed number literal is a constant, not a negation
            let literal = matches!(self.current(), Token::Integer(_) | Token::Float(_))
                && !matches!(self.peek(1), Token::Dot | Token::LBracket);
            let operand = self.nested(Self::parse_unary)?;
            return Ok(match operand {
                Expr::Constant(Value::Integer(n)) if literal => Expr::constant(-n),
                Expr::Constant(Value::Float(n)) if literal => Expr::constant(-n),
                operand => Expr::Neg(Box::new(operand)),
            });
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        // Only products built by this loop are extended, so `(a * b) * c` keeps its shape
        let mut extend = false;

        loop {
            let token = self.current().clone();
            if !matches!(token, Token::Star | Token::Slash | Token::Percent) {
                break;
            }
            self.advance();
            let right = self.parse_unary()?;

            left = match (token, left) {
                (Token::Star, Expr::Mult(mut operands)) if extend => {
                    operands.push(right);
                    Expr::Mult(operands)
                }
                (Token::Star, left) => {
                    extend = true;
                    Expr::Mult(vec![left, right])
                }
                (Token::Slash, left) => {
                    extend = false;
                    Expr::Div(Box::new(left), Box::new(right))
                }
                (_, left) => {
                    extend = false;
                    Expr::Mod(Box::new(left), Box::new(right))
                }
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut extend = false;

        loop {
            let token = self.current().clone();
            if !matches!(token, Token::Plus | Token::Minus) {
                break;
            }
            self.advance();
            let right = self.parse_multiplicative()?;

            left = match (token, left) {
                (Token::Plus, Expr::Add(mut operands)) if extend => {
                    operands.push(right);
                    Expr::Add(operands)
                }
                (Token::Plus, left) => {
                    extend = true;
                    Expr::Add(vec![left, right])
                }
                (_, left) => {
                    extend = false;
                    Expr::Sub(Box::new(left), Box::new(right))
                }
            };
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_additive()?;
        if !self.check(&Token::Concat) {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.eat(&Token::Concat) {
            operands.push(self.parse_additive()?);
        }
        Ok(Expr::Concat(operands))
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_concat()?;

        let expr = match self.current() {
            Token::Eq => {
                self.advance();
                Expr::Eq(Box::new(left), Box::new(self.parse_concat()?))
            }
            Token::NotEq => {
                self.advance();
                let right = self.parse_concat()?;
                Expr::Not(Box::new(Expr::Eq(Box::new(left), Box::new(right))))
            }
            Token::Lt => {
                self.advance();
                Expr::LT(Box::new(left), Box::new(self.parse_concat()?))
            }
            Token::LtEq => {
                self.advance();
                Expr::LE(Box::new(left), Box::new(self.parse_concat()?))
            }
            // `a > b` is `b < a`
            Token::Gt => {
                self.advance();
                Expr::LT(Box::new(self.parse_concat()?), Box::new(left))
            }
            Token::GtEq => {
                self.advance();
                Expr::LE(Box::new(self.parse_concat()?), Box::new(left))
            }
            Token::Keyword(Keyword::Is) => {
                self.advance();
                let negated = self.eat_keyword(Keyword::Not);
                let keyword = match self.current() {
                    Token::Keyword(
                        keyword @ (Keyword::Null | Keyword::Missing | Keyword::Valued),
                    ) => *keyword,
                    _ => return Err(self.unexpected("NULL, MISSING or VALUED")),
                };
                self.advance();

                let operand = Box::new(left);
                match (keyword, negated) {
                    (Keyword::Null, false) => Expr::IsNull(operand),
                    (Keyword::Null, true) => Expr::IsNotNull(operand),
                    (Keyword::Missing, false) => Expr::IsMissing(operand),
                    (Keyword::Missing, true) => Expr::IsNotMissing(operand),
                    (_, false) => Expr::IsValued(operand),
                    (_, true) => Expr::IsNotValued(operand),
                }
            }
            Token::Keyword(Keyword::Not)
                if matches!(
                    self.peek(1),
                    Token::Keyword(Keyword::Between | Keyword::Like | Keyword::In | Keyword::Within)
                ) =>
            {
                self.advance();
                Expr::Not(Box::new(self.parse_membership(left)?))
            }
            Token::Keyword(Keyword::Between | Keyword::Like | Keyword::In | Keyword::Within) => {
                self.parse_membership(left)?
            }
            _ => left,
        };
        Ok(expr)
    }

    /// BETWEEN, LIKE, IN or WITHIN with `left` as the first operand.
    fn parse_membership(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let keyword = match self.current() {
            Token::Keyword(keyword) => *keyword,
            _ => return Err(self.unexpected("BETWEEN, LIKE, IN or WITHIN")),
        };
        self.advance();
        let left = Box::new(left);

        Ok(match keyword {
            Keyword::Between => {
                let low = self.parse_concat()?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_concat()?;
                Expr::Between {
                    item: left,
                    low: Box::new(low),
                    high: Box::new(high),
                }
            }
            Keyword::Like => Expr::Like(left, Box::new(self.parse_concat()?)),
            Keyword::In => Expr::In(left, Box::new(self.parse_concat()?)),
            Keyword::Within => Expr::Within(left, Box::new(self.parse_concat()?)),
            _ => return Err(self.unexpected("BETWEEN, LIKE, IN or WITHIN")),
        })
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Expr::Not(Box::new(self.nested(Self::parse_not)?)));
        }
        self.parse_comparison()
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_not()?;
        if !self.check_keyword(Keyword::And) {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.eat_keyword(Keyword::And) {
            operands.push(self.parse_not()?);
        }
        Ok(Expr::And(operands))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_and()?;
        if !self.check_keyword(Keyword::Or) {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.eat_keyword(Keyword::Or) {
            operands.push(self.parse_and()?);
        }
        Ok(Expr::Or(operands))
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_or)
    }

    /// Parse a complete expression; trailing input is an error
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(expr)
    }
}

impl Parser {
    /// Parse a complete SELECT statement; trailing input is an error
    pub fn parse_select(&mut self) -> Result<Select, ParseError> {
        let select = self.parse_select_statement()?;
        self.expect(Token::Eof)?;
        Ok(select)
    }

    fn parse_select_statement(&mut self) -> Result<Select, ParseError> {
        let with = if self.eat_keyword(Keyword::With) {
            self.parse_with_bindings()?
        } else {
            vec![]
        };

        self.expect_keyword(Keyword::Select)?;
        let projection = self.parse_projection()?;

        let from = if self.eat_keyword(Keyword::From) {
            Some(self.parse_from_term()?)
        } else {
            None
        };

        let let_bindings = if self.eat_keyword(Keyword::Let) {
            self.parse_let_bindings()?
        } else {
            vec![]
        };

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group = if self.eat_keyword(Keyword::Group) {
            Some(self.parse_group()?)
        } else {
            None
        };

        let mut order = vec![];
        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let expr = self.parse_expression()?;
                let descending = if self.eat_keyword(Keyword::Desc) {
                    true
                } else {
                    self.eat_keyword(Keyword::Asc);
                    false
                };
                order.push(SortTerm { expr, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        // OFFSET and LIMIT may come in either order
        let mut offset = None;
        let mut limit = None;
        loop {
            if offset.is_none() && self.eat_keyword(Keyword::Offset) {
                offset = Some(self.parse_expression()?);
            } else if limit.is_none() && self.eat_keyword(Keyword::Limit) {
                limit = Some(self.parse_expression()?);
            } else {
                break;
            }
        }

        Ok(Select {
            subselect: Subselect {
                with,
                from,
                let_bindings,
                where_clause,
                group,
                projection,
            },
            order,
            offset,
            limit,
        })
    }

    /// `v AS (expr), ...`
    fn parse_with_bindings(&mut self) -> Result<Vec<Binding>, ParseError> {
        let mut bindings = vec![];
        loop {
            let variable = self.parse_name("WITH alias")?;
            self.expect_keyword(Keyword::As)?;
            self.expect(Token::LParen)?;
            let expr = if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With)
            {
                Expr::Subquery(Box::new(self.parse_select_statement()?))
            } else {
                self.parse_expression()?
            };
            self.expect(Token::RParen)?;
            bindings.push(Binding::new(variable, expr));
            if !self.eat(&Token::Comma) {
                return Ok(bindings);
            }
        }
    }

    /// `v = expr, ...`
    fn parse_let_bindings(&mut self) -> Result<Vec<Binding>, ParseError> {
        let mut bindings = vec![];
        loop {
            let variable = self.parse_name("variable name")?;
            self.expect(Token::Eq)?;
            let expr = self.parse_expression()?;
            bindings.push(Binding::new(variable, expr));
            if !self.eat(&Token::Comma) {
                return Ok(bindings);
            }
        }
    }

    fn parse_group(&mut self) -> Result<Group, ParseError> {
        self.expect_keyword(Keyword::By)?;
        let mut by = vec![self.parse_expression()?];
        while self.eat(&Token::Comma) {
            by.push(self.parse_expression()?);
        }

        let letting = if self.eat_keyword(Keyword::Letting) {
            self.parse_let_bindings()?
        } else {
            vec![]
        };
        let having = if self.eat_keyword(Keyword::Having) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Group {
            by,
            letting,
            having,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection, ParseError> {
        let distinct = self.eat_keyword(Keyword::Distinct);

        if self.eat_keyword(Keyword::Raw) {
            let expr = self.parse_expression()?;
            return Ok(Projection {
                distinct,
                raw: true,
                terms: vec![ResultTerm::new(expr, None)],
            });
        }

        let mut terms = vec![self.parse_result_term()?];
        while self.eat(&Token::Comma) {
            terms.push(self.parse_result_term()?);
        }
        Ok(Projection {
            distinct,
            raw: false,
            terms,
        })
    }

    fn parse_result_term(&mut self) -> Result<ResultTerm, ParseError> {
        if self.eat(&Token::Star) {
            return Ok(ResultTerm::star());
        }

        let expr = self.parse_expression()?;
        if self.check(&Token::Dot) && *self.peek(1) == Token::Star {
            self.advance();
            self.advance();
            return Ok(ResultTerm {
                expr: Some(expr),
                star: true,
                alias: None,
            });
        }

        let alias = self.parse_alias()?;
        Ok(ResultTerm::new(expr, alias))
    }

    /// `[AS] name`
    fn parse_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_keyword(Keyword::As) {
            return self.parse_name("alias").map(Some);
        }
        if self.check_name() {
            return self.parse_name("alias").map(Some);
        }
        Ok(None)
    }

    fn parse_from_term(&mut self) -> Result<FromTerm, ParseError> {
        let mut term = FromTerm::Keyspace(self.parse_keyspace_term()?);

        loop {
            let outer = match self.current() {
                Token::Keyword(Keyword::Left) => {
                    self.advance();
                    self.eat_keyword(Keyword::Outer);
                    true
                }
                Token::Keyword(Keyword::Inner) => {
                    self.advance();
                    false
                }
                Token::Keyword(Keyword::Join) => false,
                _ => break,
            };
            self.expect_keyword(Keyword::Join)?;

            let right = self.parse_keyspace_term()?;
            self.expect_keyword(Keyword::On)?;
            let on_clause = self.parse_expression()?;

            term = FromTerm::AnsiJoin(Box::new(AnsiJoinTerm {
                left: term,
                right,
                outer,
                on_clause,
            }));
        }
        Ok(term)
    }

    /// `[namespace:]keyspace[.path] [[AS] alias] [USE KEYS expr]`
    fn parse_keyspace_term(&mut self) -> Result<KeyspaceTerm, ParseError> {
        let first = self.parse_name("keyspace name")?;
        let mut term = if self.eat(&Token::Colon) {
            let keyspace = self.parse_name("keyspace name")?;
            KeyspaceTerm::new(first, keyspace)
        } else {
            KeyspaceTerm::new(DEFAULT_NAMESPACE, first)
        };

        if self.check(&Token::Dot) || self.check(&Token::LBracket) {
            term.projection = Some(self.parse_postfix(Expr::SelfRef)?);
        }

        if let Some(alias) = self.parse_alias()? {
            term.alias = alias;
        }

        if self.eat_keyword(Keyword::Use) {
            self.expect_keyword(Keyword::Keys)?;
            term.keys = Some(self.parse_expression()?);
        }
        Ok(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::identifier(name)
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + b * c = d OR NOT e AND f").unwrap();
        assert_eq!(
            expr,
            Expr::Or(vec![
                Expr::Eq(
                    Box::new(Expr::Add(vec![
                        ident("a"),
                        Expr::Mult(vec![ident("b"), ident("c")]),
                    ])),
                    Box::new(ident("d")),
                ),
                Expr::And(vec![Expr::Not(Box::new(ident("e"))), ident("f")]),
            ])
        );
    }

    #[test]
    fn test_parenthesised_sum_stays_nested() {
        let flat = parse_expression("a + b + c").unwrap();
        assert_eq!(flat, Expr::Add(vec![ident("a"), ident("b"), ident("c")]));

        let nested = parse_expression("(a + b) + c").unwrap();
        assert_eq!(
            nested,
            Expr::Add(vec![Expr::Add(vec![ident("a"), ident("b")]), ident("c")])
        );
    }

    #[test]
    fn test_greater_than_swaps_operands() {
        assert_eq!(
            parse_expression("a > 1").unwrap(),
            Expr::LT(Box::new(Expr::constant(1)), Box::new(ident("a")))
        );
        assert_eq!(
            parse_expression("a != 1").unwrap(),
            Expr::Not(Box::new(Expr::Eq(
                Box::new(ident("a")),
                Box::new(Expr::constant(1))
            )))
        );
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(parse_expression("-5").unwrap(), Expr::constant(-5));
        assert_eq!(
            parse_expression("-(5)").unwrap(),
            Expr::Neg(Box::new(Expr::constant(5)))
        );
        assert_eq!(
            parse_expression("a - -1.5").unwrap(),
            Expr::Sub(Box::new(ident("a")), Box::new(Expr::constant(-1.5)))
        );
    }

    #[test]
    fn test_navigation() {
        assert_eq!(
            parse_expression("a.b[0][1:]").unwrap(),
            Expr::Slice {
                source: Box::new(Expr::Element(
                    Box::new(Expr::field(ident("a"), "b")),
                    Box::new(Expr::constant(0)),
                )),
                start: Box::new(Expr::constant(1)),
                end: None,
            }
        );
        assert_eq!(
            parse_expression("a.[n]").unwrap(),
            Expr::Field(Box::new(ident("a")), Box::new(ident("n")))
        );
    }

    #[test]
    fn test_is_and_not_between() {
        assert_eq!(
            parse_expression("a IS NOT MISSING").unwrap(),
            Expr::IsNotMissing(Box::new(ident("a")))
        );
        assert_eq!(
            parse_expression("a NOT BETWEEN 1 AND 2 AND b").unwrap(),
            Expr::And(vec![
                Expr::Not(Box::new(Expr::Between {
                    item: Box::new(ident("a")),
                    low: Box::new(Expr::constant(1)),
                    high: Box::new(Expr::constant(2)),
                })),
                ident("b"),
            ])
        );
    }

    #[test]
    fn test_collections() {
        let expr = parse_expression("ANY r IN reviews SATISFIES r.rating > 4 END").unwrap();
        match expr {
            Expr::Any(pred) => {
                assert_eq!(pred.bindings, vec![Binding::new("r", ident("reviews"))]);
            }
            other => panic!("expected ANY, got {other:?}"),
        }

        let expr = parse_expression("ARRAY v FOR v WITHIN doc WHEN v > 0 END").unwrap();
        match expr {
            Expr::Array(map) => {
                assert!(map.bindings[0].descend);
                assert!(map.when.is_some());
            }
            other => panic!("expected ARRAY, got {other:?}"),
        }
    }

    #[test]
    fn test_function_names_are_lowercased() {
        assert_eq!(
            parse_expression("LOWER(name)").unwrap(),
            Expr::Function(FunctionCall::new("lower", vec![ident("name")]))
        );
        assert_eq!(
            parse_expression("COUNT(*)").unwrap(),
            Expr::Function(FunctionCall::new("count", vec![]))
        );
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        let err = parse_expression("a b").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { .. }));
        assert_eq!(err.position().offset, 2);
    }

    #[test]
    fn test_select_with_join() {
        let select = parse_select(
            "SELECT b.name, l.* FROM `travel-sample`:inventory b \
             LEFT OUTER JOIN landmark AS l ON l.city = b.city \
             WHERE b.type = 'hotel' ORDER BY b.name DESC LIMIT 5 OFFSET 1",
        )
        .unwrap();

        let from = select.subselect.from.as_ref().unwrap();
        let keyspaces = from.keyspaces();
        assert_eq!(keyspaces[0].namespace, "travel-sample");
        assert_eq!(keyspaces[0].alias, "b");
        assert_eq!(keyspaces[1].namespace, DEFAULT_NAMESPACE);
        assert!(matches!(from, FromTerm::AnsiJoin(join) if join.outer));

        assert_eq!(select.subselect.projection.terms.len(), 2);
        assert!(select.subselect.projection.terms[1].star);
        assert!(select.order[0].descending);
        assert_eq!(select.limit, Some(Expr::constant(5)));
        assert_eq!(select.offset, Some(Expr::constant(1)));
    }

    #[test]
    fn test_subquery_and_raw() {
        let expr = parse_expression("(SELECT RAW x FROM ks USE KEYS [\"k1\"])").unwrap();
        match expr {
            Expr::Subquery(select) => {
                assert!(select.subselect.projection.raw);
                let from = select.subselect.from.unwrap();
                assert!(from.keyspaces()[0].keys.is_some());
            }
            other => panic!("expected subquery, got {other:?}"),
        }
    }
}

use std::fmt;

/// Reserved words. Matched case-insensitively; a reserved word can still be
/// used as a name by back-quoting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Any,
    Array,
    As,
    Asc,
    Between,
    By,
    Case,
    Desc,
    Distinct,
    Else,
    End,
    Every,
    Exists,
    False,
    First,
    For,
    From,
    Group,
    Having,
    In,
    Inner,
    Is,
    Join,
    Keys,
    Left,
    Let,
    Letting,
    Like,
    Limit,
    Missing,
    Not,
    Null,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Raw,
    Satisfies,
    Select,
    SelfItem,
    Some,
    Then,
    True,
    Use,
    Valued,
    When,
    Where,
    With,
    Within,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        let keyword = match ident.to_ascii_lowercase().as_str() {
            "and" => Keyword::And,
            "any" => Keyword::Any,
            "array" => Keyword::Array,
            "as" => Keyword::As,
            "asc" => Keyword::Asc,
            "between" => Keyword::Between,
            "by" => Keyword::By,
            "case" => Keyword::Case,
            "desc" => Keyword::Desc,
            "distinct" => Keyword::Distinct,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "every" => Keyword::Every,
            "exists" => Keyword::Exists,
            "false" => Keyword::False,
            "first" => Keyword::First,
            "for" => Keyword::For,
            "from" => Keyword::From,
            "group" => Keyword::Group,
            "having" => Keyword::Having,
            "in" => Keyword::In,
            "inner" => Keyword::Inner,
            "is" => Keyword::Is,
            "join" => Keyword::Join,
            "keys" => Keyword::Keys,
            "left" => Keyword::Left,
            "let" => Keyword::Let,
            "letting" => Keyword::Letting,
            "like" => Keyword::Like,
            "limit" => Keyword::Limit,
            "missing" => Keyword::Missing,
            "not" => Keyword::Not,
            "null" => Keyword::Null,
            "offset" => Keyword::Offset,
            "on" => Keyword::On,
            "or" => Keyword::Or,
            "order" => Keyword::Order,
            "outer" => Keyword::Outer,
            "raw" => Keyword::Raw,
            "satisfies" => Keyword::Satisfies,
            "select" => Keyword::Select,
            "self" => Keyword::SelfItem,
            "some" => Keyword::Some,
            "then" => Keyword::Then,
            "true" => Keyword::True,
            "use" => Keyword::Use,
            "valued" => Keyword::Valued,
            "when" => Keyword::When,
            "where" => Keyword::Where,
            "with" => Keyword::With,
            "within" => Keyword::Within,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::And => "AND",
            Keyword::Any => "ANY",
            Keyword::Array => "ARRAY",
            Keyword::As => "AS",
            Keyword::Asc => "ASC",
            Keyword::Between => "BETWEEN",
            Keyword::By => "BY",
            Keyword::Case => "CASE",
            Keyword::Desc => "DESC",
            Keyword::Distinct => "DISTINCT",
            Keyword::Else => "ELSE",
            Keyword::End => "END",
            Keyword::Every => "EVERY",
            Keyword::Exists => "EXISTS",
            Keyword::False => "FALSE",
            Keyword::First => "FIRST",
            Keyword::For => "FOR",
            Keyword::From => "FROM",
            Keyword::Group => "GROUP",
            Keyword::Having => "HAVING",
            Keyword::In => "IN",
            Keyword::Inner => "INNER",
            Keyword::Is => "IS",
            Keyword::Join => "JOIN",
            Keyword::Keys => "KEYS",
            Keyword::Left => "LEFT",
            Keyword::Let => "LET",
            Keyword::Letting => "LETTING",
            Keyword::Like => "LIKE",
            Keyword::Limit => "LIMIT",
            Keyword::Missing => "MISSING",
            Keyword::Not => "NOT",
            Keyword::Null => "NULL",
            Keyword::Offset => "OFFSET",
            Keyword::On => "ON",
            Keyword::Or => "OR",
            Keyword::Order => "ORDER",
            Keyword::Outer => "OUTER",
            Keyword::Raw => "RAW",
            Keyword::Satisfies => "SATISFIES",
            Keyword::Select => "SELECT",
            Keyword::SelfItem => "SELF",
            Keyword::Some => "SOME",
            Keyword::Then => "THEN",
            Keyword::True => "TRUE",
            Keyword::Use => "USE",
            Keyword::Valued => "VALUED",
            Keyword::When => "WHEN",
            Keyword::Where => "WHERE",
            Keyword::With => "WITH",
            Keyword::Within => "WITHIN",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Floating-point number, with a fraction or an exponent
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e10
    /// ```
    Float(f64),

    /// String literal in double or single quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'it''s'
    /// ```
    String(String),

    // Names
    /// Bare name: letter or underscore, then letters, digits or underscores
    Identifier(String),

    /// Back-quoted name; may contain any character (a back-quote is doubled)
    ///
    /// # Examples
    /// ```text
    /// `travel-sample`
    /// `select`
    /// ```
    QuotedIdentifier(String),

    /// Reserved word
    Keyword(Keyword),

    /// Named parameter (`$name`)
    NamedParameter(String),

    /// Positional parameter (`$1`, `$2`, ...)
    PositionalParameter(usize),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `||`
    Concat,
    /// `=` or `==`
    Eq,
    /// `!=` or `<>`
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Delimiters
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::String(s) => write!(f, "string {s:?}"),
            Token::Identifier(name) => write!(f, "identifier '{name}'"),
            Token::QuotedIdentifier(name) => write!(f, "identifier `{name}`"),
            Token::Keyword(keyword) => write!(f, "keyword {keyword}"),
            Token::NamedParameter(name) => write!(f, "${name}"),
            Token::PositionalParameter(position) => write!(f, "${position}"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::Concat => f.write_str("'||'"),
            Token::Eq => f.write_str("'='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::LtEq => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::GtEq => f.write_str("'>='"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
            Token::Colon => f.write_str("':'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

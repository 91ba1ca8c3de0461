use crate::ast::{Keyword, Token};
use std::fmt;
use thiserror::Error;

/// Location of a character in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Character offset from the start of the input
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {position}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Position of the next unread character.
    pub fn position(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.current_char() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            position: self.position(),
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => self.advance(),
                // -- line comment
                Some('-') if self.peek_char(1) == Some('-') => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a quoted run up to the matching `quote`. A doubled quote stands
    /// for itself; backslash escapes apply to strings but not to back-quoted
    /// identifiers.
    fn read_quoted(&mut self, quote: char, escapes: bool) -> Result<String, LexError> {
        let start = self.position();
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    if self.peek_char(1) == Some(quote) {
                        result.push(quote);
                        self.advance();
                        self.advance();
                        continue;
                    }
                    self.advance();
                    return Ok(result);
                }
                '\\' if escapes => {
                    self.advance(); // Consume backslash
                    let escaped = match self.current_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('/') => '/',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('`') => '`',
                        Some('\\') => '\\',
                        Some('u') => {
                            self.advance();
                            result.push(self.read_unicode_escape()?);
                            continue;
                        }
                        Some(other) => {
                            return Err(self.error(format!("invalid escape sequence '\\{other}'")));
                        }
                        None => break,
                    };
                    result.push(escaped);
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: format!("unterminated literal, missing closing {quote}"),
            position: start,
        })
    }

    /// Reads the four hex digits after `\u`, combining surrogate pairs.
    fn read_unicode_escape(&mut self) -> Result<char, LexError> {
        let high = self.read_hex4()?;
        if (0xD800..0xDC00).contains(&high)
            && self.current_char() == Some('\\')
            && self.peek_char(1) == Some('u')
        {
            self.advance();
            self.advance();
            let low = self.read_hex4()?;
            if (0xDC00..0xE000).contains(&low) {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"));
            }
            return Err(self.error("invalid surrogate pair"));
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn read_hex4(&mut self) -> Result<u32, LexError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .current_char()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("expected four hex digits after \\u"))?;
            code = code * 16 + digit;
            self.advance();
        }
        Ok(code)
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                number.push('e');
                self.advance();
                if signed {
                    number.extend(self.current_char());
                    self.advance();
                }
                while let Some(ch) = self.current_char() {
                    if !ch.is_ascii_digit() {
                        break;
                    }
                    number.push(ch);
                    self.advance();
                }
            }
        }

        if !is_float && let Ok(n) = number.parse::<i64>() {
            return Ok(Token::Integer(n));
        }
        // Integers beyond i64 fall back to float
        number
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(format!("invalid number '{number}'")))
    }

    fn read_parameter(&mut self) -> Result<Token, LexError> {
        self.advance(); // Consume '$'
        match self.current_char() {
            Some(ch) if ch.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(ch) = self.current_char() {
                    if !ch.is_ascii_digit() {
                        break;
                    }
                    digits.push(ch);
                    self.advance();
                }
                match digits.parse::<usize>() {
                    Ok(position) if position > 0 => Ok(Token::PositionalParameter(position)),
                    _ => Err(self.error(format!("invalid positional parameter '${digits}'"))),
                }
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                Ok(Token::NamedParameter(self.read_identifier()))
            }
            _ => Err(self.error("expected a parameter name after '$'")),
        }
    }

    /// Consumes one or two characters and returns `token`.
    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('$') => self.read_parameter(),
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.double(Token::Concat)
                } else {
                    Err(self.error("unexpected '|' (did you mean '||'?)"))
                }
            }
            Some('.') => {
                if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.read_fraction()
                } else {
                    self.single(Token::Dot)
                }
            }
            Some(',') => self.single(Token::Comma),
            Some(':') => self.single(Token::Colon),
            Some('+') => self.single(Token::Plus),
            Some('-') => self.single(Token::Minus),
            Some('*') => self.single(Token::Star),
            Some('/') => self.single(Token::Slash),
            Some('%') => self.single(Token::Percent),
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::Eq)
                } else {
                    self.single(Token::Eq)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::NotEq)
                } else {
                    Err(self.error("unexpected '!' (did you mean '!='?)"))
                }
            }
            Some('<') => match self.peek_char(1) {
                Some('=') => self.double(Token::LtEq),
                Some('>') => self.double(Token::NotEq),
                _ => self.single(Token::Lt),
            },
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::GtEq)
                } else {
                    self.single(Token::Gt)
                }
            }
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('[') => self.single(Token::LBracket),
            Some(']') => self.single(Token::RBracket),
            Some('{') => self.single(Token::LBrace),
            Some('}') => self.single(Token::RBrace),
            Some('"') => self.read_quoted('"', true).map(Token::String),
            Some('\'') => self.read_quoted('\'', true).map(Token::String),
            Some('`') => self
                .read_quoted('`', false)
                .map(Token::QuotedIdentifier),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                Ok(match Keyword::from_ident(&ident) {
                    Some(keyword) => Token::Keyword(keyword),
                    None => Token::Identifier(ident),
                })
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(self.error(format!("unexpected character '{ch}'"))),
        }
    }

    /// Number written with a leading dot (`.5`).
    fn read_fraction(&mut self) -> Result<Token, LexError> {
        self.advance(); // Consume '.'
        let mut number = String::from("0.");
        while let Some(ch) = self.current_char() {
            if !ch.is_ascii_digit() {
                break;
            }
            number.push(ch);
            self.advance();
        }
        number
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(format!("invalid number '{number}'")))
    }

    /// Next token together with the position it starts at.
    pub fn next_spanned(&mut self) -> Result<(Token, Position), LexError> {
        self.skip_whitespace();
        let start = self.position();
        let token = self.next_token()?;
        Ok((token, start))
    }

    /// Tokenizes the whole input, ending with [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_keywords_any_case() {
        assert_eq!(
            tokens("select Missing NULL self"),
            vec![
                Token::Keyword(Keyword::Select),
                Token::Keyword(Keyword::Missing),
                Token::Keyword(Keyword::Null),
                Token::Keyword(Keyword::SelfItem),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("= == != <> < <= > >= ||"),
            vec![
                Token::Eq,
                Token::Eq,
                Token::NotEq,
                Token::NotEq,
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
                Token::Concat,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 3.5 1e3 2.5E-1 .5"),
            vec![
                Token::Integer(42),
                Token::Float(3.5),
                Token::Float(1000.0),
                Token::Float(0.25),
                Token::Float(0.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_overflow_becomes_float() {
        assert_eq!(
            tokens("99999999999999999999"),
            vec![Token::Float(1e20), Token::Eof]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            tokens(r#""a\"b" 'it''s' "é\n""#),
            vec![
                Token::String("a\"b".to_string()),
                Token::String("it's".to_string()),
                Token::String("é\n".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(
            tokens("`travel-sample`:`a``b`"),
            vec![
                Token::QuotedIdentifier("travel-sample".to_string()),
                Token::Colon,
                Token::QuotedIdentifier("a`b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_parameters() {
        assert_eq!(
            tokens("$name $1 $12"),
            vec![
                Token::NamedParameter("name".to_string()),
                Token::PositionalParameter(1),
                Token::PositionalParameter(12),
                Token::Eof,
            ]
        );
        assert!(Lexer::new("$0").tokenize().is_err());
        assert!(Lexer::new("$").tokenize().is_err());
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(
            tokens("a -- trailing\n- b"),
            vec![
                Token::Identifier("a".to_string()),
                Token::Minus,
                Token::Identifier("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_error_position() {
        let err = Lexer::new("a +\n  #").tokenize().unwrap_err();
        assert_eq!(err.position.line, 2);
        assert_eq!(err.position.column, 3);
        assert_eq!(err.position.offset, 6);
        assert!(err.to_string().contains("unexpected character '#'"));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.position.offset, 0);
    }
}

// tests/parser_tests.rs

use docql::ast::{Expr, FromTerm, Keyword, Token};
use docql::lexer::Lexer;
use docql::parser::{MAX_DEPTH, ParseError, parse_expression, parse_select};
use docql::value::Value;

// ============================================================================
// Lexer
// ============================================================================

#[test]
fn test_tokens() {
    let tokens = Lexer::new("SELECT a.b, `x y` FROM ks WHERE c >= 1.5 || $name").tokenize().unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Keyword(Keyword::Select),
            Token::Identifier("a".into()),
            Token::Dot,
            Token::Identifier("b".into()),
            Token::Comma,
            Token::QuotedIdentifier("x y".into()),
            Token::Keyword(Keyword::From),
            Token::Identifier("ks".into()),
            Token::Keyword(Keyword::Where),
            Token::Identifier("c".into()),
            Token::GtEq,
            Token::Float(1.5),
            Token::Concat,
            Token::NamedParameter("name".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_keywords_are_case_insensitive() {
    let tokens = Lexer::new("select Select SELECT").tokenize().unwrap();
    assert!(tokens[..3].iter().all(|t| *t == Token::Keyword(Keyword::Select)));
}

#[test]
fn test_string_escapes() {
    let tokens = Lexer::new(r#"'it''s' "a\"b" "é" `a``b`"#).tokenize().unwrap();
    assert_eq!(tokens[0], Token::String("it's".into()));
    assert_eq!(tokens[1], Token::String("a\"b".into()));
    assert_eq!(tokens[2], Token::String("é".into()));
    assert_eq!(tokens[3], Token::QuotedIdentifier("a`b".into()));
}

#[test]
fn test_numbers() {
    let tokens = Lexer::new("42 .5 1e3 2.5E-1 99999999999999999999").tokenize().unwrap();
    assert_eq!(tokens[0], Token::Integer(42));
    assert_eq!(tokens[1], Token::Float(0.5));
    assert_eq!(tokens[2], Token::Float(1000.0));
    assert_eq!(tokens[3], Token::Float(0.25));
    assert!(matches!(tokens[4], Token::Float(_)));
}

#[test]
fn test_comments_and_positions() {
    let mut lexer = Lexer::new("-- leading comment\n  a");
    let (token, position) = lexer.next_spanned().unwrap();
    assert_eq!(token, Token::Identifier("a".into()));
    assert_eq!(position.line, 2);
    assert_eq!(position.column, 3);
}

#[test]
fn test_lex_errors() {
    assert!(Lexer::new("'unterminated").tokenize().is_err());
    assert!(Lexer::new("a | b").tokenize().is_err());
    assert!(Lexer::new("$0").tokenize().is_err());
    assert!(Lexer::new("#").tokenize().is_err());
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_parameters() {
    assert_eq!(parse_expression("$1").unwrap(), Expr::PositionalParameter(1));
    assert_eq!(
        parse_expression("$city").unwrap(),
        Expr::NamedParameter("city".to_string())
    );
}

#[test]
fn test_navigation() {
    let expr = parse_expression("a.b[0].c[1:]").unwrap();
    assert!(matches!(expr, Expr::Slice { end: None, .. }));
    assert!(expr.is_path());
    assert_eq!(expr.to_string(), "((((`a`.`b`)[0]).`c`)[1:])");
}

#[test]
fn test_some_is_any() {
    assert_eq!(
        parse_expression("SOME x IN xs SATISFIES x END").unwrap(),
        parse_expression("ANY x IN xs SATISFIES x END").unwrap()
    );
}

#[test]
fn test_within_binding() {
    let expr = parse_expression("ANY v WITHIN doc SATISFIES v = 1 END").unwrap();
    let Expr::Any(pred) = expr else {
        panic!("expected ANY");
    };
    assert!(pred.bindings[0].descend);
}

#[test]
fn test_function_call() {
    let expr = parse_expression("Lower(name)").unwrap();
    let Expr::Function(call) = expr else {
        panic!("expected a function call");
    };
    assert_eq!(call.name, "lower");
    assert!(!call.is_aggregate());

    let Expr::Function(count) = parse_expression("COUNT(*)").unwrap() else {
        panic!("expected a function call");
    };
    assert!(count.args.is_empty());
    assert!(count.is_aggregate());
}

#[test]
fn test_canonical_text() {
    let cases = [
        ("a > 1", "(1 < `a`)"),
        ("NOT a", "(not `a`)"),
        ("a IS NOT NULL", "(`a` is not null)"),
        ("-x", "(-`x`)"),
        ("-(1)", "(-(1))"),
        ("-1", "-1"),
        ("x BETWEEN 1 AND 2", "(`x` between 1 and 2)"),
        ("{'k': [1, 'two']}", r#"{"k": [1, "two"]}"#),
        ("CASE WHEN a THEN 1 END", "case when `a` then 1 end"),
        ("ARRAY v FOR v IN xs WHEN v END", "array `v` for `v` in `xs` when `v` end"),
    ];
    for (input, expected) in cases {
        assert_eq!(parse_expression(input).unwrap().to_string(), expected, "{input}");
    }
}

#[test]
fn test_expression_errors() {
    let err = parse_expression("a +").unwrap_err();
    assert!(matches!(err, ParseError::Unexpected { .. }));
    assert_eq!(err.position().column, 4);

    assert!(parse_expression("a b").is_err());
    assert!(parse_expression("CASE END").is_err());
    assert!(parse_expression("ANY x IN xs END").is_err());
    assert!(matches!(parse_expression("'open"), Err(ParseError::Lex(_))));
}

fn nested_parens(depth: usize) -> String {
    format!("{}1{}", "(".repeat(depth), ")".repeat(depth))
}

#[test]
fn test_nesting_depth_is_bounded() {
    // the top-level expression takes one level of its own
    assert!(parse_expression(&nested_parens(MAX_DEPTH - 1)).is_ok());
    assert!(matches!(
        parse_expression(&nested_parens(MAX_DEPTH)),
        Err(ParseError::TooDeep { .. })
    ));
    assert!(matches!(
        parse_expression(&nested_parens(100_000)),
        Err(ParseError::TooDeep { .. })
    ));
    assert!(matches!(
        parse_expression(&"NOT ".repeat(1000)),
        Err(ParseError::TooDeep { .. })
    ));
    assert!(matches!(
        parse_expression(&format!("{}x", "- ".repeat(1000))),
        Err(ParseError::TooDeep { .. })
    ));

    let subqueries = format!("{}1{}", "(SELECT RAW ".repeat(200), ")".repeat(200));
    assert!(matches!(
        parse_select(&format!("SELECT RAW {subqueries}")),
        Err(ParseError::TooDeep { .. })
    ));
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_select_clauses() {
    let select = parse_select(
        "SELECT DISTINCT b.name AS n, b.* FROM `travel-sample`:inventory.hotels b \
         USE KEYS ['h1'] LET x = 1 WHERE b.price > x ORDER BY n DESC, b.id LIMIT 10 OFFSET 5",
    )
    .unwrap();

    let node = &select.subselect;
    assert!(node.projection.distinct);
    assert_eq!(node.projection.terms.len(), 2);
    assert_eq!(node.projection.terms[0].alias.as_deref(), Some("n"));
    assert!(node.projection.terms[1].star);

    let Some(FromTerm::Keyspace(term)) = &node.from else {
        panic!("expected a keyspace");
    };
    assert_eq!(term.namespace, "travel-sample");
    assert_eq!(term.keyspace, "inventory");
    assert_eq!(term.effective_alias(), "b");
    assert!(term.projection.is_some());
    assert!(term.keys.is_some());

    assert_eq!(node.let_bindings.len(), 1);
    assert!(node.where_clause.is_some());
    assert_eq!(select.order.len(), 2);
    assert!(select.order[0].descending);
    assert_eq!(select.limit, Some(Expr::constant(10)));
    assert_eq!(select.offset, Some(Expr::Constant(Value::from(5))));
}

#[test]
fn test_joins_nest_to_the_left() {
    let select = parse_select(
        "SELECT * FROM a JOIN b ON a.id = b.aid LEFT OUTER JOIN c ON c.bid = b.id",
    )
    .unwrap();
    let Some(FromTerm::AnsiJoin(outer)) = &select.subselect.from else {
        panic!("expected a join");
    };
    assert!(outer.outer);
    assert_eq!(outer.right.keyspace, "c");
    let FromTerm::AnsiJoin(inner) = &outer.left else {
        panic!("expected a nested join");
    };
    assert!(!inner.outer);

    let names: Vec<&str> = select
        .subselect
        .from
        .as_ref()
        .unwrap()
        .keyspaces()
        .into_iter()
        .map(|t| t.keyspace.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_group_and_with() {
    let select = parse_select(
        "WITH top AS (SELECT RAW 1) SELECT t.k, COUNT(*) AS c FROM ks t \
         GROUP BY t.k LETTING m = MAX(t.v) HAVING m > 1",
    )
    .unwrap();
    assert_eq!(select.subselect.with.len(), 1);
    let group = select.subselect.group.as_ref().unwrap();
    assert_eq!(group.by.len(), 1);
    assert_eq!(group.letting.len(), 1);
    assert!(group.having.is_some());
}

#[test]
fn test_statement_canonical_text() {
    let select = parse_select("SELECT RAW u.name FROM users AS u WHERE u.age >= 18 LIMIT 2").unwrap();
    let text = select.to_string();
    assert_eq!(parse_select(&text).unwrap(), select);
}

#[test]
fn test_statement_errors() {
    assert!(parse_select("SELECT").is_err());
    assert!(parse_select("SELECT * FROM").is_err());
    assert!(parse_select("SELECT * FROM a JOIN b").is_err());
    assert!(parse_select("SELECT * FROM a trailing garbage").is_err());
}

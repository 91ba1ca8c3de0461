// tests/evaluator_tests.rs

use docql::evaluator::{EvalContext, EvalError, Parameters};
use docql::parser::parse_expression;
use docql::value::Value;
use serde_json::json;

fn eval(expr: &str, doc: serde_json::Value) -> Value {
    let doc: Value = doc.into();
    parse_expression(expr).unwrap().evaluate(&doc).unwrap()
}

fn eval_empty(expr: &str) -> Value {
    eval(expr, json!({}))
}

fn array(items: serde_json::Value) -> Value {
    items.into()
}

// ============================================================================
// MISSING and NULL
// ============================================================================

#[test]
fn test_absent_field_is_missing() {
    assert_eq!(eval("name", json!({"age": 3})).value_type(), docql::ValueType::Missing);
    assert!(eval("a.b.c", json!({"a": 1})).is_missing());
    assert!(eval("a[0]", json!({"a": "text"})).is_missing());
    assert!(eval("a['x']", json!({"a": [1]})).is_null());
}

#[test]
fn test_arithmetic_propagation() {
    assert!(eval_empty("1 + nothing").is_missing());
    assert!(eval_empty("1 + NULL").is_null());
    assert!(eval_empty("1 + 'a'").is_null());
    // MISSING wins over NULL
    assert!(eval_empty("NULL * nothing").is_missing());
}

#[test]
fn test_comparison_propagation() {
    assert!(eval_empty("NULL = 1").is_null());
    assert!(eval_empty("nothing = NULL").is_missing());
    assert!(eval_empty("nothing < 3").is_missing());
}

#[test]
fn test_is_operators() {
    let doc = json!({"a": null, "b": 1});
    assert_eq!(eval("a IS NULL", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("c IS MISSING", doc.clone()), Value::Boolean(true));
    assert!(eval("c IS NULL", doc.clone()).is_missing());
    assert!(eval("c IS NOT NULL", doc.clone()).is_missing());
    assert_eq!(eval("b IS VALUED", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("a IS NOT VALUED", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("c IS NOT VALUED", doc), Value::Boolean(true));
}

// ============================================================================
// Logic
// ============================================================================

#[test]
fn test_three_valued_and_or() {
    assert_eq!(eval_empty("FALSE AND nothing"), Value::Boolean(false));
    assert!(eval_empty("TRUE AND NULL").is_null());
    assert!(eval_empty("NULL AND nothing").is_missing());
    assert_eq!(eval_empty("TRUE OR nothing"), Value::Boolean(true));
    assert!(eval_empty("FALSE OR NULL").is_null());
}

#[test]
fn test_not() {
    assert_eq!(eval_empty("NOT FALSE"), Value::Boolean(true));
    assert!(eval_empty("NOT NULL").is_null());
    assert!(eval_empty("NOT nothing").is_missing());
    assert_eq!(eval_empty("NOT 0"), Value::Boolean(true));
    assert_eq!(eval_empty("NOT 'text'"), Value::Boolean(false));
}

#[test]
fn test_short_circuit_skips_errors() {
    // The unknown function is never called once the outcome is settled
    assert_eq!(eval_empty("FALSE AND no_such_fn(1)"), Value::Boolean(false));
    assert_eq!(eval_empty("TRUE OR no_such_fn(1)"), Value::Boolean(true));

    let err = parse_expression("TRUE AND no_such_fn(1)")
        .unwrap()
        .evaluate(&Value::Null)
        .unwrap_err();
    assert_eq!(err, EvalError::UnknownFunction("no_such_fn".to_string()));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_integer_arithmetic() {
    assert_eq!(eval_empty("1 + 2 * 3"), Value::Integer(7));
    assert_eq!(eval_empty("6 / 3"), Value::Integer(2));
    assert_eq!(eval_empty("7 / 2"), Value::Float(3.5));
    assert_eq!(eval_empty("7 % 3"), Value::Integer(1));
    assert_eq!(eval_empty("-(2 - 5)"), Value::Integer(3));
}

#[test]
fn test_mixed_arithmetic_stays_whole() {
    assert!(matches!(eval_empty("2.5 * 4"), Value::Integer(10)));
    assert!(matches!(eval_empty("1.5 + 1"), Value::Float(f) if f == 2.5));
}

#[test]
fn test_division_by_zero_is_null() {
    assert!(eval_empty("1 / 0").is_null());
    assert!(eval_empty("1 % 0").is_null());
    assert!(eval_empty("1.5 / 0").is_null());
}

#[test]
fn test_overflow_falls_back_to_float() {
    let value = eval_empty("9223372036854775807 + 1");
    assert!(matches!(value, Value::Float(_)));
}

// ============================================================================
// Comparison and strings
// ============================================================================

#[test]
fn test_comparisons() {
    let doc = json!({"price": 120, "name": "Zoe"});
    assert_eq!(eval("price > 100", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("price <= 120", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("price != 120", doc.clone()), Value::Boolean(false));
    assert_eq!(eval("price BETWEEN 100 AND 200", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("name < 'a'", doc.clone()), Value::Boolean(true));
    // Numbers compare by value across encodings
    assert_eq!(eval("price = 120.0", doc), Value::Boolean(true));
}

#[test]
fn test_cross_type_comparison_uses_collation() {
    assert_eq!(eval_empty("1 < 'a'"), Value::Boolean(true));
    assert_eq!(eval_empty("TRUE < 0"), Value::Boolean(true));
    assert_eq!(eval_empty("[1] < {'a': 1}"), Value::Boolean(true));
}

#[test]
fn test_like() {
    let doc = json!({"name": "hello"});
    assert_eq!(eval("name LIKE 'h%o'", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("name LIKE 'h_llo'", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("name LIKE 'h_o'", doc.clone()), Value::Boolean(false));
    assert_eq!(eval("name NOT LIKE 'x%'", doc.clone()), Value::Boolean(true));
    assert!(eval("42 LIKE 'x%'", doc).is_null());
    // Regex metacharacters are literal
    assert_eq!(eval_empty("'a.c' LIKE 'a.c'"), Value::Boolean(true));
    assert_eq!(eval_empty("'abc' LIKE 'a.c'"), Value::Boolean(false));
}

#[test]
fn test_concat() {
    assert_eq!(eval_empty("'a' || 'b' || 'c'"), Value::from("abc"));
    assert!(eval_empty("'a' || 1").is_null());
    assert!(eval_empty("'a' || nothing").is_missing());
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_in_and_within() {
    let doc = json!({"tags": ["a", "b"], "nested": {"x": [1, {"y": 2}]}});
    assert_eq!(eval("'a' IN tags", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("'z' NOT IN tags", doc.clone()), Value::Boolean(true));
    assert!(eval("'a' IN 'abc'", doc.clone()).is_null());
    assert_eq!(eval("2 WITHIN nested", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("3 WITHIN nested", doc), Value::Boolean(false));
}

#[test]
fn test_any_every() {
    let doc = json!({"scores": [3, 7, 9]});
    assert_eq!(eval("ANY s IN scores SATISFIES s > 8 END", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("EVERY s IN scores SATISFIES s > 2 END", doc.clone()), Value::Boolean(true));
    assert_eq!(eval("EVERY s IN scores SATISFIES s > 5 END", doc.clone()), Value::Boolean(false));
    assert_eq!(eval("EVERY s IN [] SATISFIES s > 5 END", doc.clone()), Value::Boolean(true));
    assert!(eval("ANY s IN absent SATISFIES s > 1 END", doc.clone()).is_missing());
    assert!(eval("ANY s IN 5 SATISFIES s > 1 END", doc).is_null());
}

#[test]
fn test_array_and_first() {
    let doc = json!({"items": [1, 2, 3, 4]});
    assert_eq!(
        eval("ARRAY i * 10 FOR i IN items WHEN i > 2 END", doc.clone()),
        array(json!([30, 40]))
    );
    assert_eq!(eval("FIRST i FOR i IN items WHEN i % 2 = 0 END", doc.clone()), Value::from(2));
    assert!(eval("FIRST i FOR i IN items WHEN i > 10 END", doc).is_missing());
}

#[test]
fn test_parallel_bindings_stop_at_shortest() {
    let doc = json!({"a": [1, 2, 3], "b": [10, 20]});
    assert_eq!(eval("ARRAY x + y FOR x IN a, y IN b END", doc), array(json!([11, 22])));
}

#[test]
fn test_exists() {
    assert_eq!(eval_empty("EXISTS [1]"), Value::Boolean(true));
    assert_eq!(eval_empty("EXISTS []"), Value::Boolean(false));
    assert!(eval_empty("EXISTS 'x'").is_null());
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_element_and_slice() {
    let doc = json!({"tags": ["a", "b", "c"]});
    assert_eq!(eval("tags[0]", doc.clone()), Value::from("a"));
    assert_eq!(eval("tags[-1]", doc.clone()), Value::from("c"));
    assert!(eval("tags[5]", doc.clone()).is_missing());
    assert_eq!(eval("tags[1:]", doc.clone()), array(json!(["b", "c"])));
    assert_eq!(eval("tags[0:2]", doc.clone()), array(json!(["a", "b"])));
    assert!(eval("tags[2:1]", doc).is_missing());
}

#[test]
fn test_computed_field() {
    let doc = json!({"key": "city", "address": {"city": "Paris"}});
    assert_eq!(eval("address.[key]", doc.clone()), Value::from("Paris"));
    assert_eq!(eval("`address`.`city`", doc), Value::from("Paris"));
}

// ============================================================================
// Case and construction
// ============================================================================

#[test]
fn test_case() {
    let doc = json!({"type": "hotel", "price": 50});
    assert_eq!(
        eval("CASE WHEN price > 100 THEN 'high' ELSE 'low' END", doc.clone()),
        Value::from("low")
    );
    assert_eq!(
        eval("CASE type WHEN 'airline' THEN 1 WHEN 'hotel' THEN 2 END", doc.clone()),
        Value::from(2)
    );
    assert!(eval("CASE WHEN price > 100 THEN 'high' END", doc.clone()).is_null());
    assert!(eval("CASE absent WHEN NULL THEN 1 END", doc).is_null());
}

#[test]
fn test_construction() {
    let doc = json!({"a": 1});
    assert_eq!(eval("{'x': a, 'y': absent}", doc.clone()), json!({"x": 1}).into());
    assert_eq!(eval("[a, absent]", doc), array(json!([1, null])));
}

// ============================================================================
// Functions and parameters
// ============================================================================

#[test]
fn test_functions() {
    let doc = json!({"name": "  Ann  ", "tags": ["x"]});
    assert_eq!(eval("UPPER(TRIM(name))", doc.clone()), Value::from("ANN"));
    assert_eq!(eval("ARRAY_LENGTH(tags)", doc.clone()), Value::from(1));
    assert_eq!(eval("IFMISSING(absent, 'none')", doc.clone()), Value::from("none"));
    assert!(eval("LOWER(absent)", doc).is_missing());
}

#[test]
fn test_aggregate_outside_query_is_an_error() {
    let err = parse_expression("COUNT(*)").unwrap().evaluate(&Value::Null).unwrap_err();
    assert!(matches!(err, EvalError::Aggregate(_)));
}

#[test]
fn test_parameters() {
    let parameters = Parameters::new()
        .with_named("min", Value::from(10))
        .with_positional(Value::from("x"));
    let doc: Value = json!({"n": 12}).into();
    let context = EvalContext::new(&doc, &parameters);

    let expr = parse_expression("n >= $min AND $1 = 'x'").unwrap();
    assert_eq!(expr.evaluate_in(&context).unwrap(), Value::Boolean(true));

    let unbound = parse_expression("$other").unwrap().evaluate_in(&context);
    assert!(matches!(unbound, Err(EvalError::UnboundParameter(_))));
}

#[test]
fn test_subquery_without_executor() {
    let err = parse_expression("(SELECT RAW 1)")
        .unwrap()
        .evaluate(&Value::Null)
        .unwrap_err();
    assert_eq!(err, EvalError::NoSubqueryExecutor);
}

#[test]
fn test_lazy_document() {
    let doc = Value::parsed(r#"{"user": {"langs": ["rust", "go"]}}"#);
    let expr = parse_expression("'rust' IN user.langs").unwrap();
    assert_eq!(expr.evaluate(&doc).unwrap(), Value::Boolean(true));
}

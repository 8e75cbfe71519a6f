// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::StaticMetrics;

fn eval(input: &str, metrics: &[(&str, f64)]) -> Result<f64, ExprError> {
    let source = StaticMetrics::new(metrics.iter().map(|(name, value)| (*name, *value)));
    Expr::parse(input)?.eval(&source)
}

#[test]
fn connection_ratio_times_hundred() {
    let result = eval(
        "(active_connections / max_connections) * 100",
        &[("active_connections", 80.0), ("max_connections", 100.0)],
    );
    assert_eq!(result.unwrap(), 80.0);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let result = eval("a + b * c", &[("a", 2.0), ("b", 3.0), ("c", 4.0)]);
    assert_eq!(result.unwrap(), 14.0);
}

#[test]
fn division_by_zero_is_a_typed_error() {
    let result = eval("a / b", &[("a", 1.0), ("b", 0.0)]);
    assert_eq!(result.unwrap_err(), ExprError::DivisionByZero);
}

#[test]
fn subtraction_and_division_are_left_associative() {
    assert_eq!(eval("10 - 2 - 3", &[]).unwrap(), 5.0);
    assert_eq!(eval("12 / 3 / 2", &[]).unwrap(), 2.0);
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(eval("(2 + 3) * 4", &[]).unwrap(), 20.0);
}

#[test]
fn signed_and_decimal_numbers() {
    assert_eq!(eval("-5 + 3", &[]).unwrap(), -2.0);
    assert_eq!(eval("2 - -3", &[]).unwrap(), 5.0);
    assert_eq!(eval("0.95 * 100", &[]).unwrap(), 95.0);
}

#[test]
fn missing_metric_names_the_identifier() {
    let err = eval("tps + missing_metric", &[("tps", 1.0)]).unwrap_err();
    assert_eq!(err, ExprError::MetricNotAvailable("missing_metric".to_string()));
    assert!(err.to_string().contains("metric not available"));
}

#[test]
fn unterminated_parenthesis_reports_open_position() {
    let err = Expr::parse("(a + b").unwrap_err();
    assert_eq!(err, ExprError::UnterminatedParen { pos: 0 });

    let err = Expr::parse("a * (b + c").unwrap_err();
    assert_eq!(err, ExprError::UnterminatedParen { pos: 4 });
}

#[test]
fn unexpected_character_reports_position() {
    let err = Expr::parse("a $ b").unwrap_err();
    assert_eq!(err, ExprError::UnexpectedChar { ch: '$', pos: 2 });
}

#[test]
fn trailing_input_is_rejected() {
    let err = Expr::parse("a b").unwrap_err();
    assert_eq!(err, ExprError::TrailingInput { pos: 2 });
}

#[test]
fn dangling_operator_is_rejected() {
    let err = Expr::parse("a +").unwrap_err();
    assert!(matches!(err, ExprError::Expected { .. }));
}

#[test]
fn truncated_number_is_rejected() {
    let err = Expr::parse("1.").unwrap_err();
    assert_eq!(err, ExprError::InvalidNumber { raw: "1.".to_string(), pos: 0 });
}

#[test]
fn empty_expression_is_rejected() {
    assert_eq!(Expr::parse("").unwrap_err(), ExprError::Empty);
    assert_eq!(Expr::parse("   ").unwrap_err(), ExprError::Empty);
}

#[test]
fn connection_count_alias_resolves() {
    let result = eval("connection_count", &[("active_connections", 12.0)]);
    assert_eq!(result.unwrap(), 12.0);
}

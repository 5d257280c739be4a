//! Parser tests.

use crate::ast::*;
use crate::error::ParserError;
use crate::parser::Parser;

fn parse_expr(source: &str) -> Expr {
    Parser::parse_source(source).unwrap()
}

fn render(source: &str) -> String {
    parse_expr(source).to_string()
}

#[test]
fn test_binary_expr() {
    let expr = parse_expr("1 + 2");
    match expr.kind {
        ExprKind::Binary { operator, .. } => assert_eq!(operator, BinaryOp::Add),
        _ => panic!("Expected binary expression"),
    }
}

#[test]
fn test_precedence() {
    // 1 + 2 * 3 should parse as 1 + (2 * 3)
    let expr = parse_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } => match right.kind {
            ExprKind::Binary {
                operator: BinaryOp::Multiply,
                ..
            } => {}
            _ => panic!("Expected multiply on right"),
        },
        _ => panic!("Expected add at top"),
    }
}

#[test]
fn test_power_is_right_associative() {
    assert_eq!(render("2 ** 3 ** 2"), "(2 ** (3 ** 2))");
    assert_eq!(render("1 + 2 * 3 ** 2 ** 1"), "(1 + (2 * (3 ** (2 ** 1))))");
}

#[test]
fn test_left_associative_arithmetic() {
    assert_eq!(render("1 - 2 - 3"), "((1 - 2) - 3)");
    assert_eq!(render("8 / 4 / 2"), "((8 / 4) / 2)");
}

#[test]
fn test_modulo_sits_between_additive_and_multiplicative() {
    assert_eq!(render("a % b * c"), "(a % (b * c))");
    assert_eq!(render("a * b % c"), "((a * b) % c)");
    assert_eq!(render("a + b % c"), "(a + (b % c))");
}

#[test]
fn test_logic_and_comparison() {
    assert_eq!(
        render("a > 1 || b > 1 && c == 2"),
        "((a > 1) || ((b > 1) && (c == 2)))"
    );
}

#[test]
fn test_unary_binds_tighter_than_power() {
    assert_eq!(render("-2 ** 2"), "((-2) ** 2)");
    assert_eq!(render("!a.b"), "(!a.b)");
}

#[test]
fn test_chained_assignment() {
    let expr = parse_expr("x = y = a + b");
    assert_eq!(expr.to_string(), "(x = (y = (a + b)))");
    assert!(expr.is_assign());
}

#[test]
fn test_property_assignment_becomes_set() {
    let expr = parse_expr("order.total = price * qty");
    match expr.kind {
        ExprKind::Set { object, name, .. } => {
            assert_eq!(name, "total");
            assert_eq!(object.kind, ExprKind::Identifier("order".to_string()));
        }
        other => panic!("Expected set expression, got {other:?}"),
    }
}

#[test]
fn test_nested_property_path() {
    assert_eq!(render("A.B.c + 1"), "(A.B.c + 1)");
}

#[test]
fn test_call() {
    let expr = parse_expr("sum(1, 2)");
    match expr.kind {
        ExprKind::Call { name, arguments } => {
            assert_eq!(name, "sum");
            assert_eq!(arguments.len(), 2);
        }
        _ => panic!("Expected call expression"),
    }
    assert_eq!(render("clock()"), "clock()");
}

#[test]
fn test_call_argument_limit() {
    let args = vec!["1"; 255].join(", ");
    assert!(Parser::parse_source(&format!("f({})", args)).is_ok());

    let args = vec!["1"; 256].join(", ");
    let err = Parser::parse_source(&format!("f({})", args)).unwrap_err();
    assert!(matches!(err, ParserError::TooManyArguments { .. }));
}

#[test]
fn test_if_expression() {
    assert_eq!(render("if(a > b, a, b)"), "if((a > b), a, b)");
    assert_eq!(render("if(a, 1)"), "if(a, 1)");
}

#[test]
fn test_keyword_literals() {
    assert_eq!(
        parse_expr("true").kind,
        ExprKind::Literal(Literal::Boolean(true))
    );
    assert_eq!(parse_expr("null").kind, ExprKind::Literal(Literal::Null));
}

#[test]
fn test_leftover_tokens_are_an_error() {
    let err = Parser::parse_source("1 2").unwrap_err();
    assert_eq!(err.to_string(), "[line 1] Parse error at '2': unknown token");
}

#[test]
fn test_missing_paren_reports_line() {
    let err = Parser::parse_source("(1 +\n 2").unwrap_err();
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
    assert_eq!(err.span().line, 2);
}

#[test]
fn test_property_requires_identifier() {
    assert!(Parser::parse_source("a.1").is_err());
}

#[test]
fn test_empty_input_is_an_error() {
    assert!(Parser::parse_source("").is_err());
}

#[test]
fn test_lexer_errors_surface() {
    let err = Parser::parse_source("a $ b").unwrap_err();
    assert!(matches!(err, ParserError::Lexer(_)));
}

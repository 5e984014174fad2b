//! FILENAME: core/cube-expr/src/tests.rs
//! PURPOSE: Consolidated unit tests for the expression crate.

use crate::ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::parser::{parse, parse_expression};
use crate::token::Token;

fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token();
        if token == Token::EOF {
            break;
        }
        out.push(token);
    }
    out
}

fn var(name: &str) -> Expression {
    Expression::Variable(name.to_string())
}

fn member(object: Expression, name: &str) -> Expression {
    Expression::Member {
        object: Box::new(object),
        name: name.to_string(),
    }
}

fn int(n: i64) -> Expression {
    Expression::Literal(Value::Integer(n))
}

fn string(s: &str) -> Expression {
    Expression::Literal(Value::String(s.to_string()))
}

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_member_comparison() {
    assert_eq!(
        tokens("input.age >= 18"),
        vec![
            Token::Identifier("input".to_string()),
            Token::Dot,
            Token::Identifier("age".to_string()),
            Token::GreaterEqual,
            Token::Integer(18),
        ]
    );
}

#[test]
fn lexer_distinguishes_integers_and_decimals() {
    assert_eq!(tokens("42 4.25"), vec![Token::Integer(42), Token::Number(4.25)]);
}

#[test]
fn lexer_keeps_dot_after_integer_as_member_access() {
    assert_eq!(
        tokens("list.1"),
        vec![
            Token::Identifier("list".to_string()),
            Token::Dot,
            Token::Integer(1),
        ]
    );
}

#[test]
fn lexer_reads_both_quote_styles_with_escapes() {
    assert_eq!(
        tokens(r#"'it\'s' "say \"hi\"""#),
        vec![
            Token::String("it's".to_string()),
            Token::String("say \"hi\"".to_string()),
        ]
    );
}

#[test]
fn lexer_flags_unterminated_string() {
    assert_eq!(tokens("'open"), vec![Token::Illegal('\'')]);
}

#[test]
fn lexer_multi_char_operators() {
    assert_eq!(
        tokens("== != <= >= && || ! ="),
        vec![
            Token::EqualEqual,
            Token::NotEqual,
            Token::LessEqual,
            Token::GreaterEqual,
            Token::AndAnd,
            Token::OrOr,
            Token::Bang,
            Token::Assign,
        ]
    );
}

#[test]
fn lexer_single_ampersand_is_illegal() {
    assert_eq!(tokens("a & b")[1], Token::Illegal('&'));
}

#[test]
fn lexer_skips_line_comments() {
    assert_eq!(
        tokens("1 // the first\n+ 2"),
        vec![Token::Integer(1), Token::Plus, Token::Integer(2)]
    );
}

#[test]
fn lexer_keywords() {
    assert_eq!(
        tokens("true false null True"),
        vec![
            Token::Boolean(true),
            Token::Boolean(false),
            Token::Null,
            Token::Identifier("True".to_string()),
        ]
    );
}

// ========================================
// PARSER TESTS
// ========================================

#[test]
fn parser_respects_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let expr = parse_expression("1 + 2 * 3").unwrap();
    assert_eq!(
        expr,
        Expression::BinaryOp {
            left: Box::new(int(1)),
            op: BinaryOperator::Add,
            right: Box::new(Expression::BinaryOp {
                left: Box::new(int(2)),
                op: BinaryOperator::Multiply,
                right: Box::new(int(3)),
            }),
        }
    );
}

#[test]
fn parser_logical_lower_than_comparison() {
    let expr = parse_expression("input.age > 18 && input.state == 'OH'").unwrap();
    match expr {
        Expression::BinaryOp { op, left, right } => {
            assert_eq!(op, BinaryOperator::And);
            assert!(matches!(*left, Expression::BinaryOp { op: BinaryOperator::GreaterThan, .. }));
            assert!(matches!(*right, Expression::BinaryOp { op: BinaryOperator::Equal, .. }));
        }
        other => panic!("Expected BinaryOp, got {:?}", other),
    }
}

#[test]
fn parser_or_binds_looser_than_and() {
    let expr = parse_expression("a || b && c").unwrap();
    match expr {
        Expression::BinaryOp { op, right, .. } => {
            assert_eq!(op, BinaryOperator::Or);
            assert!(matches!(*right, Expression::BinaryOp { op: BinaryOperator::And, .. }));
        }
        other => panic!("Expected BinaryOp, got {:?}", other),
    }
}

#[test]
fn parser_unary_operators() {
    assert_eq!(
        parse_expression("!done").unwrap(),
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            operand: Box::new(var("done")),
        }
    );
    assert_eq!(
        parse_expression("--5").unwrap(),
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(Expression::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(int(5)),
            }),
        }
    );
}

#[test]
fn parser_member_and_index_chain() {
    let expr = parse_expression("input['rates'].base[0]").unwrap();
    assert_eq!(
        expr,
        Expression::Index {
            object: Box::new(member(
                Expression::Index {
                    object: Box::new(var("input")),
                    index: Box::new(string("rates")),
                },
                "base"
            )),
            index: Box::new(int(0)),
        }
    );
}

#[test]
fn parser_function_names_are_lowercased() {
    let expr = parse_expression("IF(x, 1, 2)").unwrap();
    match expr {
        Expression::FunctionCall { name, args } => {
            assert_eq!(name, "if");
            assert_eq!(args.len(), 3);
        }
        other => panic!("Expected FunctionCall, got {:?}", other),
    }
}

#[test]
fn parser_empty_argument_list() {
    assert_eq!(
        parse_expression("stop()").unwrap(),
        Expression::FunctionCall {
            name: "stop".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn parser_map_and_list_literals() {
    let expr = parse_expression("{rules: 'start', 'two words': [1, 2,]}").unwrap();
    assert_eq!(
        expr,
        Expression::Map(vec![
            ("rules".to_string(), string("start")),
            (
                "two words".to_string(),
                Expression::List(vec![int(1), int(2)])
            ),
        ])
    );
}

#[test]
fn parser_statements_and_assignment() {
    let program = parse("output.total = 10; output.total * 2;").unwrap();
    assert_eq!(
        program,
        Program {
            statements: vec![
                Statement::Assign {
                    target: member(var("output"), "total"),
                    value: int(10),
                },
                Statement::Expression(Expression::BinaryOp {
                    left: Box::new(member(var("output"), "total")),
                    op: BinaryOperator::Multiply,
                    right: Box::new(int(2)),
                }),
            ],
        }
    );
}

#[test]
fn parser_rejects_invalid_assignment_target() {
    let err = parse("1 + 2 = 3").unwrap_err();
    assert!(err.message.contains("assignment"));
}

#[test]
fn parser_rejects_empty_input() {
    assert!(parse("").is_err());
    assert!(parse(" ; ; ").is_err());
    assert!(parse_expression("   ").is_err());
}

#[test]
fn parser_rejects_trailing_tokens() {
    assert!(parse_expression("1 2").is_err());
    assert!(parse("1 2").is_err());
}

#[test]
fn parser_reports_unclosed_call() {
    let err = parse_expression("max(1, 2").unwrap_err();
    assert!(err.message.contains("Expected"));
}

#[test]
fn parser_reports_illegal_character() {
    let err = parse_expression("1 # 2").unwrap_err();
    assert!(err.to_string().contains("Unexpected token") || err.to_string().contains("Illegal"));
}

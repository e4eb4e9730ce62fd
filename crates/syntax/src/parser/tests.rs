use super::parse;
use crate::ast::{Expr, Message, Pattern, Stmt};

#[test]
fn unary_pattern_and_return() {
  let m = parse("isEmpty\n\t^ self size = 0").unwrap();
  assert_eq!(m.pattern, Pattern::Unary("isEmpty".into()));
  assert_eq!(m.body.len(), 1);
  assert!(matches!(m.body[0], Stmt::Return(_)));
}

#[test]
fn keyword_pattern_with_temporaries() {
  let m = parse("at: key put: value\n| old |\nold := 1.\n^ old").unwrap();
  assert_eq!(
    m.pattern,
    Pattern::Keyword(vec![("at:".into(), "key".into()), ("put:".into(), "value".into())])
  );
  assert_eq!(m.temporaries, vec!["old".to_string()]);
  assert_eq!(m.body.len(), 2);
}

#[test]
fn binary_pattern() {
  let m = parse("+ other\n^ self value + other value").unwrap();
  assert_eq!(m.pattern, Pattern::Binary("+".into(), "other".into()));
}

#[test]
fn precedence_unary_binary_keyword() {
  let m = parse("foo\n^ 1 + 2 factorial max: 3 negated").unwrap();
  match &m.body[0] {
    Stmt::Return(Expr::Send { message, .. }) => {
      assert!(matches!(message, Message::Keyword(_)));
    }
    other => panic!("unexpected: {other:?}"),
  }
}

#[test]
fn cascade_send() {
  let m = parse("foo\nTranscript show: 'a'; show: 'b'; cr").unwrap();
  match &m.body[0] {
    Stmt::Expr(Expr::Cascade { rest, .. }) => assert_eq!(rest.len(), 2),
    other => panic!("unexpected: {other:?}"),
  }
}

#[test]
fn block_with_params() {
  let m = parse("foo\n^ [:a :b | a + b] value: 1 value: 2").unwrap();
  assert!(matches!(m.body[0], Stmt::Return(_)));
}

#[test]
fn array_literal() {
  let m = parse("foo\n^ #(1 2.5 foo #bar 'baz' $c)").unwrap();
  match &m.body[0] {
    Stmt::Return(Expr::ArrayLit(elems, _)) => assert_eq!(elems.len(), 6),
    other => panic!("unexpected: {other:?}"),
  }
}

#[test]
fn assignment_and_self_super() {
  let m = parse("foo\nx := self.\n^ super foo").unwrap();
  assert!(matches!(m.body[0], Stmt::Expr(Expr::Assign(_, _, _))));
  match &m.body[1] {
    Stmt::Return(Expr::Send { receiver, .. }) => assert!(matches!(**receiver, Expr::SuperRef(_))),
    other => panic!("unexpected: {other:?}"),
  }
}

#[test]
fn malformed_input_reports_error_without_panicking() {
  let result = parse("foo\n^ )");
  assert!(result.is_err());
  let errors = result.unwrap_err();
  assert!(!errors.is_empty());
}

#[test]
fn embedded_primitive() {
  let m = parse("+ other\n<1 self other>\n^ self").unwrap();
  assert!(m.primitive.is_some());
  assert_eq!(m.primitive.unwrap().number, 1);
}

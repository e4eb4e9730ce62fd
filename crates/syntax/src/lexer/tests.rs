use super::Lexer;
use crate::token::TokenKind;

fn kinds(src: &str) -> Vec<TokenKind<'_>> {
  let mut lexer = Lexer::new(src);
  let mut out = Vec::new();
  loop {
    let tok = lexer.next().expect("lex error");
    if tok.is_end() {
      break;
    }
    out.push(tok.kind);
  }
  out
}

#[test]
fn names_and_keywords() {
  assert_eq!(
    kinds("foo bar: baz"),
    vec![
      TokenKind::Name("foo".into()),
      TokenKind::Keyword("bar:".into()),
      TokenKind::Name("baz".into()),
    ]
  );
}

#[test]
fn keyword_part_does_not_eat_assignment() {
  assert_eq!(
    kinds("x := 1"),
    vec![
      TokenKind::Name("x".into()),
      TokenKind::Binary(":=".into()),
      TokenKind::Int(1),
    ]
  );
}

#[test]
fn integer_then_period_is_not_a_float() {
  assert_eq!(
    kinds("3."),
    vec![TokenKind::Int(3), TokenKind::Closing('.')]
  );
}

#[test]
fn float_literal() {
  assert_eq!(kinds("3.14"), vec![TokenKind::Float(3.14)]);
}

#[test]
fn integer_followed_by_identifier_e() {
  assert_eq!(
    kinds("1 e"),
    vec![TokenKind::Int(1), TokenKind::Name("e".into())]
  );
}

#[test]
fn exponent_literal() {
  assert_eq!(kinds("1e3"), vec![TokenKind::Float(1000.0)]);
  assert_eq!(kinds("1e-1"), vec![TokenKind::Float(0.1)]);
}

#[test]
fn char_literal() {
  assert_eq!(kinds("$a"), vec![TokenKind::Char('a')]);
}

#[test]
fn symbol_literal() {
  assert_eq!(kinds("#foo:bar:"), vec![TokenKind::Symbol("foo:bar:".into())]);
  assert_eq!(kinds("#+"), vec![TokenKind::Symbol("+".into())]);
}

#[test]
fn array_begin() {
  assert_eq!(kinds("#(1 2)"), vec![
    TokenKind::ArrayBegin,
    TokenKind::Int(1),
    TokenKind::Int(2),
    TokenKind::Closing(')'),
  ]);
}

#[test]
fn string_literal_with_doubled_quote() {
  assert_eq!(
    kinds("'it''s me'"),
    vec![TokenKind::String("it's me".into())]
  );
}

#[test]
fn binary_selectors() {
  assert_eq!(
    kinds("1 + 2 <= 3"),
    vec![
      TokenKind::Int(1),
      TokenKind::Binary("+".into()),
      TokenKind::Int(2),
      TokenKind::Binary("<=".into()),
      TokenKind::Int(3),
    ]
  );
}

#[test]
fn comments_are_skipped() {
  assert_eq!(
    kinds("1 \"a comment\" + 2"),
    vec![
      TokenKind::Int(1),
      TokenKind::Binary("+".into()),
      TokenKind::Int(2),
    ]
  );
}

#[test]
fn overflowing_integer_becomes_float() {
  let kinds = kinds("99999999999");
  assert_eq!(kinds.len(), 1);
  assert!(matches!(kinds[0], TokenKind::Float(_)));
}

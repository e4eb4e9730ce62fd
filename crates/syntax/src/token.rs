use beef::lean::Cow;
use span::Span;

/// A single lexical token.
///
/// Kinds mirror the classic Smalltalk token classes: identifiers split into
/// `Name` and `Keyword` (the latter carries its trailing `:`), numbers split
/// into `Int`/`Float`, and a handful of delimiter classes used directly by
/// the parser (`ArrayBegin` for `#(`, `Closing` for anything that ends a
/// construct).
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind<'src> {
  Name(Cow<'src, str>),
  Keyword(Cow<'src, str>),
  Int(i64),
  Float(f64),
  Char(char),
  Symbol(Cow<'src, str>),
  ArrayBegin,
  String(Cow<'src, str>),
  Binary(Cow<'src, str>),
  Closing(char),
  End,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token<'src> {
  pub kind: TokenKind<'src>,
  pub span: Span,
}

impl<'src> Token<'src> {
  pub fn new(kind: TokenKind<'src>, span: impl Into<Span>) -> Self {
    Token {
      kind,
      span: span.into(),
    }
  }

  pub fn is_end(&self) -> bool {
    matches!(self.kind, TokenKind::End)
  }

  pub fn is_binary(&self, op: &str) -> bool {
    matches!(&self.kind, TokenKind::Binary(b) if b.as_ref() == op)
  }

  pub fn is_closing(&self, c: char) -> bool {
    matches!(self.kind, TokenKind::Closing(k) if k == c)
  }

  pub fn is_keyword(&self, name: &str) -> bool {
    matches!(&self.kind, TokenKind::Keyword(k) if k.as_ref() == name)
  }

  pub fn as_name(&self) -> Option<&str> {
    match &self.kind {
      TokenKind::Name(n) => Some(n.as_ref()),
      _ => None,
    }
  }
}

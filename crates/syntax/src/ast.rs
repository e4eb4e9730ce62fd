//! Parse tree for a single method or do-it body.
//!
//! Unlike the single-pass parse-and-codegen this was bootstrapped from, the
//! parser here only builds this tree; the bytecode emitter walks it
//! separately. That split is what lets the optimized control-message
//! selectors (`ifTrue:`, `whileTrue:`, ...) be recognized by the emitter
//! instead of being wired into parsing itself.

use span::Span;

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
  Unary(String),
  Binary(String, String),
  Keyword(Vec<(String, String)>),
}

impl Pattern {
  pub fn selector(&self) -> String {
    match self {
      Pattern::Unary(name) => name.clone(),
      Pattern::Binary(op, _) => op.clone(),
      Pattern::Keyword(parts) => parts.iter().map(|(kw, _)| kw.as_str()).collect(),
    }
  }

  pub fn params(&self) -> Vec<&str> {
    match self {
      Pattern::Unary(_) => Vec::new(),
      Pattern::Binary(_, arg) => vec![arg.as_str()],
      Pattern::Keyword(parts) => parts.iter().map(|(_, arg)| arg.as_str()).collect(),
    }
  }
}

/// A parsed method: pattern, optional embedded primitive, temporaries, body.
#[derive(Clone, Debug, PartialEq)]
pub struct Method {
  pub pattern: Pattern,
  pub primitive: Option<Primitive>,
  pub temporaries: Vec<String>,
  pub body: Vec<Stmt>,
  pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
  pub number: u32,
  pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
  Expr(Expr),
  Return(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
  pub params: Vec<String>,
  pub temporaries: Vec<String>,
  pub body: Vec<Stmt>,
  pub span: Span,
}

/// One message send in a cascade, following the first.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeMessage {
  pub selector: Message,
  pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
  Unary(String),
  Binary(String, Box<Expr>),
  Keyword(Vec<(String, Expr)>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
  SelfRef(Span),
  SuperRef(Span),
  Ident(String, Span),
  Int(i64, Span),
  Float(f64, Span),
  Char(char, Span),
  Symbol(String, Span),
  Str(String, Span),
  ArrayLit(Vec<Expr>, Span),
  BlockLit(Block),
  Assign(String, Box<Expr>, Span),
  Send {
    receiver: Box<Expr>,
    message: Message,
    span: Span,
  },
  Cascade {
    receiver: Box<Expr>,
    first: Message,
    rest: Vec<CascadeMessage>,
    span: Span,
  },
}

impl Expr {
  pub fn span(&self) -> Span {
    match self {
      Expr::SelfRef(s)
      | Expr::SuperRef(s)
      | Expr::Ident(_, s)
      | Expr::Int(_, s)
      | Expr::Float(_, s)
      | Expr::Char(_, s)
      | Expr::Symbol(_, s)
      | Expr::Str(_, s)
      | Expr::ArrayLit(_, s)
      | Expr::Assign(_, _, s)
      | Expr::Send { span: s, .. }
      | Expr::Cascade { span: s, .. } => *s,
      Expr::BlockLit(b) => b.span,
    }
  }
}

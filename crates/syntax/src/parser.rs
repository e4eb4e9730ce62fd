//! Recursive-descent parser building the [`crate::ast`] tree.
//!
//! Precedence climbs unary, then binary, then keyword, matching the
//! `unaryContinuation`/`binaryContinuation`/`keyContinuation` chain this is
//! modeled on, but builds a tree instead of emitting bytecode inline — the
//! emitter (outside this crate) walks the tree and is the only place that
//! knows about optimized control messages.

use span::Span;

use crate::ast::{Block, CascadeMessage, Expr, Message, Method, Pattern, Primitive, Stmt};
use crate::error::SyntaxError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub struct Parser<'src> {
  lexer: Lexer<'src>,
  cur: Token<'src>,
  peeked: Option<Token<'src>>,
  errors: Vec<SyntaxError>,
}

type PResult<T> = Result<T, ()>;

// On average, a single parse_XXX() method consumes between 10 and 700 bytes of
// stack space. Assuming ~50 recursive calls per dive and 700 bytes of stack
// space per call, we'll require 50 * 700 = 35k bytes of stack space in order
// to dive. For future proofing, we round this value up to 64k bytes.
#[cfg(feature = "check-recursion-limit")]
const MINIMUM_STACK_REQUIRED: usize = 64_000;

#[cfg(feature = "check-recursion-limit")]
fn check_recursion_limit(span: Span) -> Result<(), SyntaxError> {
  if stacker::remaining_stack()
    .map(|available| available > MINIMUM_STACK_REQUIRED)
    .unwrap_or(true)
  {
    Ok(())
  } else {
    Err(SyntaxError::new("nesting limit reached", span))
  }
}

#[cfg(not(feature = "check-recursion-limit"))]
fn check_recursion_limit(_span: Span) -> Result<(), SyntaxError> {
  Ok(())
}

impl<'src> Parser<'src> {
  pub fn new(src: &'src str) -> Self {
    let mut lexer = Lexer::new(src);
    let cur = lexer.next().unwrap_or_else(|e| Token::new(TokenKind::End, e.span));
    Parser {
      lexer,
      cur,
      peeked: None,
      errors: Vec::new(),
    }
  }

  fn bump(&mut self) -> Token<'src> {
    let next = self
      .peeked
      .take()
      .unwrap_or_else(|| self.lexer.next().unwrap_or_else(|e| Token::new(TokenKind::End, e.span)));
    std::mem::replace(&mut self.cur, next)
  }

  fn peek(&mut self) -> &Token<'src> {
    if self.peeked.is_none() {
      self.peeked = Some(self.lexer.next().unwrap_or_else(|e| Token::new(TokenKind::End, e.span)));
    }
    self.peeked.as_ref().unwrap()
  }

  fn error(&mut self, message: impl Into<String>) {
    self.errors.push(SyntaxError::new(message, self.cur.span));
  }

  fn expect_name(&mut self) -> PResult<String> {
    match self.cur.kind.clone() {
      TokenKind::Name(n) => {
        self.bump();
        Ok(n.into_owned())
      }
      _ => {
        self.error("expected a name");
        Err(())
      }
    }
  }

  fn expect_binary(&mut self, op: &str) -> PResult<()> {
    if self.cur.is_binary(op) {
      self.bump();
      Ok(())
    } else {
      self.error(format!("expected `{op}`"));
      Err(())
    }
  }

  fn expect_closing(&mut self, c: char) -> PResult<()> {
    if self.cur.is_closing(c) {
      self.bump();
      Ok(())
    } else {
      self.error(format!("expected `{c}`"));
      Err(())
    }
  }

  /// Parse a full method: pattern, optional embedded primitive, temporaries, body.
  pub fn parse_method(mut self) -> Result<Method, Vec<SyntaxError>> {
    let start = self.cur.span;
    let pattern = match self.parse_pattern() {
      Ok(p) => p,
      Err(()) => return Err(self.errors),
    };
    let primitive = if self.cur.is_binary("<") {
      self.parse_primitive().ok()
    } else {
      None
    };
    let temporaries = self.parse_temporaries().unwrap_or_default();
    let body = self.parse_body(false);
    let end = self.cur.span;

    if self.errors.is_empty() {
      Ok(Method {
        pattern,
        primitive,
        temporaries,
        body,
        span: start.join(end),
      })
    } else {
      Err(self.errors)
    }
  }

  fn parse_pattern(&mut self) -> PResult<Pattern> {
    match self.cur.kind.clone() {
      TokenKind::Name(n) => {
        self.bump();
        Ok(Pattern::Unary(n.into_owned()))
      }
      TokenKind::Binary(op) => {
        let op = op.into_owned();
        self.bump();
        let arg = self.expect_name()?;
        Ok(Pattern::Binary(op, arg))
      }
      TokenKind::Keyword(_) => {
        let mut parts = Vec::new();
        while let TokenKind::Keyword(kw) = self.cur.kind.clone() {
          self.bump();
          let arg = self.expect_name()?;
          parts.push((kw.into_owned(), arg));
        }
        Ok(Pattern::Keyword(parts))
      }
      _ => {
        self.error("invalid message pattern");
        Err(())
      }
    }
  }

  fn parse_primitive(&mut self) -> PResult<Primitive> {
    self.expect_binary("<")?;
    let number = match self.cur.kind.clone() {
      TokenKind::Int(n) if n >= 0 => {
        self.bump();
        n as u32
      }
      _ => {
        self.error("primitive number missing");
        return Err(());
      }
    };
    let mut args = Vec::new();
    while !self.cur.is_binary(">") && !self.cur.is_end() {
      args.push(self.parse_term()?);
    }
    self.expect_binary(">")?;
    Ok(Primitive { number, args })
  }

  fn parse_temporaries(&mut self) -> PResult<Vec<String>> {
    if !self.cur.is_binary("|") {
      return Ok(Vec::new());
    }
    self.bump();
    let mut names = Vec::new();
    while let TokenKind::Name(_) = self.cur.kind {
      names.push(self.expect_name()?);
    }
    self.expect_binary("|")?;
    Ok(names)
  }

  /// `in_block` suppresses the implicit-nil-on-empty-body rule used by methods.
  fn parse_body(&mut self, in_block: bool) -> Vec<Stmt> {
    let mut stmts = Vec::new();
    if in_block && self.cur.is_closing(']') {
      return stmts;
    }
    loop {
      match self.parse_statement() {
        Ok(stmt) => stmts.push(stmt),
        Err(()) => {
          // best-effort recovery: skip to the next statement boundary
          while !self.cur.is_closing('.') && !self.cur.is_closing(']') && !self.cur.is_end() {
            self.bump();
          }
        }
      }
      if self.cur.is_closing('.') {
        self.bump();
        if self.cur.is_end() || self.cur.is_closing(']') {
          break;
        }
        continue;
      }
      break;
    }
    stmts
  }

  fn parse_statement(&mut self) -> PResult<Stmt> {
    if self.cur.is_binary("^") {
      self.bump();
      let expr = self.parse_expression()?;
      Ok(Stmt::Return(expr))
    } else {
      let expr = self.parse_expression()?;
      Ok(Stmt::Expr(expr))
    }
  }

  fn parse_expression(&mut self) -> PResult<Expr> {
    if check_recursion_limit(self.cur.span).is_err() {
      self.error("expression nested too deeply");
      return Err(());
    }
    if let TokenKind::Name(name) = self.cur.kind.clone() {
      if self.peek().is_binary(":=") {
        let start = self.cur.span;
        self.bump(); // name
        self.bump(); // :=
        let rhs = self.parse_expression()?;
        return Ok(Expr::Assign(name.into_owned(), Box::new(rhs), start.join(self.prev_span())));
      }
    }
    self.parse_cascade()
  }

  fn prev_span(&self) -> Span {
    self.cur.span
  }

  fn parse_cascade(&mut self) -> PResult<Expr> {
    let first = self.parse_keyword_send()?;
    if !self.cur.is_closing(';') {
      return Ok(first);
    }
    let (receiver, first_msg, recv_span) = match first {
      Expr::Send { receiver, message, span } => (receiver, message, span),
      other => {
        self.error("cascade must follow a message send");
        return Ok(other);
      }
    };
    let mut rest = Vec::new();
    while self.cur.is_closing(';') {
      self.bump();
      let msg_start = self.cur.span;
      let message = self.parse_message()?;
      rest.push(CascadeMessage {
        selector: message,
        span: msg_start.join(self.prev_span()),
      });
    }
    let span = recv_span.join(self.prev_span());
    Ok(Expr::Cascade {
      receiver,
      first: first_msg,
      rest,
      span,
    })
  }

  /// A message without a receiver, used for cascade parts after the first.
  fn parse_message(&mut self) -> PResult<Message> {
    match self.cur.kind.clone() {
      TokenKind::Name(n) => {
        self.bump();
        Ok(Message::Unary(n.into_owned()))
      }
      TokenKind::Binary(op) if op.as_ref() != ":=" => {
        self.bump();
        let arg = self.parse_unary()?;
        Ok(Message::Binary(op.into_owned(), Box::new(arg)))
      }
      TokenKind::Keyword(_) => {
        let mut parts = Vec::new();
        while let TokenKind::Keyword(kw) = self.cur.kind.clone() {
          self.bump();
          let arg = self.parse_binary()?;
          parts.push((kw.into_owned(), arg));
        }
        Ok(Message::Keyword(parts))
      }
      _ => {
        self.error("expected a message");
        Err(())
      }
    }
  }

  fn parse_keyword_send(&mut self) -> PResult<Expr> {
    let recv = self.parse_binary()?;
    if let TokenKind::Keyword(_) = self.cur.kind {
      let start = recv.span();
      let mut parts = Vec::new();
      while let TokenKind::Keyword(kw) = self.cur.kind.clone() {
        self.bump();
        let arg = self.parse_binary()?;
        parts.push((kw.into_owned(), arg));
      }
      let span = start.join(self.prev_span());
      Ok(Expr::Send {
        receiver: Box::new(recv),
        message: Message::Keyword(parts),
        span,
      })
    } else {
      Ok(recv)
    }
  }

  fn parse_binary(&mut self) -> PResult<Expr> {
    let mut lhs = self.parse_unary()?;
    while let TokenKind::Binary(op) = self.cur.kind.clone() {
      if op.as_ref() == ":=" || op.as_ref() == "^" {
        break;
      }
      let start = lhs.span();
      self.bump();
      let rhs = self.parse_unary()?;
      let span = start.join(self.prev_span());
      lhs = Expr::Send {
        receiver: Box::new(lhs),
        message: Message::Binary(op.into_owned(), Box::new(rhs)),
        span,
      };
    }
    Ok(lhs)
  }

  fn parse_unary(&mut self) -> PResult<Expr> {
    let mut recv = self.parse_term()?;
    while let TokenKind::Name(name) = self.cur.kind.clone() {
      let start = recv.span();
      self.bump();
      let span = start.join(self.prev_span());
      recv = Expr::Send {
        receiver: Box::new(recv),
        message: Message::Unary(name.into_owned()),
        span,
      };
    }
    Ok(recv)
  }

  fn parse_term(&mut self) -> PResult<Expr> {
    let tok = self.cur.clone();
    match tok.kind {
      TokenKind::Name(n) if n.as_ref() == "self" => {
        self.bump();
        Ok(Expr::SelfRef(tok.span))
      }
      TokenKind::Name(n) if n.as_ref() == "super" => {
        self.bump();
        Ok(Expr::SuperRef(tok.span))
      }
      TokenKind::Name(n) => {
        self.bump();
        Ok(Expr::Ident(n.into_owned(), tok.span))
      }
      TokenKind::Int(i) => {
        self.bump();
        Ok(Expr::Int(i, tok.span))
      }
      TokenKind::Float(f) => {
        self.bump();
        Ok(Expr::Float(f, tok.span))
      }
      TokenKind::Char(c) => {
        self.bump();
        Ok(Expr::Char(c, tok.span))
      }
      TokenKind::Symbol(s) => {
        self.bump();
        Ok(Expr::Symbol(s.into_owned(), tok.span))
      }
      TokenKind::String(s) => {
        self.bump();
        Ok(Expr::Str(s.into_owned(), tok.span))
      }
      TokenKind::ArrayBegin => self.parse_array_literal(),
      TokenKind::Binary(ref op) if op.as_ref() == "-" && self.peek_is_number() => {
        self.bump();
        match self.cur.kind.clone() {
          TokenKind::Int(i) => {
            self.bump();
            Ok(Expr::Int(-i, tok.span.join(self.prev_span())))
          }
          TokenKind::Float(f) => {
            self.bump();
            Ok(Expr::Float(-f, tok.span.join(self.prev_span())))
          }
          _ => unreachable!(),
        }
      }
      TokenKind::Binary(ref op) if op.as_ref() == "(" => {
        self.bump();
        let expr = self.parse_expression()?;
        self.expect_binary(")")?;
        Ok(expr)
      }
      TokenKind::Binary(ref op) if op.as_ref() == "[" => self.parse_block(),
      _ => {
        self.error("invalid expression start");
        Err(())
      }
    }
  }

  fn peek_is_number(&mut self) -> bool {
    matches!(self.peek().kind, TokenKind::Int(_) | TokenKind::Float(_))
  }

  fn parse_array_literal(&mut self) -> PResult<Expr> {
    let start = self.cur.span;
    self.bump(); // #(
    let mut elems = Vec::new();
    while !self.cur.is_closing(')') && !self.cur.is_end() {
      elems.push(self.parse_array_element()?);
    }
    self.expect_closing(')')?;
    Ok(Expr::ArrayLit(elems, start.join(self.prev_span())))
  }

  fn parse_array_element(&mut self) -> PResult<Expr> {
    let tok = self.cur.clone();
    match tok.kind {
      TokenKind::ArrayBegin => self.parse_array_literal(),
      TokenKind::Int(i) => {
        self.bump();
        Ok(Expr::Int(i, tok.span))
      }
      TokenKind::Float(f) => {
        self.bump();
        Ok(Expr::Float(f, tok.span))
      }
      TokenKind::Name(n) => {
        self.bump();
        Ok(Expr::Symbol(n.into_owned(), tok.span))
      }
      TokenKind::Keyword(k) => {
        self.bump();
        Ok(Expr::Symbol(k.into_owned(), tok.span))
      }
      TokenKind::Symbol(s) => {
        self.bump();
        Ok(Expr::Symbol(s.into_owned(), tok.span))
      }
      TokenKind::Char(c) => {
        self.bump();
        Ok(Expr::Char(c, tok.span))
      }
      TokenKind::String(s) => {
        self.bump();
        Ok(Expr::Str(s.into_owned(), tok.span))
      }
      TokenKind::Binary(ref op) if op.as_ref() == "-" && self.peek_is_number() => {
        self.bump();
        match self.cur.kind.clone() {
          TokenKind::Int(i) => {
            self.bump();
            Ok(Expr::Int(-i, tok.span.join(self.prev_span())))
          }
          TokenKind::Float(f) => {
            self.bump();
            Ok(Expr::Float(-f, tok.span.join(self.prev_span())))
          }
          _ => unreachable!(),
        }
      }
      TokenKind::Binary(op) => {
        self.bump();
        Ok(Expr::Symbol(op.into_owned(), tok.span))
      }
      _ => {
        self.error("illegal text in literal array");
        self.bump();
        Err(())
      }
    }
  }

  fn parse_block(&mut self) -> PResult<Expr> {
    let start = self.cur.span;
    self.bump(); // [
    let mut params = Vec::new();
    if self.cur.is_binary(":") {
      while self.cur.is_binary(":") {
        self.bump();
        params.push(self.expect_name()?);
      }
      self.expect_binary("|")?;
    }
    let temporaries = self.parse_temporaries().unwrap_or_default();
    let body = self.parse_body(true);
    self.expect_closing(']')?;
    let span = start.join(self.prev_span());
    Ok(Expr::BlockLit(Block {
      params,
      temporaries,
      body,
      span,
    }))
  }
}

pub fn parse(text: &str) -> Result<Method, Vec<SyntaxError>> {
  Parser::new(text).parse_method()
}

#[cfg(test)]
mod tests;

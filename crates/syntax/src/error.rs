use diag::{Report, Source};
use span::Span;

/// A single parse diagnostic. The parser never aborts on the first of
/// these; it records one per malformed construct and keeps going so a
/// single compile attempt can report everything wrong with a method body.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
  pub message: String,
  pub span: Span,
}

impl SyntaxError {
  pub fn new(message: impl Into<String>, span: impl Into<Span>) -> Self {
    SyntaxError {
      message: message.into(),
      span: span.into(),
    }
  }

  /// Render this error against `source`, in the same format the rest of
  /// the diagnostics layer uses for runtime errors.
  pub fn report<'a>(&'a self, source_name: &'a str, source_text: &'a str) -> Report<'a> {
    Report::error()
      .source(Source::file(source_name, source_text))
      .message(self.message.clone())
      .span(self.span)
      .build()
  }
}

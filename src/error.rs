//! Top-level error type.
//!
//! Malformed Smalltalk-level input never panics; it is reported through
//! one of these variants. Panics are reserved for violated Rust-level
//! invariants inside the core (corrupt bytecode offsets, object table
//! corruption) — a System error in the sense this crate uses the term,
//! not recoverable user input.

use syntax::SyntaxError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("compile error: {} diagnostic(s)", .0.len())]
  Compile(Vec<SyntaxError>),

  #[error("{selector} not understood by {receiver}")]
  MethodNotFound { receiver: String, selector: String },

  #[error("process failed: {0}")]
  ProcessFailed(String),

  #[error("bad non-local return from a dead block context")]
  BadReturn,

  #[error("out of memory: object table exhausted after a full collection")]
  OutOfMemory,

  #[error("image load error: {0}")]
  ImageLoad(String),

  #[error("corrupt object memory: {0}")]
  Corrupt(&'static str),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

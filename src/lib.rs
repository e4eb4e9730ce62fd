//! An image-based, object-oriented dynamic language in the Smalltalk
//! tradition.
//!
//! The crate is organized around the object memory it interprets
//! programs against: [`object`] owns the tagged references and the
//! object table itself, [`op`] is the bytecode format, [`compile`]
//! turns a parsed method into bytecode, [`vm`] interprets it, and
//! [`primitive`] backs the native operations `vm` can't express in
//! bytecode alone. [`bootstrap`] builds the minimal kernel-class
//! hierarchy from Rust rather than loading it from a shipped image, and
//! [`image`] persists/restores a live object table to/from disk.

pub mod bootstrap;
pub mod compile;
pub mod error;
pub mod image;
pub mod object;
pub mod op;
pub mod primitive;
pub mod vm;

pub use error::{Error, Result};
pub use object::{ObjectTable, Ref};
pub use vm::{Classes, Interpreter, RunResult};

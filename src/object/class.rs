//! Fixed field layouts for the bootstrap classes.
//!
//! Each `*View` is a thin, zero-cost accessor pairing an oop with the
//! table it lives in. Field indices here are 0-based Rust-side offsets
//! into the object's reference buffer; the 1-based indexing the
//! Smalltalk-visible `basicAt:`/`basicAt:put:` primitives expose is a
//! conversion made only at that primitive boundary, not here.

use super::{ObjectTable, Ref};
use crate::error::Result;

pub mod class_field {
  pub const NAME: usize = 0;
  pub const SIZE: usize = 1;
  pub const METHODS: usize = 2;
  pub const SUPERCLASS: usize = 3;
  pub const VARIABLES: usize = 4;
  pub const FIELD_COUNT: usize = 5;
}

pub mod method_field {
  pub const TEXT: usize = 0;
  pub const MESSAGE: usize = 1;
  pub const BYTECODES: usize = 2;
  pub const LITERALS: usize = 3;
  pub const STACK_SIZE: usize = 4;
  pub const TEMP_SIZE: usize = 5;
  pub const METHOD_CLASS: usize = 6;
  pub const WATCH: usize = 7;
  /// The embedded `<N ...>` pragma's primitive number, or `nil` if the
  /// method has none. Checked before activation; the body never sees
  /// this as bytecode.
  pub const PRIMITIVE: usize = 8;
  pub const FIELD_COUNT: usize = 9;
}

/// A reified activation. Every send creates one of these rather than a
/// raw process-stack frame; `HOME` is what a block's non-local return
/// checks for liveness against.
pub mod context_field {
  pub const SENDER: usize = 0;
  pub const METHOD: usize = 1;
  pub const ARGUMENTS: usize = 2;
  pub const TEMPORARIES: usize = 3;
  pub const RECEIVER: usize = 4;
  pub const PC: usize = 5;
  pub const STACK: usize = 6;
  pub const STACK_TOP: usize = 7;
  pub const HOME: usize = 8;
  pub const ALIVE: usize = 9;
  pub const FIELD_COUNT: usize = 10;
}

/// `CONTEXT` is the activation a non-local return from this block
/// unwinds back to, resolved at block-creation time.
pub mod block_field {
  pub const CONTEXT: usize = 0;
  pub const ARGUMENT_COUNT: usize = 1;
  pub const ARGUMENT_LOCATION: usize = 2;
  pub const BYTECODE_POSITION: usize = 3;
  pub const METHOD: usize = 4;
  pub const FIELD_COUNT: usize = 6;
}

pub fn new_block(
  table: &mut ObjectTable,
  context: Ref,
  argument_count: i32,
  argument_location: i32,
  bytecode_position: i32,
  method: Ref,
) -> Result<Ref> {
  let r = table.alloc_ref(block_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, block_field::CONTEXT, context);
  table.set_ref_elem(oop, block_field::ARGUMENT_COUNT, Ref::Int(argument_count));
  table.set_ref_elem(oop, block_field::ARGUMENT_LOCATION, Ref::Int(argument_location));
  table.set_ref_elem(oop, block_field::BYTECODE_POSITION, Ref::Int(bytecode_position));
  table.set_ref_elem(oop, block_field::METHOD, method);
  Ok(r)
}

pub mod process_field {
  pub const STACK: usize = 0;
  pub const STACK_TOP: usize = 1;
  pub const LINK_PTR: usize = 2;
  pub const FIELD_COUNT: usize = 3;
}

pub mod link_field {
  pub const KEY: usize = 0;
  pub const VALUE: usize = 1;
  pub const NEXT: usize = 2;
  pub const FIELD_COUNT: usize = 3;
}

/// Allocate a Class object's reference buffer with its fields set.
pub fn new_class(
  table: &mut ObjectTable,
  name: Ref,
  size: i32,
  methods: Ref,
  super_class: Ref,
  variables: Ref,
) -> Result<Ref> {
  let r = table.alloc_ref(class_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, class_field::NAME, name);
  table.set_ref_elem(oop, class_field::SIZE, Ref::Int(size));
  table.set_ref_elem(oop, class_field::METHODS, methods);
  table.set_ref_elem(oop, class_field::SUPERCLASS, super_class);
  table.set_ref_elem(oop, class_field::VARIABLES, variables);
  Ok(r)
}

#[allow(clippy::too_many_arguments)]
pub fn new_method(
  table: &mut ObjectTable,
  text: Ref,
  message: Ref,
  bytecodes: Ref,
  literals: Ref,
  stack_size: i32,
  temp_size: i32,
  method_class: Ref,
  primitive: Ref,
) -> Result<Ref> {
  let r = table.alloc_ref(method_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, method_field::TEXT, text);
  table.set_ref_elem(oop, method_field::MESSAGE, message);
  table.set_ref_elem(oop, method_field::BYTECODES, bytecodes);
  table.set_ref_elem(oop, method_field::LITERALS, literals);
  table.set_ref_elem(oop, method_field::STACK_SIZE, Ref::Int(stack_size));
  table.set_ref_elem(oop, method_field::TEMP_SIZE, Ref::Int(temp_size));
  table.set_ref_elem(oop, method_field::METHOD_CLASS, method_class);
  table.set_ref_elem(oop, method_field::WATCH, super::NIL);
  table.set_ref_elem(oop, method_field::PRIMITIVE, primitive);
  Ok(r)
}

pub fn new_process(table: &mut ObjectTable, stack: Ref) -> Result<Ref> {
  let r = table.alloc_ref(process_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, process_field::STACK, stack);
  table.set_ref_elem(oop, process_field::STACK_TOP, Ref::Int(0));
  table.set_ref_elem(oop, process_field::LINK_PTR, Ref::Int(0));
  Ok(r)
}

#[allow(clippy::too_many_arguments)]
pub fn new_context(
  table: &mut ObjectTable,
  sender: Ref,
  method: Ref,
  arguments: Ref,
  temporaries: Ref,
  receiver: Ref,
  stack: Ref,
  home: Ref,
) -> Result<Ref> {
  let r = table.alloc_ref(context_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, context_field::SENDER, sender);
  table.set_ref_elem(oop, context_field::METHOD, method);
  table.set_ref_elem(oop, context_field::ARGUMENTS, arguments);
  table.set_ref_elem(oop, context_field::TEMPORARIES, temporaries);
  table.set_ref_elem(oop, context_field::RECEIVER, receiver);
  table.set_ref_elem(oop, context_field::PC, Ref::Int(0));
  table.set_ref_elem(oop, context_field::STACK, stack);
  table.set_ref_elem(oop, context_field::STACK_TOP, Ref::Int(0));
  table.set_ref_elem(oop, context_field::HOME, home);
  table.set_ref_elem(oop, context_field::ALIVE, super::TRUE);
  Ok(r)
}

pub fn new_link(table: &mut ObjectTable, key: Ref, value: Ref, next: Ref) -> Result<Ref> {
  let r = table.alloc_ref(link_field::FIELD_COUNT)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, link_field::KEY, key);
  table.set_ref_elem(oop, link_field::VALUE, value);
  table.set_ref_elem(oop, link_field::NEXT, next);
  Ok(r)
}

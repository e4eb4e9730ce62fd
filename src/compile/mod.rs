//! Bytecode emitter: walks a parsed [`syntax::ast::Method`] and produces
//! a bytecoded `Method` object plus its literal table.
//!
//! Variable resolution follows the bootstrap compiler's `nameTerm`
//! order exactly: self/super, then temporaries, then arguments, then
//! instance variables, then a small set of built-in constant names,
//! and finally (for anything else) a runtime global lookup compiled as
//! `PushLiteral <symbol>; SendUnary #value` — sending `value` to the
//! Symbol itself, which a real image's `Symbol>>value` implements as a
//! global-dictionary lookup. This crate's hand-written bootstrap
//! doesn't ship that method, so an unresolved name surfaces as a
//! `MethodNotFound` at run time rather than a compile error, matching
//! the bootstrap compiler's own behavior (it never rejects an unknown
//! name at compile time either).
//!
//! `ifTrue:`/`ifFalse:`/`ifTrue:ifFalse:`/`ifFalse:ifTrue:`/
//! `whileTrue:`/`and:`/`or:` are recognized here and compiled to the
//! branch-special-opcode sequences the bootstrap compiler's
//! `optimizeBlock`/`keyContinuation` emit, provided their block-literal
//! arguments take no parameters (the common case); anything else
//! compiles as an ordinary send.
//!
//! This crate's compiled blocks are closures over their *home
//! context's* temporaries/arguments array (not a private copy), so
//! `PushTemporary`/`PushArgument` indices are shared across a method
//! and all blocks nested in it — compiling a block literal just
//! reserves a range at the end of the flat temporary list for its
//! params before compiling its body inline into the same bytecode
//! array, with a `Branch` jumping over it at the point of evaluation
//! (exactly as the bootstrap compiler's `block()` does).

use crate::error::{Error, Result};
use crate::object::{self, ObjectTable, Ref, NIL};
use crate::op::{Constant, Emitter, Op, Special};
use syntax::ast::{self, Expr, Message, Stmt};

/// `nil`/`true`/`false`, in the order `nameTerm`'s `glbsyms` table
/// checks them; index `i` compiles to `PushConstant i+5` (constants 0-4
/// are the small-integer and `thisContext` slots).
const GLOBAL_CONSTANTS: [&str; 3] = ["nil", "true", "false"];

const MAKE_BLOCK_PRIMITIVE: u8 = 53;

pub struct CompiledMethod {
  pub method: Ref,
}

/// Compile `ast` into a bytecoded Method object, allocated in `table`
/// and tagged with `method_class` as its defining class.
pub fn compile_method(table: &mut ObjectTable, ast: &ast::Method, instance_vars: &[String], method_class: Ref) -> Result<CompiledMethod> {
  let mut c = Compiler {
    table,
    instance_vars,
    emitter: Emitter::new(),
    literals: Vec::new(),
    arguments: ast.pattern.params().iter().map(|s| s.to_string()).collect(),
    temporaries: ast.temporaries.clone(),
    max_temporaries: ast.temporaries.len(),
  };

  // `<N self arg1 arg2>`: by kernel convention the pragma's argument
  // list is always the receiver followed by the method's own formal
  // parameters in order, so it carries no information beyond the
  // primitive number itself — nothing here to compile. Success skips
  // the body entirely (checked before activation, see `vm::Activation`);
  // failure falls through to the body below as the Smalltalk-level
  // fallback.
  let primitive = match &ast.primitive {
    Some(prim) => Ref::Int(prim.number as i32),
    None => NIL,
  };

  c.compile_statements(&ast.body)?;
  // a method whose body never explicitly returns falls off the end
  // returning self, matching `SelfReturn`'s purpose in the bootstrap.
  c.emitter.special(Special::SelfReturn);

  let text = ast.pattern.selector();
  let selector_sym = object::intern_symbol(c.table, &text)?;
  let stack_size = 16usize; // operand stack never needs to outgrow this plus automatic growth
  let temp_size = c.max_temporaries;

  let bytecodes = c.table.alloc_byte(c.emitter.code.len())?;
  if let Ref::Oop(o) = bytecodes {
    c.table.buf_mut(o).copy_from_slice(&c.emitter.code);
  }
  let literals = c.table.alloc_ref(c.literals.len())?;
  if let Ref::Oop(o) = literals {
    for (i, v) in c.literals.iter().enumerate() {
      c.table.set_ref_elem(o, i, *v);
    }
  }
  let text_obj = c.table.alloc_cstring(&text)?;

  let method = object::new_method(
    c.table,
    text_obj,
    selector_sym,
    bytecodes,
    literals,
    stack_size as i32,
    temp_size as i32,
    method_class,
    primitive,
  )?;
  Ok(CompiledMethod { method })
}

struct Compiler<'a> {
  table: &'a mut ObjectTable,
  instance_vars: &'a [String],
  emitter: Emitter,
  literals: Vec<Ref>,
  arguments: Vec<String>,
  temporaries: Vec<String>,
  max_temporaries: usize,
}

impl<'a> Compiler<'a> {
  fn literal_index(&mut self, value: Ref) -> u32 {
    if let Some(i) = self.literals.iter().position(|&v| v == value) {
      return i as u32;
    }
    self.literals.push(value);
    (self.literals.len() - 1) as u32
  }

  fn symbol_literal(&mut self, name: &str) -> Result<u32> {
    let sym = object::intern_symbol(self.table, name)?;
    Ok(self.literal_index(sym))
  }

  fn emit_integer(&mut self, v: i32) {
    match v {
      -1 => self.emitter.constant(Constant::MinusOne),
      0 => self.emitter.constant(Constant::Zero),
      1 => self.emitter.constant(Constant::One),
      2 => self.emitter.constant(Constant::Two),
      _ => {
        let lit = self.literal_index(Ref::Int(v));
        self.emitter.instruction(Op::PushLiteral, lit);
      }
    }
  }

  fn emit_send(&mut self, selector: &str, num_args: usize, to_super: bool) -> Result<()> {
    self.emitter.instruction(Op::MarkArguments, (1 + num_args) as u32);
    if to_super {
      self.emitter.special(Special::SendToSuper);
    }
    let lit = self.symbol_literal(selector)?;
    self.emitter.instruction(Op::SendMessage, lit);
    Ok(())
  }

  fn compile_statements(&mut self, stmts: &[Stmt]) -> Result<()> {
    if stmts.is_empty() {
      self.emitter.constant(Constant::Nil);
      return Ok(());
    }
    for (i, stmt) in stmts.iter().enumerate() {
      let is_last = i == stmts.len() - 1;
      match stmt {
        Stmt::Expr(e) => {
          self.compile_expr(e)?;
          if !is_last {
            self.emitter.special(Special::PopTop);
          }
        }
        Stmt::Return(e) => {
          self.compile_expr(e)?;
          self.emitter.special(Special::StackReturn);
        }
      }
    }
    Ok(())
  }

  /// Resolve and push `name`, following `nameTerm`'s order: self/super,
  /// temporaries, arguments, instance variables, built-in constants,
  /// then a runtime global lookup for anything left over.
  fn compile_ident(&mut self, name: &str) -> Result<()> {
    if name == "self" || name == "super" {
      self.emitter.instruction(Op::PushArgument, 0);
      return Ok(());
    }
    if let Some(i) = self.temporaries.iter().position(|t| t == name) {
      self.emitter.instruction(Op::PushTemporary, i as u32);
      return Ok(());
    }
    if let Some(i) = self.arguments.iter().position(|a| a == name) {
      self.emitter.instruction(Op::PushArgument, (i + 1) as u32);
      return Ok(());
    }
    if let Some(i) = self.instance_vars.iter().position(|v| v == name) {
      self.emitter.instruction(Op::PushInstance, i as u32);
      return Ok(());
    }
    if let Some(i) = GLOBAL_CONSTANTS.iter().position(|g| *g == name) {
      self.emitter.instruction(Op::PushConstant, (i + 5) as u32);
      return Ok(());
    }
    // unresolved: push the name as a Symbol and ask it for its value at
    // run time.
    let lit = self.symbol_literal(name)?;
    self.emitter.instruction(Op::PushLiteral, lit);
    self.emit_send("value", 0, false)?;
    Ok(())
  }

  fn compile_assign(&mut self, name: &str, value: &Expr) -> Result<()> {
    self.compile_expr(value)?;
    if let Some(i) = self.temporaries.iter().position(|t| t == name) {
      self.emitter.instruction(Op::AssignTemporary, i as u32);
      return Ok(());
    }
    if let Some(i) = self.instance_vars.iter().position(|v| v == name) {
      self.emitter.instruction(Op::AssignInstance, i as u32);
      return Ok(());
    }
    Err(Error::Corrupt("assignment to an unknown variable"))
  }

  fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
    match expr {
      Expr::SelfRef(_) | Expr::SuperRef(_) => {
        self.emitter.instruction(Op::PushArgument, 0);
      }
      Expr::Ident(name, _) => self.compile_ident(name)?,
      Expr::Int(v, _) => self.emit_integer(*v as i32),
      Expr::Float(v, _) => {
        let bits = self.table.alloc_byte(8)?;
        if let Ref::Oop(o) = bits {
          self.table.buf_mut(o)[..8].copy_from_slice(&v.to_ne_bytes());
        }
        let lit = self.literal_index(bits);
        self.emitter.instruction(Op::PushLiteral, lit);
      }
      Expr::Char(ch, _) => {
        let lit = self.literal_index(Ref::Int(*ch as i32));
        self.emitter.instruction(Op::PushLiteral, lit);
      }
      Expr::Symbol(name, _) => {
        let lit = self.symbol_literal(name)?;
        self.emitter.instruction(Op::PushLiteral, lit);
      }
      Expr::Str(s, _) => {
        let obj = self.table.alloc_cstring(s)?;
        let lit = self.literal_index(obj);
        self.emitter.instruction(Op::PushLiteral, lit);
      }
      Expr::ArrayLit(items, _) => {
        // literal arrays are built once at compile time and referenced
        // by literal index, mirroring `parseArray`'s eager allocation.
        let mut refs = Vec::with_capacity(items.len());
        for item in items {
          refs.push(self.array_literal_element(item)?);
        }
        let arr = self.table.alloc_ref(refs.len())?;
        if let Ref::Oop(o) = arr {
          for (i, v) in refs.into_iter().enumerate() {
            self.table.set_ref_elem(o, i, v);
          }
        }
        let lit = self.literal_index(arr);
        self.emitter.instruction(Op::PushLiteral, lit);
      }
      Expr::BlockLit(block) => self.compile_block(block)?,
      Expr::Assign(name, value, _) => self.compile_assign(name, value)?,
      Expr::Send { receiver, message, .. } => self.compile_send(receiver, message, false)?,
      Expr::Cascade { receiver, first, rest, .. } => {
        // every cascaded message goes to the same original receiver;
        // only the last one's result is kept.
        self.compile_expr(receiver)?;
        let messages: Vec<&Message> = std::iter::once(first).chain(rest.iter().map(|cm| &cm.selector)).collect();
        for (i, message) in messages.iter().enumerate() {
          let is_last = i + 1 == messages.len();
          if !is_last {
            self.emitter.special(Special::Duplicate);
          }
          self.compile_message_on_top(message)?;
          if !is_last {
            self.emitter.special(Special::PopTop);
          }
        }
      }
    }
    Ok(())
  }

  fn array_literal_element(&mut self, expr: &Expr) -> Result<Ref> {
    Ok(match expr {
      Expr::Ident(name, _) => object::intern_symbol(self.table, name)?,
      Expr::Symbol(name, _) => object::intern_symbol(self.table, name)?,
      Expr::Int(v, _) => Ref::Int(*v as i32),
      Expr::Char(ch, _) => Ref::Int(*ch as i32),
      Expr::Str(s, _) => self.table.alloc_cstring(s)?,
      Expr::ArrayLit(items, _) => {
        let mut refs = Vec::with_capacity(items.len());
        for item in items {
          refs.push(self.array_literal_element(item)?);
        }
        let arr = self.table.alloc_ref(refs.len())?;
        if let Ref::Oop(o) = arr {
          for (i, v) in refs.into_iter().enumerate() {
            self.table.set_ref_elem(o, i, v);
          }
        }
        arr
      }
      _ => NIL,
    })
  }

  /// Compile a message already consuming the receiver left on top of
  /// the stack by a preceding cascade step.
  fn compile_message_on_top(&mut self, message: &Message) -> Result<()> {
    match message {
      Message::Unary(sel) => self.emit_send(sel, 0, false)?,
      Message::Binary(sel, arg) => {
        self.compile_expr(arg)?;
        self.emit_send(sel, 1, false)?;
      }
      Message::Keyword(parts) => {
        let selector: String = parts.iter().map(|(k, _)| k.as_str()).collect();
        for (_, arg) in parts {
          self.compile_expr(arg)?;
        }
        self.emit_send(&selector, parts.len(), false)?;
      }
    }
    Ok(())
  }

  fn compile_send(&mut self, receiver: &Expr, message: &Message, to_super: bool) -> Result<()> {
    let to_super = to_super || matches!(receiver, Expr::SuperRef(_));
    if let Message::Keyword(parts) = message {
      let selector: String = parts.iter().map(|(k, _)| k.as_str()).collect();
      if let Some(()) = self.try_compile_optimized(&selector, receiver, parts)? {
        return Ok(());
      }
    }
    self.compile_expr(receiver)?;
    self.compile_message_on_top_super(message, to_super)
  }

  fn compile_message_on_top_super(&mut self, message: &Message, to_super: bool) -> Result<()> {
    match message {
      Message::Unary(sel) => self.emit_send(sel, 0, to_super)?,
      Message::Binary(sel, arg) => {
        self.compile_expr(arg)?;
        self.emit_send(sel, 1, to_super)?;
      }
      Message::Keyword(parts) => {
        let selector: String = parts.iter().map(|(k, _)| k.as_str()).collect();
        for (_, arg) in parts {
          self.compile_expr(arg)?;
        }
        self.emit_send(&selector, parts.len(), to_super)?;
      }
    }
    Ok(())
  }

  /// Recognize `ifTrue:`/`ifFalse:`/`ifTrue:ifFalse:`/`ifFalse:ifTrue:`/
  /// `whileTrue:`/`and:`/`or:`. Returns `Some(())` once compiled,
  /// `None` to fall back to an ordinary send.
  fn try_compile_optimized(&mut self, selector: &str, receiver: &Expr, parts: &[(String, Expr)]) -> Result<Option<()>> {
    match selector {
      "ifTrue:" => {
        self.compile_expr(receiver)?;
        let at_false = self.emitter.branch(Special::BranchIfFalse);
        self.compile_block_arg_or_value(&parts[0].1)?;
        let at_end = self.emitter.branch(Special::Branch);
        self.emitter.patch_branch(at_false, self.emitter.here());
        self.emitter.constant(Constant::Nil);
        self.emitter.patch_branch(at_end, self.emitter.here());
        Ok(Some(()))
      }
      "ifFalse:" => {
        self.compile_expr(receiver)?;
        let at_true = self.emitter.branch(Special::BranchIfTrue);
        self.compile_block_arg_or_value(&parts[0].1)?;
        let at_end = self.emitter.branch(Special::Branch);
        self.emitter.patch_branch(at_true, self.emitter.here());
        self.emitter.constant(Constant::Nil);
        self.emitter.patch_branch(at_end, self.emitter.here());
        Ok(Some(()))
      }
      "ifTrue:ifFalse:" => {
        self.compile_expr(receiver)?;
        let at_false = self.emitter.branch(Special::BranchIfFalse);
        self.compile_block_arg_or_value(&parts[0].1)?;
        let at_end = self.emitter.branch(Special::Branch);
        self.emitter.patch_branch(at_false, self.emitter.here());
        self.compile_block_arg_or_value(&parts[1].1)?;
        self.emitter.patch_branch(at_end, self.emitter.here());
        Ok(Some(()))
      }
      "ifFalse:ifTrue:" => {
        self.compile_expr(receiver)?;
        let at_true = self.emitter.branch(Special::BranchIfTrue);
        self.compile_block_arg_or_value(&parts[0].1)?;
        let at_end = self.emitter.branch(Special::Branch);
        self.emitter.patch_branch(at_true, self.emitter.here());
        self.compile_block_arg_or_value(&parts[1].1)?;
        self.emitter.patch_branch(at_end, self.emitter.here());
        Ok(Some(()))
      }
      "whileTrue:" => {
        let Expr::BlockLit(cond) = receiver else { return Ok(None) };
        if !cond.params.is_empty() {
          return Ok(None);
        }
        let loop_start = self.emitter.here();
        self.compile_inline_block_statements(cond)?;
        let at_exit = self.emitter.branch(Special::BranchIfFalse);
        self.compile_block_arg_or_value(&parts[0].1)?;
        self.emitter.special(Special::PopTop);
        let back = self.emitter.branch(Special::Branch);
        self.emitter.patch_branch(back, loop_start);
        self.emitter.patch_branch(at_exit, self.emitter.here());
        self.emitter.constant(Constant::Nil);
        Ok(Some(()))
      }
      "and:" => {
        self.compile_expr(receiver)?;
        let at = self.emitter.branch(Special::AndBranch);
        self.compile_block_arg_or_value(&parts[0].1)?;
        self.emitter.patch_branch(at, self.emitter.here());
        Ok(Some(()))
      }
      "or:" => {
        self.compile_expr(receiver)?;
        let at = self.emitter.branch(Special::OrBranch);
        self.compile_block_arg_or_value(&parts[0].1)?;
        self.emitter.patch_branch(at, self.emitter.here());
        Ok(Some(()))
      }
      _ => Ok(None),
    }
  }

  /// Compile a keyword-message argument that is expected to be a
  /// zero-argument block literal: inline its statements directly (no
  /// new activation) if it is one, else evaluate it and send `value`.
  fn compile_block_arg_or_value(&mut self, arg: &Expr) -> Result<()> {
    if let Expr::BlockLit(block) = arg {
      if block.params.is_empty() {
        return self.compile_inline_block_statements(block);
      }
    }
    self.compile_expr(arg)?;
    self.emit_send("value", 0, false)?;
    Ok(())
  }

  /// Compile a block's statements directly into the current bytecode
  /// stream, sharing the enclosing scope's temporaries — used for
  /// inlined control-message arguments, which never need their own
  /// activation since they run synchronously in place.
  fn compile_inline_block_statements(&mut self, block: &ast::Block) -> Result<()> {
    if !block.temporaries.is_empty() {
      // an inlined control block declaring its own temporaries still
      // needs storage; extend the flat temporary list for it.
      for t in &block.temporaries {
        self.temporaries.push(t.clone());
      }
      self.max_temporaries = self.max_temporaries.max(self.temporaries.len());
    }
    self.compile_statements(&block.body)
  }

  /// Compile a real block literal: reserve flat temporary slots for
  /// its parameters, compile its body inline (skipped over at the
  /// creation site with a `Branch`), and emit the bytecode that
  /// constructs the runtime Block value referencing it.
  fn compile_block(&mut self, block: &ast::Block) -> Result<()> {
    let argument_location = self.temporaries.len();
    for p in &block.params {
      self.temporaries.push(p.clone());
    }
    for t in &block.temporaries {
      self.temporaries.push(t.clone());
    }
    self.max_temporaries = self.max_temporaries.max(self.temporaries.len());
    let argument_count = block.params.len();

    let branch_at = self.emitter.branch(Special::Branch);
    let bytecode_position = self.emitter.here();
    self.compile_statements(&block.body)?;
    self.emitter.special(Special::StackReturn);
    self.emitter.patch_branch(branch_at, self.emitter.here());

    self.emitter.constant(Constant::Context);
    self.emit_integer(argument_count as i32);
    self.emit_integer(argument_location as i32);
    self.emit_integer(bytecode_position as i32);
    self.emitter.instruction(Op::DoPrimitive, 3);
    self.emitter.byte(MAKE_BLOCK_PRIMITIVE);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::object::{method_field, ObjectTable};
  use crate::op;

  fn fresh_table() -> ObjectTable {
    let mut t = ObjectTable::new();
    // nil/true/false take slots 1..3 by convention; new_dictionary then
    // allocates the symbol table (slot 4) and its wrapper (slot 5).
    for _ in 0..3 {
      t.alloc_ref(0).unwrap();
    }
    let dict = object::new_dictionary(&mut t, object::DEFAULT_BUCKETS).unwrap();
    assert_eq!(dict, object::SYMBOLS);
    t
  }

  #[test]
  fn compiles_unary_method_returning_self() {
    let mut table = fresh_table();
    let ast = syntax::parse("foo ^self").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    let bytecodes = table.get_ref_elem(method_oop, method_field::BYTECODES).as_oop().unwrap();
    let text = op::disassemble(table.buf(bytecodes));
    assert!(text.contains("PushArgument 0"));
    assert!(text.contains("StackReturn"));
  }

  #[test]
  fn compiles_integer_addition() {
    let mut table = fresh_table();
    let ast = syntax::parse("foo ^3 + 4").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    let bytecodes = table.get_ref_elem(method_oop, method_field::BYTECODES).as_oop().unwrap();
    let text = op::disassemble(table.buf(bytecodes));
    assert!(text.contains("SendMessage"));
  }

  #[test]
  fn compiles_if_true_if_false() {
    let mut table = fresh_table();
    let ast = syntax::parse("foo ^true ifTrue: [1] ifFalse: [2]").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    let bytecodes = table.get_ref_elem(method_oop, method_field::BYTECODES).as_oop().unwrap();
    let text = op::disassemble(table.buf(bytecodes));
    assert!(text.contains("DoSpecial 7") || text.contains("DoSpecial 8"));
  }

  #[test]
  fn embedded_primitive_pragma_is_metadata_not_bytecode() {
    let mut table = fresh_table();
    let ast = syntax::parse("+ aNumber <10 self aNumber>").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    assert_eq!(table.get_ref_elem(method_oop, method_field::PRIMITIVE), Ref::Int(10));
    let bytecodes = table.get_ref_elem(method_oop, method_field::BYTECODES).as_oop().unwrap();
    let text = op::disassemble(table.buf(bytecodes));
    assert!(!text.contains("DoPrimitive"));
  }

  #[test]
  fn method_without_primitive_pragma_has_nil_primitive() {
    let mut table = fresh_table();
    let ast = syntax::parse("foo ^self").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    assert_eq!(table.get_ref_elem(method_oop, method_field::PRIMITIVE), NIL);
  }

  #[test]
  fn compiles_block_literal_with_branch_skip() {
    let mut table = fresh_table();
    let ast = syntax::parse("foo ^[:x | x] value: 1").unwrap();
    let compiled = compile_method(&mut table, &ast, &[], NIL).unwrap();
    let method_oop = compiled.method.as_oop().unwrap();
    let bytecodes = table.get_ref_elem(method_oop, method_field::BYTECODES).as_oop().unwrap();
    let text = op::disassemble(table.buf(bytecodes));
    assert!(text.contains("DoPrimitive"));
  }
}

//! The bytecode interpreter.
//!
//! Every activation (method or block) is a reified [`object::class::context_field`]
//! object rather than a raw process-stack frame: this trades the fast
//! path the bootstrap image's stack/context duality bought in exchange
//! for treating "reify this activation" ([`Constant::Context`]) and
//! non-local return uniformly instead of as two representations of the
//! same thing. A Context's `HOME` field points at itself for an
//! ordinary method activation and at the enclosing method's context for
//! a block activation; a `^expr` return inside a block walks straight
//! to `HOME`'s sender and fails with [`Error::BadReturn`] if `HOME` has
//! already returned.
//!
//! The rest of the design is a direct translation of the bootstrap
//! interpreter's `execState` record and bytecode handlers: operand
//! fetch order (instance var, argument, temporary, literal, constant),
//! `MarkArguments` + `SendMessage`/`SendUnary`/`SendBinary`, primitive
//! dispatch with bytecode fallthrough on failure, and the `DoSpecial`
//! sub-operations (`SelfReturn`, `StackReturn`, `Duplicate`, `PopTop`,
//! the four branch forms, `SendToSuper`).

mod cache;

pub use cache::MethodCache;

use crate::error::{Error, Result};
use crate::object::{self, class_field, context_field, method_field, ObjectTable, Ref, FALSE, NIL, TRUE};
use crate::op::{self, Constant, Op, Special};
use crate::primitive::{self, Io};

const STACK_GROWTH: usize = 128;

/// Handles to bootstrap classes the interpreter core must recognize
/// structurally (as opposed to classes only primitives care about).
#[derive(Clone, Copy)]
pub struct Classes {
  pub small_integer: Ref,
  pub block_context: Ref,
}

/// Outcome of running a process for up to its time-slice budget.
#[derive(Debug)]
pub enum RunResult {
  /// The top-level activation returned; the process is done.
  Finished(Ref),
  /// The budget ran out with the process still runnable; its current
  /// context has been saved back onto the process object.
  Suspended,
}

/// Result of [`Interpreter::try_activate`].
enum Activation {
  /// An ordinary Context was created and is ready to run from pc 0.
  Running(u32),
  /// The method's embedded primitive succeeded; no Context was needed.
  Primitive(Ref),
}

pub struct Interpreter {
  pub cache: MethodCache,
  pub io: Io,
}

impl Default for Interpreter {
  fn default() -> Self {
    Self::new()
  }
}

impl Interpreter {
  pub fn new() -> Self {
    Interpreter {
      cache: MethodCache::new(),
      io: Io::new(),
    }
  }

  /// Invalidate cached lookups mentioning `selector` — call this after
  /// a method dictionary is mutated (`compile:`, `removeSelector:`, …).
  pub fn flush_selector(&mut self, selector: Ref) {
    self.cache.flush_selector(selector);
  }

  fn class_of(&self, table: &ObjectTable, classes: &Classes, r: Ref) -> Ref {
    match r {
      Ref::Int(_) => classes.small_integer,
      Ref::Oop(o) => table.class_of(o),
    }
  }

  fn lookup_method(&mut self, table: &ObjectTable, start_class: Ref, receiver_class: Ref, selector: Ref) -> Option<(Ref, Ref)> {
    if let Some(hit) = self.cache.lookup(selector, receiver_class) {
      return Some(hit);
    }
    let mut cls = start_class;
    while let Ref::Oop(cls_oop) = cls {
      if let Ref::Oop(methods_oop) = table.get_ref_elem(cls_oop, class_field::METHODS) {
        if let Some(m) = crate::object::lookup_by_symbol(table, methods_oop, selector) {
          self.cache.insert(selector, receiver_class, cls, m);
          return Some((cls, m));
        }
      }
      cls = table.get_ref_elem(cls_oop, class_field::SUPERCLASS);
    }
    None
  }

  /// Create a fresh top-level activation and run it to completion or
  /// until `max_steps` bytecodes have executed.
  pub fn send(
    &mut self,
    table: &mut ObjectTable,
    classes: &Classes,
    selector: Ref,
    receiver: Ref,
    args: &[Ref],
    max_steps: i64,
  ) -> Result<RunResult> {
    let receiver_class = self.class_of(table, classes, receiver);
    let (method, call_args) = self.resolve_send(table, receiver_class, receiver_class, receiver, selector, args)?;
    match self.try_activate(table, classes, method, receiver, &call_args, NIL, NIL)? {
      Activation::Primitive(result) => Ok(RunResult::Finished(result)),
      Activation::Running(ctx) => self.run(table, classes, ctx, max_steps),
    }
  }

  /// Resolve `selector` against `start_class`, falling back to
  /// `message:notRecognizedWithArguments:` on the receiver's own class
  /// when lookup is exhausted. Returns the method to run along with the
  /// arguments to pass it (the original `args`, or `[selector, arguments
  /// Array]` when the fallback was taken). Fails only when both lookups
  /// miss.
  fn resolve_send(
    &mut self,
    table: &mut ObjectTable,
    start_class: Ref,
    receiver_class: Ref,
    receiver: Ref,
    selector: Ref,
    args: &[Ref],
  ) -> Result<(Ref, Vec<Ref>)> {
    if let Some((_, method)) = self.lookup_method(table, start_class, receiver_class, selector) {
      return Ok((method, args.to_vec()));
    }
    let not_recognized = crate::object::intern_symbol(table, "message:notRecognizedWithArguments:")?;
    if let Some((_, method)) = self.lookup_method(table, receiver_class, receiver_class, not_recognized) {
      let arguments = table.alloc_ref(args.len())?;
      if let Ref::Oop(a) = arguments {
        for (i, v) in args.iter().enumerate() {
          table.set_ref_elem(a, i, *v);
        }
      }
      return Ok((method, vec![selector, arguments]));
    }
    Err(Error::MethodNotFound {
      receiver: format!("{receiver:?}"),
      selector: format!("{selector:?}"),
    })
  }

  /// Resume a previously-[`RunResult::Suspended`] activation.
  pub fn resume(&mut self, table: &mut ObjectTable, classes: &Classes, ctx: Ref, max_steps: i64) -> Result<RunResult> {
    let ctx_oop = ctx.as_oop().ok_or(Error::Corrupt("resume target is not a context"))?;
    self.run(table, classes, ctx_oop, max_steps)
  }

  /// Outcome of attempting to activate a method: either a real context
  /// was created, or the method's embedded primitive pragma already
  /// produced a final value and no context was needed at all.
  fn try_activate(
    &mut self,
    table: &mut ObjectTable,
    classes: &Classes,
    method: Ref,
    receiver: Ref,
    args: &[Ref],
    sender: Ref,
    home: Ref,
  ) -> Result<Activation> {
    let method_oop = method.as_oop().ok_or(Error::Corrupt("method is not an object"))?;

    if table.get_ref_elem(method_oop, method_field::WATCH) != NIL {
      let (watch_method, watch_args) = self.resolve_watched_send(table, classes, method, receiver, args)?;
      return self.try_activate(table, classes, watch_method, method, &watch_args, sender, home);
    }

    if let Ref::Int(primitive_number) = table.get_ref_elem(method_oop, method_field::PRIMITIVE) {
      if let Some(result) = primitive::dispatch(table, &mut self.io, classes, primitive_number as u8, receiver, args)? {
        return Ok(Activation::Primitive(result));
      }
      // primitive failed: fall through to the method's Smalltalk-level
      // fallback body, same as `DoPrimitive`'s in-line failure path.
    }
    let ctx = self.activate(table, method, receiver, args, sender, home)?;
    Ok(Activation::Running(ctx))
  }

  /// A watched method's send is diverted to `watchWith:` sent to the
  /// method object itself, with a single Array argument holding the
  /// original receiver followed by its arguments. The method stays
  /// write-only data otherwise; nothing here ever sets `watch` — a
  /// debugger would, through the same `basicAt:put:` path any instance
  /// variable is written through.
  fn resolve_watched_send(
    &mut self,
    table: &mut ObjectTable,
    classes: &Classes,
    method: Ref,
    receiver: Ref,
    args: &[Ref],
  ) -> Result<(Ref, Vec<Ref>)> {
    let arguments = table.alloc_ref(args.len() + 1)?;
    if let Ref::Oop(a) = arguments {
      table.set_ref_elem(a, 0, receiver);
      for (i, v) in args.iter().enumerate() {
        table.set_ref_elem(a, i + 1, *v);
      }
    }
    let watch_with = crate::object::intern_symbol(table, "watchWith:")?;
    let method_class = self.class_of(table, classes, method);
    let (_, watch_method) =
      self
        .lookup_method(table, method_class, method_class, watch_with)
        .ok_or_else(|| Error::MethodNotFound {
          receiver: format!("{method:?}"),
          selector: "watchWith:".to_string(),
        })?;
    Ok((watch_method, vec![arguments]))
  }

  /// Build a fresh Context object for a call to `method` on `receiver`
  /// with `args`, chained to `sender`. `home` should be `NIL` for an
  /// ordinary method call (the new context becomes its own home).
  fn activate(
    &self,
    table: &mut ObjectTable,
    method: Ref,
    receiver: Ref,
    args: &[Ref],
    sender: Ref,
    home: Ref,
  ) -> Result<u32> {
    let method_oop = method.as_oop().ok_or(Error::Corrupt("method is not an object"))?;
    let temp_size = table
      .get_ref_elem(method_oop, method_field::TEMP_SIZE)
      .as_int()
      .unwrap_or(0) as usize;
    let stack_size = table
      .get_ref_elem(method_oop, method_field::STACK_SIZE)
      .as_int()
      .unwrap_or(0) as usize;

    let arg_array = table.alloc_ref(args.len())?;
    if let Ref::Oop(a) = arg_array {
      for (i, v) in args.iter().enumerate() {
        table.set_ref_elem(a, i, *v);
      }
    }
    let temps = table.alloc_ref(temp_size)?;
    let stack = table.alloc_ref((stack_size + 6).max(STACK_GROWTH))?;

    let ctx = crate::object::new_context(table, sender, method, arg_array, temps, receiver, stack, NIL)?;
    let ctx_oop = ctx.as_oop().unwrap();
    let home_ref = if home.is_nil() { ctx } else { home };
    table.set_ref_elem(ctx_oop, context_field::HOME, home_ref);
    Ok(ctx_oop)
  }

  /// Activate `block`, binding `args` into its home context's
  /// temporaries at the block's reserved offset. Blocks resolve
  /// variables against their home context's arguments/temporaries
  /// directly rather than copying them — classic Smalltalk-80 block
  /// semantics, inherited along with its caveat that a block is not
  /// safely reentrant while a previous activation of it is still live.
  fn activate_block(&self, table: &mut ObjectTable, block_oop: u32, args: &[Ref], sender: Ref) -> Result<u32> {
    let home = table.get_ref_elem(block_oop, object::block_field::CONTEXT);
    let home_oop = home.as_oop().ok_or(Error::Corrupt("block has no home context"))?;
    if table.get_ref_elem(home_oop, context_field::ALIVE) != TRUE {
      return Err(Error::BadReturn);
    }
    let argument_location = table
      .get_ref_elem(block_oop, object::block_field::ARGUMENT_LOCATION)
      .as_int()
      .unwrap_or(0) as usize;
    let argument_count = table
      .get_ref_elem(block_oop, object::block_field::ARGUMENT_COUNT)
      .as_int()
      .unwrap_or(0) as usize;
    if args.len() != argument_count {
      return Err(Error::ProcessFailed(format!(
        "block expects {argument_count} argument(s), got {}",
        args.len()
      )));
    }
    let home_temps = table
      .get_ref_elem(home_oop, context_field::TEMPORARIES)
      .as_oop()
      .ok_or(Error::Corrupt("home context has no temporaries"))?;
    for (i, v) in args.iter().enumerate() {
      table.set_ref_elem(home_temps, argument_location + i, *v);
    }
    let bytecode_position = table.get_ref_elem(block_oop, object::block_field::BYTECODE_POSITION);
    let receiver = table.get_ref_elem(home_oop, context_field::RECEIVER);
    let arguments = table.get_ref_elem(home_oop, context_field::ARGUMENTS);
    let stack = table.alloc_ref(STACK_GROWTH)?;

    let ctx = object::new_context(
      table,
      sender,
      Ref::Oop(block_oop),
      arguments,
      Ref::Oop(home_temps),
      receiver,
      stack,
      home,
    )?;
    let ctx_oop = ctx.as_oop().unwrap();
    table.set_ref_elem(ctx_oop, context_field::PC, bytecode_position);
    Ok(ctx_oop)
  }

  fn activation_bytecode_and_literals(&self, table: &ObjectTable, classes: &Classes, ctx_oop: u32) -> Result<(u32, u32, u32)> {
    let m = table.get_ref_elem(ctx_oop, context_field::METHOD);
    let m_oop = m.as_oop().ok_or(Error::Corrupt("context has no method"))?;
    let method_oop = if table.class_of(m_oop) == classes.block_context {
      table
        .get_ref_elem(m_oop, crate::object::block_field::METHOD)
        .as_oop()
        .ok_or(Error::Corrupt("block has no owning method"))?
    } else {
      m_oop
    };
    let bytecodes = table
      .get_ref_elem(method_oop, method_field::BYTECODES)
      .as_oop()
      .ok_or(Error::Corrupt("method has no bytecodes"))?;
    let literals = table
      .get_ref_elem(method_oop, method_field::LITERALS)
      .as_oop()
      .ok_or(Error::Corrupt("method has no literals"))?;
    Ok((bytecodes, literals, method_oop))
  }

  fn push(&self, table: &mut ObjectTable, ctx_oop: u32, value: Ref) -> Result<()> {
    let top = table.get_ref_elem(ctx_oop, context_field::STACK_TOP).as_int().unwrap_or(0);
    let stack_oop = table.get_ref_elem(ctx_oop, context_field::STACK).as_oop().unwrap();
    if top as usize >= table.element_count(stack_oop) {
      self.grow_stack(table, ctx_oop, stack_oop)?;
    }
    let stack_oop = table.get_ref_elem(ctx_oop, context_field::STACK).as_oop().unwrap();
    table.set_ref_elem(stack_oop, top as usize, value);
    table.set_ref_elem(ctx_oop, context_field::STACK_TOP, Ref::Int(top + 1));
    Ok(())
  }

  /// Enlarge `ctx_oop`'s operand stack Array; the only failure mode is
  /// allocator exhaustion, which is fatal (propagated as
  /// [`Error::OutOfMemory`]).
  fn grow_stack(&self, table: &mut ObjectTable, ctx_oop: u32, old_stack: u32) -> Result<()> {
    let old_count = table.element_count(old_stack);
    let new = table.alloc_ref(old_count + STACK_GROWTH)?;
    if let Ref::Oop(n) = new {
      for i in 0..old_count {
        let v = table.get_ref_elem(old_stack, i);
        table.set_ref_elem(n, i, v);
      }
    }
    table.set_ref_elem(ctx_oop, context_field::STACK, new);
    Ok(())
  }

  fn pop(&self, table: &mut ObjectTable, ctx_oop: u32) -> Ref {
    let top = table.get_ref_elem(ctx_oop, context_field::STACK_TOP).as_int().unwrap_or(0);
    if top <= 0 {
      return NIL;
    }
    let stack_oop = table.get_ref_elem(ctx_oop, context_field::STACK).as_oop().unwrap();
    let v = table.get_ref_elem(stack_oop, (top - 1) as usize);
    table.set_ref_elem(ctx_oop, context_field::STACK_TOP, Ref::Int(top - 1));
    v
  }

  fn top(&self, table: &ObjectTable, ctx_oop: u32) -> Ref {
    let top = table.get_ref_elem(ctx_oop, context_field::STACK_TOP).as_int().unwrap_or(0);
    if top <= 0 {
      return NIL;
    }
    let stack_oop = table.get_ref_elem(ctx_oop, context_field::STACK).as_oop().unwrap();
    table.get_ref_elem(stack_oop, (top - 1) as usize)
  }

  /// The main dispatch loop. Runs until the top-level activation
  /// returns or `max_steps` is exhausted.
  fn run(&mut self, table: &mut ObjectTable, classes: &Classes, mut ctx_oop: u32, max_steps: i64) -> Result<RunResult> {
    let mut steps_left = max_steps;
    let mut marked_args: usize = 0;
    let mut send_to_super = false;

    loop {
      if steps_left <= 0 {
        return Ok(RunResult::Suspended);
      }
      steps_left -= 1;

      let (bytecodes_oop, literals_oop, method_oop) = self.activation_bytecode_and_literals(table, classes, ctx_oop)?;
      let pc = table.get_ref_elem(ctx_oop, context_field::PC).as_int().unwrap_or(0) as usize;
      let code = table.buf(bytecodes_oop).to_vec();
      let Some(d) = op::decode(&code, pc) else {
        return Err(Error::Corrupt("bytecode offset out of range"));
      };

      let mut next_pc = d.next_pc;
      table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));

      match d.op {
        Op::Extended => unreachable!("decode resolves Extended"),

        Op::PushInstance => {
          let receiver = table.get_ref_elem(ctx_oop, context_field::RECEIVER);
          let v = match receiver {
            Ref::Oop(r) => table.get_ref_elem(r, d.low as usize),
            Ref::Int(_) => NIL,
          };
          self.push(table, ctx_oop, v)?;
        }
        Op::PushArgument => {
          let args_oop = table.get_ref_elem(ctx_oop, context_field::ARGUMENTS).as_oop().unwrap();
          let v = table.get_ref_elem(args_oop, d.low as usize);
          self.push(table, ctx_oop, v)?;
        }
        Op::PushTemporary => {
          let temps_oop = table.get_ref_elem(ctx_oop, context_field::TEMPORARIES).as_oop().unwrap();
          let v = table.get_ref_elem(temps_oop, d.low as usize);
          self.push(table, ctx_oop, v)?;
        }
        Op::PushLiteral => {
          let v = table.get_ref_elem(literals_oop, d.low as usize);
          self.push(table, ctx_oop, v)?;
        }
        Op::PushConstant => {
          let c = Constant::from_low(d.low).ok_or(Error::Corrupt("bad PushConstant operand"))?;
          let v = match c {
            Constant::Zero => Ref::Int(0),
            Constant::One => Ref::Int(1),
            Constant::Two => Ref::Int(2),
            Constant::MinusOne => Ref::Int(-1),
            Constant::Context => Ref::Oop(ctx_oop),
            Constant::Nil => NIL,
            Constant::True => TRUE,
            Constant::False => FALSE,
          };
          self.push(table, ctx_oop, v)?;
        }
        Op::AssignInstance => {
          let v = self.top(table, ctx_oop);
          let receiver = table.get_ref_elem(ctx_oop, context_field::RECEIVER);
          if let Ref::Oop(r) = receiver {
            table.set_ref_elem(r, d.low as usize, v);
          }
        }
        Op::AssignTemporary => {
          let v = self.top(table, ctx_oop);
          let temps_oop = table.get_ref_elem(ctx_oop, context_field::TEMPORARIES).as_oop().unwrap();
          table.set_ref_elem(temps_oop, d.low as usize, v);
        }
        Op::MarkArguments => {
          marked_args = d.low as usize;
        }
        Op::SendMessage | Op::SendUnary | Op::SendBinary => {
          let selector = table.get_ref_elem(literals_oop, d.low as usize);
          let n = marked_args;
          marked_args = 0;
          let mut frame = Vec::with_capacity(n);
          for _ in 0..n {
            frame.push(self.pop(table, ctx_oop));
          }
          frame.reverse();
          let receiver = frame.remove(0);
          let args = frame;

          let receiver_class = self.class_of(table, classes, receiver);

          // A Block's only protocol in this bootstrap is `value`/
          // `value:`/…; rather than route it through method-dictionary
          // lookup, any send to a Block receiver activates it directly
          // with the popped arguments.
          if receiver_class == classes.block_context {
            send_to_super = false;
            let block_oop = receiver.as_oop().ok_or(Error::Corrupt("block value receiver is not an object"))?;
            let new_ctx = self.activate_block(table, block_oop, &args, Ref::Oop(ctx_oop))?;
            ctx_oop = new_ctx;
            continue;
          }

          let start_class = if send_to_super {
            let defining_class = table.get_ref_elem(method_oop, method_field::METHOD_CLASS);
            table.get_ref_elem(defining_class.as_oop().unwrap(), class_field::SUPERCLASS)
          } else {
            receiver_class
          };
          send_to_super = false;

          let (target_method, call_args) = self.resolve_send(table, start_class, receiver_class, receiver, selector, &args)?;

          match self.try_activate(table, classes, target_method, receiver, &call_args, Ref::Oop(ctx_oop), NIL)? {
            Activation::Primitive(result) => {
              self.push(table, ctx_oop, result)?;
              continue;
            }
            Activation::Running(new_ctx) => {
              ctx_oop = new_ctx;
              continue;
            }
          }
        }
        Op::DoPrimitive => {
          let primitive_number = *code.get(next_pc).ok_or(Error::Corrupt("missing primitive number"))?;
          next_pc += 1;
          table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));
          let n = d.low as usize;
          let mut args = Vec::with_capacity(n);
          for _ in 0..n {
            args.push(self.pop(table, ctx_oop));
          }
          args.reverse();
          let receiver = self.pop(table, ctx_oop);
          match primitive::dispatch(table, &mut self.io, classes, primitive_number, receiver, &args)? {
            Some(result) => self.push(table, ctx_oop, result)?,
            None => {
              // primitive failed: fall through to whatever bytecodes
              // follow (the method's Smalltalk-level fallback body,
              // compiled to re-fetch its own operands rather than
              // expect them still sitting on the stack)
            }
          }
        }
        Op::DoSpecial => {
          let special = Special::from_u8(d.low).ok_or(Error::Corrupt("bad DoSpecial operand"))?;
          match special {
            Special::SelfReturn => {
              let receiver = table.get_ref_elem(ctx_oop, context_field::RECEIVER);
              match self.unwind(table, ctx_oop, receiver)? {
                Unwound::Finished(result) => return Ok(RunResult::Finished(result)),
                Unwound::Resume(next) => ctx_oop = next,
              }
              continue;
            }
            Special::StackReturn => {
              let value = self.pop(table, ctx_oop);
              match self.unwind(table, ctx_oop, value)? {
                Unwound::Finished(result) => return Ok(RunResult::Finished(result)),
                Unwound::Resume(next) => ctx_oop = next,
              }
              continue;
            }
            Special::Duplicate => {
              let v = self.top(table, ctx_oop);
              self.push(table, ctx_oop, v)?;
            }
            Special::PopTop => {
              self.pop(table, ctx_oop);
            }
            Special::Branch => {
              let target = *code.get(next_pc).ok_or(Error::Corrupt("missing branch operand"))?;
              table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(target as i32 - 1));
              continue;
            }
            Special::BranchIfTrue => {
              let target = *code.get(next_pc).ok_or(Error::Corrupt("missing branch operand"))?;
              next_pc += 1;
              let cond = self.pop(table, ctx_oop);
              if cond == TRUE {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(target as i32 - 1));
                continue;
              } else {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));
              }
            }
            Special::BranchIfFalse => {
              let target = *code.get(next_pc).ok_or(Error::Corrupt("missing branch operand"))?;
              next_pc += 1;
              let cond = self.pop(table, ctx_oop);
              if cond == FALSE {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(target as i32 - 1));
                continue;
              } else {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));
              }
            }
            Special::AndBranch => {
              let target = *code.get(next_pc).ok_or(Error::Corrupt("missing branch operand"))?;
              next_pc += 1;
              let v = self.pop(table, ctx_oop);
              if v == FALSE {
                self.push(table, ctx_oop, FALSE)?;
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(target as i32 - 1));
                continue;
              } else {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));
              }
            }
            Special::OrBranch => {
              let target = *code.get(next_pc).ok_or(Error::Corrupt("missing branch operand"))?;
              next_pc += 1;
              let v = self.pop(table, ctx_oop);
              if v == TRUE {
                self.push(table, ctx_oop, TRUE)?;
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(target as i32 - 1));
                continue;
              } else {
                table.set_ref_elem(ctx_oop, context_field::PC, Ref::Int(next_pc as i32));
              }
            }
            Special::SendToSuper => {
              send_to_super = true;
            }
          }
        }
      }
    }
  }

  /// Unwind `ctx_oop`, returning `value` to its sender: either the
  /// activation that sent the message (ordinary return) or, for a
  /// non-local return from inside a block, `HOME`'s sender. Fails if
  /// `HOME` has already returned.
  fn unwind(&self, table: &mut ObjectTable, ctx_oop: u32, value: Ref) -> Result<Unwound> {
    let home = table.get_ref_elem(ctx_oop, context_field::HOME);
    let is_block = home != Ref::Oop(ctx_oop);

    let (target, dying) = if is_block {
      let home_oop = home.as_oop().ok_or(Error::BadReturn)?;
      if table.get_ref_elem(home_oop, context_field::ALIVE) != TRUE {
        return Err(Error::BadReturn);
      }
      let sender = table.get_ref_elem(home_oop, context_field::SENDER);
      (sender, home_oop)
    } else {
      let sender = table.get_ref_elem(ctx_oop, context_field::SENDER);
      (sender, ctx_oop)
    };
    table.set_ref_elem(dying, context_field::ALIVE, FALSE);

    match target {
      Ref::Oop(sender_oop) => {
        self.push(table, sender_oop, value)?;
        Ok(Unwound::Resume(sender_oop))
      }
      _ => Ok(Unwound::Finished(value)),
    }
  }
}

enum Unwound {
  Finished(Ref),
  Resume(u32),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stack_push_pop_roundtrip() {
    let mut table = ObjectTable::new();
    for _ in 0..5 {
      table.alloc_ref(0).unwrap();
    }
    let interp = Interpreter::new();
    let stack = table.alloc_ref(8).unwrap();
    let method = table.alloc_ref(method_field::FIELD_COUNT).unwrap();
    let args = table.alloc_ref(0).unwrap();
    let temps = table.alloc_ref(0).unwrap();
    let ctx = crate::object::new_context(&mut table, NIL, method, args, temps, NIL, stack, NIL).unwrap();
    let ctx_oop = ctx.as_oop().unwrap();
    interp.push(&mut table, ctx_oop, Ref::Int(7)).unwrap();
    interp.push(&mut table, ctx_oop, Ref::Int(9)).unwrap();
    assert_eq!(interp.pop(&mut table, ctx_oop), Ref::Int(9));
    assert_eq!(interp.pop(&mut table, ctx_oop), Ref::Int(7));
  }
}

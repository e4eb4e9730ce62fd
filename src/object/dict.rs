//! Dictionary / symbol table protocol.
//!
//! A Dictionary wraps one Array of length `3n` (`n` hash buckets of
//! `(key, value, first-link)`); collisions chain through `Link`
//! objects. Lookup and insertion both take an explicit hash value and a
//! caller-supplied key predicate rather than assuming `Ref` equality —
//! symbol interning hashes the *string content* of a not-yet-interned
//! name and compares buffers, while method-dictionary lookups hash an
//! already-interned Symbol's own table index and compare by identity.

use super::class::link_field;
use super::{class, ObjectTable, Ref, NIL, SYMBOLS};
use crate::error::Result;

pub const DEFAULT_BUCKETS: usize = 39;

pub fn new_dictionary(table: &mut ObjectTable, buckets: usize) -> Result<Ref> {
  let array = table.alloc_ref(buckets * 3)?;
  let r = table.alloc_ref(1)?;
  let oop = r.as_oop().unwrap();
  table.set_ref_elem(oop, 0, array);
  Ok(r)
}

fn array_of(table: &ObjectTable, dict_oop: u32) -> Option<u32> {
  table.get_ref_elem(dict_oop, 0).as_oop()
}

fn bucket_count(table: &ObjectTable, dict_oop: u32) -> usize {
  match array_of(table, dict_oop) {
    Some(arr) => table.element_count(arr) / 3,
    None => 0,
  }
}

/// Symbol hash: the object table index itself, safe because symbols
/// are interned and therefore unique.
pub fn symbol_hash(symbol_oop: u32) -> i32 {
  symbol_oop as i32
}

/// String hash: sum of bytes, forced non-negative, right-shifted by 2
/// past 16384 so the result always fits a SmallInt.
pub fn string_hash(bytes: &[u8]) -> i32 {
  let mut h: i32 = 0;
  for &b in bytes {
    h = h.wrapping_add(b as i32);
  }
  if h < 0 {
    h = h.wrapping_neg();
  }
  if h > 16384 {
    h >>= 2;
  }
  h
}

/// Insert `(key, value)` at the bucket given by `hash`. If the
/// straight-line slot is empty or already holds `key` (by `eq`), store
/// in-line; otherwise walk/extend the Link chain. Re-inserting an
/// existing key replaces its value.
pub fn insert_at(
  table: &mut ObjectTable,
  dict_oop: u32,
  hash: i32,
  key: Ref,
  value: Ref,
  eq: impl Fn(&ObjectTable, Ref) -> bool,
) -> Result<()> {
  let n = bucket_count(table, dict_oop);
  if n == 0 {
    return Ok(());
  }
  let arr = array_of(table, dict_oop).unwrap();
  let base = (hash.rem_euclid(n as i32) as usize) * 3;

  let cur_key = table.get_ref_elem(arr, base);
  if cur_key.is_nil() || eq(table, cur_key) {
    table.set_ref_elem(arr, base, key);
    table.set_ref_elem(arr, base + 1, value);
    return Ok(());
  }

  let mut link = table.get_ref_elem(arr, base + 2);
  loop {
    if let Ref::Oop(link_oop) = link {
      let lk = table.get_ref_elem(link_oop, link_field::KEY);
      if eq(table, lk) {
        table.set_ref_elem(link_oop, link_field::VALUE, value);
        return Ok(());
      }
      let next = table.get_ref_elem(link_oop, link_field::NEXT);
      if next.is_nil() {
        let new_link = class::new_link(table, key, value, NIL)?;
        table.set_ref_elem(link_oop, link_field::NEXT, new_link);
        return Ok(());
      }
      link = next;
    } else {
      let new_link = class::new_link(table, key, value, NIL)?;
      table.set_ref_elem(arr, base + 2, new_link);
      return Ok(());
    }
  }
}

/// Find the `(key, value)` pair matching `eq` at bucket `hash`.
pub fn find_at(
  table: &ObjectTable,
  dict_oop: u32,
  hash: i32,
  eq: impl Fn(&ObjectTable, Ref) -> bool,
) -> Option<(Ref, Ref)> {
  let n = bucket_count(table, dict_oop);
  if n == 0 {
    return None;
  }
  let arr = array_of(table, dict_oop)?;
  let base = (hash.rem_euclid(n as i32) as usize) * 3;

  let cur_key = table.get_ref_elem(arr, base);
  if !cur_key.is_nil() && eq(table, cur_key) {
    return Some((cur_key, table.get_ref_elem(arr, base + 1)));
  }

  let mut link = table.get_ref_elem(arr, base + 2);
  while let Ref::Oop(link_oop) = link {
    let lk = table.get_ref_elem(link_oop, link_field::KEY);
    if eq(table, lk) {
      return Some((lk, table.get_ref_elem(link_oop, link_field::VALUE)));
    }
    link = table.get_ref_elem(link_oop, link_field::NEXT);
  }
  None
}

/// Insert keyed by an already-interned Symbol's identity (method
/// dictionaries, and any other Dictionary keyed by a live Symbol oop).
pub fn insert_by_symbol(table: &mut ObjectTable, dict_oop: u32, symbol: Ref, value: Ref) -> Result<()> {
  let hash = match symbol {
    Ref::Oop(i) => symbol_hash(i),
    Ref::Int(v) => v,
  };
  insert_at(table, dict_oop, hash, symbol, value, move |_, k| k == symbol)
}

pub fn lookup_by_symbol(table: &ObjectTable, dict_oop: u32, symbol: Ref) -> Option<Ref> {
  let hash = match symbol {
    Ref::Oop(i) => symbol_hash(i),
    Ref::Int(v) => v,
  };
  find_at(table, dict_oop, hash, move |_, k| k == symbol).map(|(_, v)| v)
}

/// Intern `text`, returning the existing Symbol if one with the same
/// content is already present in the `symbols` table, else allocating
/// and inserting a new one.
pub fn intern_symbol(table: &mut ObjectTable, text: &str) -> Result<Ref> {
  let symbols_oop = SYMBOLS.as_oop().unwrap();
  let hash = string_hash(text.as_bytes());
  let existing = find_at(table, symbols_oop, hash, |t, k| match k {
    Ref::Oop(o) => t.cstring_str(o).map(|s| s == text).unwrap_or(false),
    _ => false,
  });
  if let Some((key, _)) = existing {
    return Ok(key);
  }
  let sym = table.alloc_cstring(text)?;
  insert_at(table, symbols_oop, hash, sym, NIL, move |t, k| match k {
    Ref::Oop(o) => t.cstring_str(o).map(|s| s == text).unwrap_or(false),
    _ => false,
  })?;
  Ok(sym)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::object::ObjectTable;

  fn fresh_table() -> ObjectTable {
    let mut t = ObjectTable::new();
    // nil/true/false/symbol-table/symbols take slots 1..5 by convention;
    // tests only need `symbols` (slot 5) to exist and be addressable.
    for _ in 0..3 {
      t.alloc_ref(0).unwrap(); // nil, true, false placeholders
    }
    let dict = new_dictionary(&mut t, DEFAULT_BUCKETS).unwrap();
    assert_eq!(dict, SYMBOLS);
    t
  }

  #[test]
  fn intern_is_idempotent() {
    let mut t = fresh_table();
    let a = intern_symbol(&mut t, "foo").unwrap();
    let b = intern_symbol(&mut t, "foo").unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn distinct_symbols_differ() {
    let mut t = fresh_table();
    let a = intern_symbol(&mut t, "foo").unwrap();
    let b = intern_symbol(&mut t, "bar").unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn string_hash_is_bounded() {
    let long = "x".repeat(20_000);
    assert!(string_hash(long.as_bytes()) <= 16384 * 4);
  }
}

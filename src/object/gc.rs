//! Mark-sweep collection.
//!
//! The mark phase uses an explicit worklist rather than Rust recursion:
//! Smalltalk object graphs (linked dictionaries, deep contexts) can be
//! deeper than the host stack comfortably allows.

use super::{ObjectTable, Ref, GLOBALS, SYMBOLS};

pub fn collect(table: &mut ObjectTable, all: bool) {
  let mut worklist: Vec<u32> = Vec::new();

  if let Ref::Oop(i) = SYMBOLS {
    worklist.push(i);
  }
  if let Ref::Oop(i) = GLOBALS {
    worklist.push(i);
  }
  if all {
    for i in 1..table.len() as u32 {
      if table.entry(i).volatile {
        worklist.push(i);
      }
    }
  }

  while let Some(oop) = worklist.pop() {
    if oop == 0 || table.entry(oop).marked {
      continue;
    }
    table.entry_mut(oop).marked = true;
    if let Ref::Oop(c) = table.class_of(oop) {
      worklist.push(c);
    }
    if table.entry(oop).has_refs {
      let n = table.element_count(oop);
      for idx in 0..n {
        if let Ref::Oop(child) = table.get_ref_elem(oop, idx) {
          worklist.push(child);
        }
      }
    }
  }

  for i in 1..table.len() as u32 {
    let (avail, marked) = {
      let e = table.entry(i);
      (e.avail, e.marked)
    };
    if avail {
      continue;
    }
    if marked {
      let e = table.entry_mut(i);
      e.marked = false;
      if !all {
        e.volatile = false;
      }
    } else {
      table.push_free(i);
    }
  }
}

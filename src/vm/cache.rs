//! Inline method lookup cache, keyed by `(selector, receiver class)`.

use crate::object::Ref;

const CACHE_SIZE: usize = 211;

#[derive(Clone, Copy)]
struct Slot {
  selector: Ref,
  lookup_class: Ref,
  resolved_class: Ref,
  resolved_method: Ref,
}

const EMPTY: Slot = Slot {
  selector: crate::object::NIL,
  lookup_class: crate::object::NIL,
  resolved_class: crate::object::NIL,
  resolved_method: crate::object::NIL,
};

pub struct MethodCache {
  slots: Vec<Slot>,
}

impl Default for MethodCache {
  fn default() -> Self {
    Self::new()
  }
}

impl MethodCache {
  pub fn new() -> Self {
    MethodCache {
      slots: vec![EMPTY; CACHE_SIZE],
    }
  }

  fn index(selector: Ref, lookup_class: Ref) -> usize {
    let sh = match selector {
      Ref::Oop(i) => i as usize,
      Ref::Int(v) => v as usize,
    };
    let ch = match lookup_class {
      Ref::Oop(i) => i as usize,
      Ref::Int(v) => v as usize,
    };
    sh.wrapping_mul(31).wrapping_add(ch) % CACHE_SIZE
  }

  pub fn lookup(&self, selector: Ref, lookup_class: Ref) -> Option<(Ref, Ref)> {
    let slot = &self.slots[Self::index(selector, lookup_class)];
    if slot.selector == selector && slot.lookup_class == lookup_class {
      Some((slot.resolved_class, slot.resolved_method))
    } else {
      None
    }
  }

  pub fn insert(&mut self, selector: Ref, lookup_class: Ref, resolved_class: Ref, resolved_method: Ref) {
    let idx = Self::index(selector, lookup_class);
    self.slots[idx] = Slot {
      selector,
      lookup_class,
      resolved_class,
      resolved_method,
    };
  }

  /// Evict every slot mentioning `selector` — used when a class's
  /// method dictionary is mutated.
  pub fn flush_selector(&mut self, selector: Ref) {
    for slot in &mut self.slots {
      if slot.selector == selector {
        *slot = EMPTY;
      }
    }
  }

  pub fn flush_all(&mut self) {
    self.slots = vec![EMPTY; CACHE_SIZE];
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::object::Ref;

  #[test]
  fn hit_after_insert() {
    let mut cache = MethodCache::new();
    let sel = Ref::Oop(10);
    let class = Ref::Oop(20);
    cache.insert(sel, class, class, Ref::Oop(99));
    assert_eq!(cache.lookup(sel, class), Some((class, Ref::Oop(99))));
  }

  #[test]
  fn miss_for_unknown_pair() {
    let cache = MethodCache::new();
    assert_eq!(cache.lookup(Ref::Oop(1), Ref::Oop(2)), None);
  }

  #[test]
  fn flush_selector_clears_matching_slots() {
    let mut cache = MethodCache::new();
    let sel = Ref::Oop(10);
    cache.insert(sel, Ref::Oop(20), Ref::Oop(20), Ref::Oop(99));
    cache.flush_selector(sel);
    assert_eq!(cache.lookup(sel, Ref::Oop(20)), None);
  }
}

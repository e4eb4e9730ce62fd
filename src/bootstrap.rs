//! Minimal hand-written kernel, built directly against [`ObjectTable`]
//! rather than loaded from a shipped `.st` image (no kernel source ships
//! with this crate — that's an external bootstrap concern, see
//! [`crate::image::chunk`]). Just enough of the class hierarchy exists
//! here for the interpreter to resolve sends against: `Object` at the
//! root, the handful of classes the interpreter's core structurally
//! depends on ([`Classes::small_integer`], [`Classes::block_context`]),
//! and a small set of arithmetic/comparison/printing methods compiled
//! through the ordinary [`crate::compile::compile_method`] path so the
//! crate's own tests exercise the full pipeline, not a shortcut.

use std::collections::HashMap;

use crate::compile::compile_method;
use crate::error::{Error, Result};
use crate::object::{self, class_field, ObjectTable, Ref, FALSE, NIL, TRUE};
use crate::vm::Classes;

/// A freshly bootstrapped kernel: the object table, the resolved
/// [`Classes`] handles the interpreter needs, and a lookup from class
/// name to its Class oop for anything else a caller (tests, the CLI)
/// wants to instantiate or extend.
pub struct Kernel {
  pub table: ObjectTable,
  pub classes: Classes,
  pub object_class: Ref,
  /// Every class defined so far, by name — seeded with [`CLASS_DEFS`]
  /// and grown by [`define_class`] as a cold-boot layers user classes
  /// on top.
  pub class_names: HashMap<String, Ref>,
  /// Each class's full instance-variable name list, inherited vars
  /// first — what [`crate::compile::compile_method`] needs to resolve
  /// an identifier to an instance-variable slot.
  pub instance_vars: HashMap<String, Vec<String>>,
}

/// Define one new class on top of an already-bootstrapped kernel: looks
/// up `superclass` by name, appends `instance_vars` to its inherited
/// list, and registers the result under `name`.
pub fn define_class(kernel: &mut Kernel, superclass: &str, name: &str, instance_vars: &[String]) -> Result<Ref> {
  let super_class = *kernel
    .class_names
    .get(superclass)
    .ok_or_else(|| Error::ImageLoad(format!("unknown superclass {superclass}")))?;
  let mut vars = kernel.instance_vars.get(superclass).cloned().unwrap_or_default();
  vars.extend(instance_vars.iter().cloned());

  let name_obj = kernel.table.alloc_cstring(name)?;
  let methods = object::new_dictionary(&mut kernel.table, object::DEFAULT_BUCKETS)?;
  let variables = kernel.table.alloc_ref(0)?;
  let class = object::new_class(&mut kernel.table, name_obj, vars.len() as i32, methods, super_class, variables)?;

  kernel.class_names.insert(name.to_string(), class);
  kernel.instance_vars.insert(name.to_string(), vars);
  set_global(&mut kernel.table, name, class)?;
  Ok(class)
}

/// Bind `value` under `name` in the image-wide [`object::GLOBALS`]
/// dictionary, the `Smalltalk`-equivalent namespace a warm restart uses
/// to resolve class handles and top-level names that the image format
/// itself carries no metadata for.
pub fn set_global(table: &mut ObjectTable, name: &str, value: Ref) -> Result<()> {
  let symbol = object::intern_symbol(table, name)?;
  object::insert_by_symbol(table, object::GLOBALS.as_oop().unwrap(), symbol, value)
}

/// Look `name` up in [`object::GLOBALS`].
pub fn get_global(table: &mut ObjectTable, name: &str) -> Option<Ref> {
  let symbol = object::intern_symbol(table, name).ok()?;
  object::lookup_by_symbol(table, object::GLOBALS.as_oop().unwrap(), symbol)
}

/// Resolve the [`Classes`] handles the interpreter core needs from
/// `table`'s [`object::GLOBALS`] dictionary — what a warm restart does
/// in place of re-running [`bootstrap`].
pub fn resolve_classes(table: &mut ObjectTable) -> Result<Classes> {
  let small_integer = get_global(table, "SmallInteger").ok_or_else(|| Error::ImageLoad("missing global SmallInteger".into()))?;
  let block_context = get_global(table, "BlockContext").ok_or_else(|| Error::ImageLoad("missing global BlockContext".into()))?;
  Ok(Classes { small_integer, block_context })
}

/// Compile `source` as a method of `class` (by name, already registered
/// via [`bootstrap`] or [`define_class`]) and install it in the class's
/// method dictionary.
pub fn define_method(kernel: &mut Kernel, class_name: &str, source: &str) -> Result<()> {
  let class = *kernel
    .class_names
    .get(class_name)
    .ok_or_else(|| Error::ImageLoad(format!("unknown class {class_name}")))?;
  let instance_vars = kernel.instance_vars.get(class_name).cloned().unwrap_or_default();
  let ast = syntax::parse(source).map_err(Error::Compile)?;
  let compiled = compile_method(&mut kernel.table, &ast, &instance_vars, class)?;
  let methods_dict = kernel.table.get_ref_elem(class.as_oop().unwrap(), class_field::METHODS);
  let selector = object::intern_symbol(&mut kernel.table, &ast.pattern.selector())?;
  object::insert_by_symbol(&mut kernel.table, methods_dict.as_oop().unwrap(), selector, compiled.method)?;
  Ok(())
}

/// Declare one kernel class: its name, superclass name (`None` for
/// `Object`), and instance-variable-count-beyond-superclass, matching
/// `class_field::SIZE`'s "count including inherited" convention.
struct ClassDef {
  name: &'static str,
  superclass: Option<&'static str>,
  own_vars: usize,
}

const CLASS_DEFS: &[ClassDef] = &[
  ClassDef { name: "Object", superclass: None, own_vars: 0 },
  ClassDef { name: "UndefinedObject", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "Boolean", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "True", superclass: Some("Boolean"), own_vars: 0 },
  ClassDef { name: "False", superclass: Some("Boolean"), own_vars: 0 },
  ClassDef { name: "Magnitude", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "SmallInteger", superclass: Some("Magnitude"), own_vars: 0 },
  ClassDef { name: "Float", superclass: Some("Magnitude"), own_vars: 0 },
  ClassDef { name: "Character", superclass: Some("Magnitude"), own_vars: 0 },
  ClassDef { name: "String", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "Symbol", superclass: Some("String"), own_vars: 0 },
  ClassDef { name: "Array", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "Dictionary", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "BlockContext", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "MethodContext", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "CompiledMethod", superclass: Some("Object"), own_vars: 0 },
  ClassDef { name: "Process", superclass: Some("Object"), own_vars: 0 },
];

/// One kernel method, compiled from ordinary source text the same way
/// user code is compiled.
struct MethodDef {
  class: &'static str,
  source: &'static str,
}

const METHOD_DEFS: &[MethodDef] = &[
  MethodDef { class: "SmallInteger", source: "+ aNumber <10 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "- aNumber <11 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "* aNumber <12 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "/ aNumber <13 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "\\\\ aNumber <14 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "< aNumber <15 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "> aNumber <16 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "<= aNumber <17 self aNumber>" },
  MethodDef { class: "SmallInteger", source: ">= aNumber <18 self aNumber>" },
  MethodDef { class: "SmallInteger", source: "= aNumber <19 self aNumber>" },
  MethodDef { class: "Object", source: "== other <0 self other>" },
  MethodDef { class: "Object", source: "class <1 self>" },
  MethodDef { class: "Object", source: "hash <3 self>" },
  MethodDef { class: "Object", source: "basicAt: index <4 self index>" },
  MethodDef { class: "Object", source: "basicAt: index put: value <5 self index value>" },
  MethodDef { class: "String", source: "hash <30 self>" },
  MethodDef { class: "String", source: ", other <31 self other>" },
  MethodDef { class: "String", source: "asSymbol <33 self>" },
  MethodDef { class: "BlockContext", source: "duplicate <50 self>" },
];

/// Build the kernel. Deterministic: always produces the same object
/// table layout (`nil`/`true`/`false`/symbol table/`symbols` at their
/// reserved indices, followed by one slot per [`CLASS_DEFS`] entry in
/// order), so tests can hardcode expectations about early oops.
pub fn bootstrap() -> Result<Kernel> {
  let mut table = ObjectTable::new();

  // nil, true, false: placeholders first, classed once their classes exist.
  table.alloc_ref(0)?;
  table.alloc_ref(0)?;
  table.alloc_ref(0)?;
  debug_assert_eq!(NIL, Ref::Oop(1));
  debug_assert_eq!(TRUE, Ref::Oop(2));
  debug_assert_eq!(FALSE, Ref::Oop(3));

  object::new_dictionary(&mut table, object::DEFAULT_BUCKETS)?;
  debug_assert_eq!(object::SYMBOLS, Ref::Oop(5));
  object::new_dictionary(&mut table, object::DEFAULT_BUCKETS)?;
  debug_assert_eq!(object::GLOBALS, Ref::Oop(7));

  let mut classes_by_name: HashMap<&'static str, Ref> = HashMap::new();
  let mut instance_vars: HashMap<String, Vec<String>> = HashMap::new();
  for def in CLASS_DEFS {
    let name_obj = table.alloc_cstring(def.name)?;
    let super_class = def.superclass.map(|s| classes_by_name[s]).unwrap_or(NIL);
    let mut vars = def.superclass.and_then(|s| instance_vars.get(s)).cloned().unwrap_or_default();
    vars.resize(vars.len() + def.own_vars, String::new());
    let methods = object::new_dictionary(&mut table, object::DEFAULT_BUCKETS)?;
    let variables = table.alloc_ref(0)?;
    let class = object::new_class(&mut table, name_obj, vars.len() as i32, methods, super_class, variables)?;
    classes_by_name.insert(def.name, class);
    instance_vars.insert(def.name.to_string(), vars);
    set_global(&mut table, def.name, class)?;
  }

  let object_class = classes_by_name["Object"];
  table.set_class(1, classes_by_name["UndefinedObject"]);
  table.set_class(2, classes_by_name["True"]);
  table.set_class(3, classes_by_name["False"]);

  let classes = Classes {
    small_integer: classes_by_name["SmallInteger"],
    block_context: classes_by_name["BlockContext"],
  };

  for def in METHOD_DEFS {
    let ast = syntax::parse(def.source).map_err(crate::error::Error::Compile)?;
    let class = classes_by_name[def.class];
    let ivars = instance_vars.get(def.class).cloned().unwrap_or_default();
    let compiled = compile_method(&mut table, &ast, &ivars, class)?;
    let methods_dict = table.get_ref_elem(class.as_oop().unwrap(), class_field::METHODS);
    let selector = object::intern_symbol(&mut table, &ast.pattern.selector())?;
    object::insert_by_symbol(&mut table, methods_dict.as_oop().unwrap(), selector, compiled.method)?;
  }

  let class_names = classes_by_name.iter().map(|(&name, &class)| (name.to_string(), class)).collect();

  Ok(Kernel { table, classes, object_class, class_names, instance_vars })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bootstrap_resolves_small_integer_arithmetic() {
    let mut kernel = bootstrap().unwrap();
    let mut interp = crate::vm::Interpreter::new();
    let plus = object::intern_symbol(&mut kernel.table, "+").unwrap();
    let result = interp
      .send(&mut kernel.table, &kernel.classes, plus, Ref::Int(2), &[Ref::Int(3)], 10_000)
      .unwrap();
    match result {
      crate::vm::RunResult::Finished(Ref::Int(5)) => {}
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn globals_resolve_classes_after_an_image_roundtrip() {
    let kernel = bootstrap().unwrap();
    let mut bytes = Vec::new();
    crate::image::write_image(&kernel.table, &mut bytes).unwrap();
    let mut restored = crate::image::read_image(&mut &bytes[..]).unwrap();

    let classes = resolve_classes(&mut restored).unwrap();
    assert_eq!(classes.small_integer, kernel.classes.small_integer);
    assert_eq!(classes.block_context, kernel.classes.block_context);
  }

  #[test]
  fn bootstrap_classes_chain_to_object() {
    let kernel = bootstrap().unwrap();
    let small_int_oop = kernel.classes.small_integer.as_oop().unwrap();
    let magnitude = kernel.table.get_ref_elem(small_int_oop, class_field::SUPERCLASS);
    let object_class = kernel.table.get_ref_elem(magnitude.as_oop().unwrap(), class_field::SUPERCLASS);
    assert_eq!(object_class, kernel.object_class);
  }

  #[test]
  fn define_class_and_method_resolves_instance_variable() {
    let mut kernel = bootstrap().unwrap();
    define_class(&mut kernel, "Object", "Point", &["x".to_string(), "y".to_string()]).unwrap();
    define_method(&mut kernel, "Point", "x ^ x").unwrap();

    let point_class = kernel.class_names["Point"];
    let instance = kernel.table.alloc_ref(2).unwrap();
    kernel.table.set_class(instance.as_oop().unwrap(), point_class);
    kernel.table.set_ref_elem(instance.as_oop().unwrap(), 0, Ref::Int(7));

    let mut interp = crate::vm::Interpreter::new();
    let selector = object::intern_symbol(&mut kernel.table, "x").unwrap();
    let result = interp.send(&mut kernel.table, &kernel.classes, selector, instance, &[], 10_000).unwrap();
    match result {
      crate::vm::RunResult::Finished(Ref::Int(7)) => {}
      other => panic!("unexpected result: {other:?}"),
    }
  }
}

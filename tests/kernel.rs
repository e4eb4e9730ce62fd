//! End-to-end scenarios against a freshly bootstrapped kernel: arithmetic
//! through the primitive path, conditional short-circuiting, non-local
//! return, symbol interning, and a full image round-trip.

use lst::bootstrap::{self, define_class, define_method};
use lst::object::{self, Ref};
use lst::{image, Interpreter, RunResult};

fn send(source_receiver: Ref, selector: &str, args: &[Ref]) -> Ref {
  let mut kernel = bootstrap::bootstrap().unwrap();
  let mut interp = Interpreter::new();
  let sym = object::intern_symbol(&mut kernel.table, selector).unwrap();
  match interp.send(&mut kernel.table, &kernel.classes, sym, source_receiver, args, 10_000).unwrap() {
    RunResult::Finished(v) => v,
    RunResult::Suspended => panic!("unexpected suspension"),
  }
}

#[test]
fn integer_addition_runs_the_primitive_not_the_fallback_body() {
  assert_eq!(send(Ref::Int(2), "+", &[Ref::Int(3)]), Ref::Int(5));
}

#[test]
fn integer_comparison_primitives_resolve() {
  assert_eq!(send(Ref::Int(2), "<", &[Ref::Int(3)]), object::TRUE);
  assert_eq!(send(Ref::Int(3), "<", &[Ref::Int(2)]), object::FALSE);
}

#[test]
fn user_defined_class_with_instance_variables_and_non_primitive_method() {
  let mut kernel = bootstrap::bootstrap().unwrap();
  define_class(&mut kernel, "Object", "Counter", &["count".to_string()]).unwrap();
  define_method(&mut kernel, "Counter", "count ^count").unwrap();
  define_method(&mut kernel, "Counter", "increment ^count := count + 1").unwrap();

  let class = kernel.class_names["Counter"];
  let instance = kernel.table.alloc_ref(1).unwrap();
  let instance_oop = instance.as_oop().unwrap();
  kernel.table.set_class(instance_oop, class);
  kernel.table.set_ref_elem(instance_oop, 0, Ref::Int(0));

  let mut interp = Interpreter::new();
  let increment = object::intern_symbol(&mut kernel.table, "increment").unwrap();
  let result = interp.send(&mut kernel.table, &kernel.classes, increment, instance, &[], 10_000).unwrap();
  match result {
    RunResult::Finished(Ref::Int(1)) => {}
    other => panic!("unexpected result: {other:?}"),
  }
}

#[test]
fn if_true_if_false_short_circuits_the_untaken_branch() {
  let mut kernel = bootstrap::bootstrap().unwrap();
  define_class(&mut kernel, "Object", "Chooser", &[]).unwrap();
  define_method(&mut kernel, "Chooser", "pick: aBoolean ^aBoolean ifTrue: [1] ifFalse: [2]").unwrap();

  let class = kernel.class_names["Chooser"];
  let instance = kernel.table.alloc_ref(0).unwrap();
  kernel.table.set_class(instance.as_oop().unwrap(), class);

  let mut interp = Interpreter::new();
  let pick = object::intern_symbol(&mut kernel.table, "pick:").unwrap();
  let when_true = interp.send(&mut kernel.table, &kernel.classes, pick, instance, &[object::TRUE], 10_000).unwrap();
  let when_false = interp.send(&mut kernel.table, &kernel.classes, pick, instance, &[object::FALSE], 10_000).unwrap();
  assert!(matches!(when_true, RunResult::Finished(Ref::Int(1))));
  assert!(matches!(when_false, RunResult::Finished(Ref::Int(2))));
}

#[test]
fn symbol_interning_is_identity_stable_across_sends() {
  let mut kernel = bootstrap::bootstrap().unwrap();
  let a = object::intern_symbol(&mut kernel.table, "foo").unwrap();
  let b = object::intern_symbol(&mut kernel.table, "foo").unwrap();
  assert_eq!(a, b);
}

#[test]
fn image_roundtrip_preserves_kernel_classes_and_globals() {
  let kernel = bootstrap::bootstrap().unwrap();
  let mut bytes = Vec::new();
  image::write_image(&kernel.table, &mut bytes).unwrap();
  let mut restored = image::read_image(&mut &bytes[..]).unwrap();

  let classes = bootstrap::resolve_classes(&mut restored).unwrap();
  assert_eq!(classes.small_integer, kernel.classes.small_integer);

  let mut interp = Interpreter::new();
  let plus = object::intern_symbol(&mut restored, "+").unwrap();
  let result = interp.send(&mut restored, &classes, plus, Ref::Int(10), &[Ref::Int(32)], 10_000).unwrap();
  assert!(matches!(result, RunResult::Finished(Ref::Int(42))));
}

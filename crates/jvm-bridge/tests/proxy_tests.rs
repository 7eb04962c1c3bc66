//! Integration tests for reflection, proxies and imports
//!
//! Runs the full path from a dotted import to a foreign call against the
//! simulated VM, including classpath archives built on the fly.

use jvm_bridge::sim::{ClassBuilder, SimLauncher, SimThrow, SimValue};
use jvm_bridge::{
    BridgeError, Configuration, HostValue, ImportRegistry, JavaImporter, LifecycleManager, Member, Proxy, VmHandle,
};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn write_jar(path: &Path, entries: &[&str]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        zip.start_file(*entry, options).unwrap();
        zip.write_all(b"\xca\xfe\xba\xbe").unwrap();
    }
    zip.finish().unwrap();
}

fn greeter() -> ClassBuilder {
    ClassBuilder::new("pkg/Greeter")
        .on_classpath()
        .static_method("greet", "(Ljava/lang/String;)Ljava/lang/String;", |heap, _, args| {
            let name = heap.string(args[0])?;
            Ok(heap.string_value(&format!("Hello, {}!", name)))
        })
}

fn overloads() -> ClassBuilder {
    ClassBuilder::new("demo/Printer")
        .default_constructor()
        .static_method("show", "(I)Ljava/lang/String;", |_, _, _| Ok(SimValue::Ref(None)))
        .static_method("show", "(Ljava/lang/String;)Ljava/lang/String;", |_, _, _| Ok(SimValue::Ref(None)))
        .static_method("kind", "(I)Ljava/lang/String;", |heap, _, _| Ok(heap.string_value("int")))
        .static_method("kind", "(Ljava/lang/String;)Ljava/lang/String;", |heap, _, _| {
            Ok(heap.string_value("text"))
        })
        .static_method("pick", "(Ljava/lang/String;)V", |_, _, _| Ok(SimValue::Void))
        .static_method("pick", "(Ljava/lang/Integer;)V", |_, _, _| Ok(SimValue::Void))
        .static_method("sum", "([I)J", |heap, _, args| {
            let array = args[0].as_ref().ok_or_else(SimThrow::null_pointer)?;
            let total = heap
                .array_items(array)
                .unwrap_or_default()
                .iter()
                .filter_map(SimValue::as_long)
                .sum();
            Ok(SimValue::Long(total))
        })
}

fn outer() -> ClassBuilder {
    ClassBuilder::new("demo/Outer").static_method("name", "()Ljava/lang/String;", |heap, _, _| {
        Ok(heap.string_value("outer"))
    })
}

fn inner() -> ClassBuilder {
    ClassBuilder::new("demo/Outer$Inner").static_method("name", "()Ljava/lang/String;", |heap, _, _| {
        Ok(heap.string_value("inner"))
    })
}

fn start(launcher: SimLauncher) -> (LifecycleManager, VmHandle) {
    let manager = LifecycleManager::new(launcher, Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    (manager, vm)
}

fn class_of(vm: &VmHandle, path: &str) -> jvm_bridge::ClassProxy {
    match vm.resolve(path).unwrap() {
        Proxy::Class(c) => c,
        other => panic!("{} is not a class: {:?}", path, other),
    }
}

#[test]
fn test_greeter_from_archive() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("greeter.jar");
    write_jar(&jar, &["pkg/Greeter.class"]);

    let launcher = Arc::new(SimLauncher::builder().class(greeter()).build().unwrap());
    let config = Configuration::default().with_classpath_entry(&jar);
    let manager = Arc::new(LifecycleManager::new(launcher.clone(), config));
    let registry = ImportRegistry::new();
    registry.register(Arc::new(JavaImporter::new(manager.clone()).with_prefix("pkg")));

    let greeter = registry.resolve("pkg.Greeter").unwrap().unwrap();
    let greeting = greeter.call("greet", &[HostValue::from("world")]).unwrap();
    assert_eq!(greeting, HostValue::from("Hello, world!"));

    let sim = launcher.vm().unwrap();
    let reflection_calls = sim.stats().reflection_calls;
    let greeter = registry.resolve("pkg.Greeter").unwrap().unwrap();
    let greeting = greeter.call("greet", &[HostValue::from("world")]).unwrap();
    assert_eq!(greeting, HostValue::from("Hello, world!"));
    assert_eq!(sim.stats().reflection_calls, reflection_calls);

    let package = registry.resolve("pkg").unwrap().unwrap();
    let names: Vec<String> = package.as_package().unwrap().classes().unwrap().iter().collect();
    assert_eq!(names, vec!["pkg.Greeter".to_string()]);
}

#[test]
fn test_classpath_class_needs_its_archive() {
    let (_manager, vm) = start(SimLauncher::builder().class(greeter()).build().unwrap());
    assert!(matches!(vm.find_class("pkg.Greeter"), Err(BridgeError::ClassNotFound(_))));
    // without the class, the path is just a package
    assert!(matches!(vm.resolve("pkg.Greeter").unwrap(), Proxy::Package(_)));
}

#[test]
fn test_find_class_is_cached() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let sim = launcher.vm().unwrap();

    let first = vm.find_class("java.util.ArrayList").unwrap();
    let stats = sim.stats();
    let second = vm.find_class("java/util/ArrayList").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sim.stats().reflection_calls, stats.reflection_calls);
    assert_eq!(sim.stats().find_class_calls, stats.find_class_calls);
    assert!(vm.catalog_stats().hits >= 1);
}

#[test]
fn test_missing_class_leaves_no_pending_exception() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();

    match vm.find_class("does/not/Exist") {
        Err(BridgeError::ClassNotFound(name)) => assert_eq!(name, "does.not.Exist"),
        other => panic!("unexpected {:?}", other),
    }
    let sim = launcher.vm().unwrap();
    assert_eq!(sim.pending_exceptions(), 0);
    // the VM is still usable
    let math = class_of(&vm, "java.lang.Math");
    assert_eq!(math.call("max", &[HostValue::Int(3), HostValue::Int(9)]).unwrap(), HostValue::Int(9));
}

#[test]
fn test_overload_by_argument_type() {
    let (_manager, vm) = start(SimLauncher::builder().class(overloads()).build().unwrap());
    let printer = class_of(&vm, "demo.Printer");

    assert_eq!(printer.call("kind", &[HostValue::Int(1)]).unwrap(), HostValue::from("int"));
    assert_eq!(printer.call("kind", &[HostValue::from("1")]).unwrap(), HostValue::from("text"));
    assert!(matches!(
        printer.call("kind", &[HostValue::Float(1.5)]),
        Err(BridgeError::Conversion(_))
    ));
    assert!(matches!(
        printer.call("kind", &[]),
        Err(BridgeError::MemberNotFound { .. })
    ));
    assert!(matches!(
        printer.call("pick", &[HostValue::Null]),
        Err(BridgeError::AmbiguousOverload { .. })
    ));
    printer.call("pick", &[HostValue::Int(3)]).unwrap();
    assert_eq!(printer.call("show", &[HostValue::Int(3)]).unwrap(), HostValue::Null);

    let ints = HostValue::List(vec![HostValue::Int(1), HostValue::Int(2), HostValue::Int(40)]);
    assert_eq!(printer.call("sum", &[ints]).unwrap(), HostValue::Int(43));
}

#[test]
fn test_foreign_exception_surfaces() {
    let (_manager, vm) = start(SimLauncher::builder().build().unwrap());
    let integer = class_of(&vm, "java.lang.Integer");
    assert_eq!(integer.call("parseInt", &[HostValue::from("42")]).unwrap(), HostValue::Int(42));
    match integer.call("parseInt", &[HostValue::from("forty-two")]).unwrap_err() {
        BridgeError::ForeignException { class_name, message } => {
            assert_eq!(class_name, "java.lang.NumberFormatException");
            assert_eq!(message.as_deref(), Some("For input string: \"forty-two\""));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(integer.get("MAX_VALUE").unwrap(), HostValue::Int(i64::from(i32::MAX)));
}

#[test]
fn test_instances_and_boxing() {
    let (_manager, vm) = start(SimLauncher::builder().build().unwrap());
    let list = class_of(&vm, "java.util.ArrayList").new_instance(&[]).unwrap();
    assert_eq!(list.class_name().unwrap(), "java.util.ArrayList");
    list.call("add", &[HostValue::Int(7)]).unwrap();
    list.call("add", &[HostValue::from("seven")]).unwrap();
    assert_eq!(list.call("size", &[]).unwrap(), HostValue::Int(2));

    // declared as Object: the element comes back as a proxy
    let first = list.call("get", &[HostValue::Int(0)]).unwrap();
    let boxed = first.as_object().unwrap();
    assert_eq!(boxed.class_name().unwrap(), "java.lang.Integer");
    assert_eq!(boxed.call("intValue", &[]).unwrap(), HostValue::Int(7));
    let second = list.call("get", &[HostValue::Int(1)]).unwrap();
    assert_eq!(second.as_object().unwrap().call("length", &[]).unwrap(), HostValue::Int(5));

    // proxies pass back in as their bound reference
    list.call("add", &[first.clone()]).unwrap();
    assert_eq!(list.call("size", &[]).unwrap(), HostValue::Int(3));

    match list.call("get", &[HostValue::Int(9)]).unwrap_err() {
        BridgeError::ForeignException { class_name, .. } => {
            assert_eq!(class_name, "java.lang.IndexOutOfBoundsException")
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_nested_class_through_outer() {
    let (_manager, vm) = start(SimLauncher::builder().class(outer()).class(inner()).build().unwrap());
    let outer = class_of(&vm, "demo.Outer");
    assert_eq!(outer.call("name", &[]).unwrap(), HostValue::from("outer"));
    let inner = match outer.resolve_member("Inner").unwrap() {
        Member::Class(c) => c,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(inner.call("name", &[]).unwrap(), HostValue::from("inner"));
    assert_eq!(inner.name().binary(), "demo.Outer$Inner");
    assert!(matches!(outer.resolve_member("Missing").unwrap(), Member::NotFound));
    let via_path = class_of(&vm, "demo.Outer.Inner");
    assert!(Arc::ptr_eq(via_path.descriptor(), inner.descriptor()));
}

#[test]
fn test_dropped_proxy_releases_global() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let sim = launcher.vm().unwrap();
    let list_class = class_of(&vm, "java.util.ArrayList");

    let before = (vm.live_handles().global, sim.live_global_refs());
    let list = list_class.new_instance(&[]).unwrap();
    let copy = list.clone();
    assert_eq!(vm.live_handles().global, before.0 + 1);
    drop(list);
    assert_eq!(vm.live_handles().global, before.0 + 1);
    drop(copy);
    assert_eq!((vm.live_handles().global, sim.live_global_refs()), before);
    assert_eq!(sim.live_local_refs(), 0);
}

#[test]
fn test_drop_on_unattached_thread_is_deferred() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let sim = launcher.vm().unwrap();
    let list_class = class_of(&vm, "java.util.ArrayList");
    let before = sim.live_global_refs();

    let list = list_class.new_instance(&[]).unwrap();
    std::thread::spawn(move || drop(list)).join().unwrap();
    assert_eq!(vm.live_handles().deferred, 1);
    assert_eq!(sim.live_global_refs(), before + 1);

    // the next call on an attached thread issues it
    drop(list_class.new_instance(&[]).unwrap());
    assert_eq!(vm.live_handles().deferred, 0);
    assert_eq!(sim.live_global_refs(), before);
}

#[test]
fn test_weak_instance_after_collection() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let list = class_of(&vm, "java.util.ArrayList").new_instance(&[]).unwrap();
    let weak = list.downgrade().unwrap();
    assert!(weak.upgrade().unwrap().is_some());

    drop(list);
    launcher.vm().unwrap().clear_weak_refs();
    assert!(weak.upgrade().unwrap().is_none());
}

#[test]
fn test_invalid_namespace() {
    let (_manager, vm) = start(SimLauncher::builder().build().unwrap());
    assert!(matches!(vm.resolve("java..util"), Err(BridgeError::InvalidNamespace(_))));
    assert!(matches!(vm.resolve("java.1util"), Err(BridgeError::InvalidNamespace(_))));
    assert!(matches!(
        vm.resolve("java.lang.Math.abs"),
        Err(BridgeError::InvalidNamespace(_))
    ));
}

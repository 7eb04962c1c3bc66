//! Smoke test against a real JVM
//!
//! Needs a JDK: run with `JAVA_HOME` set and `--ignored`.

use jvm_bridge::{BridgeError, Configuration, HostValue, LifecycleManager, Proxy};

#[test]
#[ignore = "requires a JDK via JAVA_HOME"]
fn test_real_jvm_round_trip() {
    let java_home = std::env::var_os("JAVA_HOME").expect("JAVA_HOME is not set");
    let config = Configuration::default().with_java_home(java_home);
    let manager = LifecycleManager::jni(config.clone());
    let vm = manager.start(config).unwrap();

    let math = match vm.resolve("java.lang.Math").unwrap() {
        Proxy::Class(c) => c,
        other => panic!("expected a class, got {:?}", other),
    };
    assert_eq!(math.call("abs", &[HostValue::Int(-3)]).unwrap(), HostValue::Int(3));
    assert_eq!(math.call("max", &[HostValue::Int(2), HostValue::Int(5)]).unwrap(), HostValue::Int(5));

    let integer = vm.resolve("java.lang.Integer").unwrap();
    assert!(matches!(
        integer.call("parseInt", &[HostValue::from("x")]),
        Err(BridgeError::ForeignException { .. })
    ));
    assert!(matches!(vm.find_class("does/not/Exist"), Err(BridgeError::ClassNotFound(_))));

    let list = vm
        .resolve("java.util.ArrayList")
        .unwrap()
        .as_class()
        .unwrap()
        .new_instance(&[])
        .unwrap();
    list.call("add", &[HostValue::from("hello")]).unwrap();
    assert_eq!(list.call("size", &[]).unwrap(), HostValue::Int(1));

    manager.shutdown().unwrap();
    assert!(matches!(list.call("size", &[]), Err(BridgeError::NotRunning)));
}

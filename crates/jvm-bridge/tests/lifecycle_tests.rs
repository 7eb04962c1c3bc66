//! Integration tests for VM lifecycle
//!
//! Covers concurrent start, proxy invalidation after shutdown, the drain
//! barrier, per-thread attachment and configuration loading. Everything runs
//! against the simulated VM.

use jvm_bridge::sim::{ClassBuilder, SimLauncher, SimValue};
use jvm_bridge::{BridgeError, Configuration, HostValue, LifecycleManager, Phase, Proxy, StartupError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn slow_worker(started: Arc<AtomicBool>, finished: Arc<AtomicBool>) -> ClassBuilder {
    ClassBuilder::new("demo/SlowWorker").static_method("work", "(I)I", move |_, _, args| {
        started.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        finished.store(true, Ordering::SeqCst);
        Ok(SimValue::Int(args[0].as_int().unwrap_or(0) * 2))
    })
}

#[test]
fn test_concurrent_start_creates_one_vm() {
    let launcher = Arc::new(
        SimLauncher::builder()
            .startup_delay(Duration::from_millis(50))
            .build()
            .unwrap(),
    );
    let manager = Arc::new(LifecycleManager::new(launcher.clone(), Configuration::default()));
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.start(Configuration::default())
            })
        })
        .collect();
    let handles: Vec<_> = workers
        .into_iter()
        .map(|w| w.join().unwrap().unwrap())
        .collect();

    assert_eq!(launcher.launches(), 1);
    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    assert_eq!(manager.phase(), Phase::Running);
}

#[test]
fn test_concurrent_start_shares_failure() {
    let launcher = Arc::new(
        SimLauncher::builder()
            .startup_delay(Duration::from_millis(50))
            .failing_launches(1)
            .build()
            .unwrap(),
    );
    let manager = Arc::new(LifecycleManager::new(launcher.clone(), Configuration::default()));
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.start(Configuration::default())
            })
        })
        .collect();
    for worker in workers {
        let outcome = worker.join().unwrap();
        assert!(matches!(
            outcome,
            Err(BridgeError::Startup(StartupError::CreateFailed { .. }))
        ));
    }
    assert_eq!(launcher.launches(), 1);
    assert_eq!(manager.phase(), Phase::Uninitialized);

    // retryable
    manager.start(Configuration::default()).unwrap();
    assert_eq!(launcher.launches(), 2);
}

#[test]
fn test_proxies_fail_after_shutdown() {
    let manager = LifecycleManager::new(SimLauncher::builder().build().unwrap(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();

    let package = vm.resolve("java.util").unwrap();
    let math = vm.resolve("java.lang.Math").unwrap();
    let list_class = vm.resolve("java.util.ArrayList").unwrap();
    let list = list_class.as_class().unwrap().new_instance(&[]).unwrap();
    list.call("add", &[HostValue::from("x")]).unwrap();
    let size = match list.resolve_member("size").unwrap() {
        jvm_bridge::Member::Methods(m) => m,
        other => panic!("expected methods, got {:?}", other),
    };

    manager.shutdown().unwrap();
    assert_eq!(manager.phase(), Phase::Stopped);

    assert!(matches!(list.call("size", &[]), Err(BridgeError::NotRunning)));
    assert!(matches!(size.call(&[]), Err(BridgeError::NotRunning)));
    assert!(matches!(
        math.call("abs", &[HostValue::Int(-1)]),
        Err(BridgeError::NotRunning)
    ));
    assert!(matches!(math.get("PI"), Err(BridgeError::NotRunning)));
    assert!(matches!(package.resolve_member("HashMap"), Err(BridgeError::NotRunning)));
    assert!(matches!(vm.find_class("java.lang.String"), Err(BridgeError::NotRunning)));
    assert!(matches!(vm.resolve("java.lang"), Err(BridgeError::NotRunning)));
    assert!(matches!(list.downgrade(), Err(BridgeError::NotRunning)));
    assert!(matches!(
        list_class.as_class().unwrap().new_instance(&[]),
        Err(BridgeError::NotRunning)
    ));
}

#[test]
fn test_shutdown_waits_for_in_flight_call() {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let launcher = SimLauncher::builder()
        .class(slow_worker(started.clone(), finished.clone()))
        .build()
        .unwrap();
    let manager = LifecycleManager::new(launcher, Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let worker_class = vm.resolve("demo.SlowWorker").unwrap();

    let caller = thread::spawn(move || worker_class.call("work", &[HostValue::Int(21)]));
    while !started.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    manager.shutdown().unwrap();

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(caller.join().unwrap().unwrap(), HostValue::Int(42));
    assert_eq!(manager.phase(), Phase::Stopped);
}

#[test]
fn test_shutdown_releases_everything() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let list = vm
        .resolve("java.util.ArrayList")
        .unwrap()
        .as_class()
        .unwrap()
        .new_instance(&[])
        .unwrap();
    let sim = launcher.vm().unwrap();
    assert!(sim.live_global_refs() > 0);

    manager.shutdown().unwrap();
    assert_eq!(sim.live_global_refs(), 0);
    assert_eq!(vm.live_handles().global, 0);
    assert!(sim.is_destroyed());
    assert!(sim.misuse().is_empty(), "{:?}", sim.misuse());

    // dropping a proxy after shutdown touches nothing
    drop(list);
    assert!(sim.misuse().is_empty(), "{:?}", sim.misuse());
}

#[test]
fn test_thread_detaches_on_exit() {
    let launcher = Arc::new(SimLauncher::builder().build().unwrap());
    let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let sim = launcher.vm().unwrap();
    let attached_before = sim.attached_threads();
    let math = vm.resolve("java.lang.Math").unwrap();

    let worker = thread::spawn(move || {
        let result = math.call("abs", &[HostValue::Int(-5)]).unwrap();
        assert_eq!(result, HostValue::Int(5));
    });
    worker.join().unwrap();

    let stats = sim.stats();
    assert!(stats.detaches >= 1);
    assert_eq!(sim.attached_threads(), attached_before);
}

#[test]
fn test_ensure_started_uses_default_configuration() {
    let config = Configuration::new("21").with_jvm_option("-Xmx64m");
    let manager = LifecycleManager::new(SimLauncher::builder().build().unwrap(), config.clone());
    assert!(matches!(manager.handle(), Err(BridgeError::NotRunning)));
    let vm = manager.ensure_started().unwrap();
    assert_eq!(vm.configuration(), &config);
    assert!(vm.ptr_eq(&manager.ensure_started().unwrap()));
}

#[test]
fn test_configuration_from_toml() {
    let text = r#"
        java-version = "21"
        classpath = ["lib/commons-lang3.jar", "build/classes"]
        jvm-options = ["-Xmx256m"]

        [deps]
        maven = ["org.apache.commons:commons-lang3:3.12.0"]
    "#;
    let config: Configuration = toml::from_str(text).unwrap();
    assert_eq!(config.java_version, "21");
    assert_eq!(config.classpath.len(), 2);
    assert_eq!(config.jvm_options, vec!["-Xmx256m".to_string()]);
    assert_eq!(config.deps["maven"].len(), 1);
    assert!(config.java_home.is_none());
    assert!(config.validate().is_ok());

    let defaults: Configuration = toml::from_str("").unwrap();
    assert_eq!(defaults, Configuration::default());
}

#[test]
fn test_proxy_round_trip_through_static_call() {
    let manager = LifecycleManager::new(SimLauncher::builder().build().unwrap(), Configuration::default());
    let vm = manager.start(Configuration::default()).unwrap();
    let string = match vm.resolve("java.lang.String").unwrap() {
        Proxy::Class(c) => c,
        other => panic!("expected a class, got {:?}", other),
    };
    assert_eq!(
        string.call("valueOf", &[HostValue::Bool(true)]).unwrap(),
        HostValue::from("true")
    );
    assert_eq!(
        string.call("valueOf", &[HostValue::Int(123456789)]).unwrap(),
        HostValue::from("123456789")
    );
}

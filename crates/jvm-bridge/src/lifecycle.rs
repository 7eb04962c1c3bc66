//! VM lifecycle
//!
//! A [`LifecycleManager`] owns at most one VM:
//!
//! ```text
//! Uninitialized -> Starting -> Running -> ShuttingDown -> Stopped
//!       ^             |
//!       +-- failure --+
//! ```
//!
//! Start and shutdown are serialized by a mutex and condvar. Concurrent
//! `start` callers block while a start is in flight and all observe its
//! outcome: the same [`VmHandle`] or the same [`StartupError`].

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::catalog::{CatalogStats, ClassDescriptor, PackageScan, ReflectionCatalog};
use crate::config::Configuration;
use crate::error::{BridgeError, Result, StartupError};
use crate::gateway::ForeignCallGateway;
use crate::handle::HandleCounts;
use crate::native::{JniLauncher, Launcher};
use crate::proxy::{PackageProxy, Proxy};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No VM yet; `start` may be called
    Uninitialized,
    /// A start is in flight
    Starting,
    /// The VM is up
    Running,
    /// Shutdown is draining calls and releasing references
    ShuttingDown,
    /// Terminal
    Stopped,
}

/// State shared by every handle to one running VM
pub(crate) struct VmShared {
    id: u64,
    gateway: Arc<ForeignCallGateway>,
    catalog: ReflectionCatalog,
    config: Configuration,
}

/// A running VM.
///
/// Cheap to clone. Every operation fails with `NotRunning` once the VM has
/// been shut down.
#[derive(Clone)]
pub struct VmHandle {
    shared: Arc<VmShared>,
}

impl std::fmt::Debug for VmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmHandle")
            .field("id", &self.shared.id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl VmHandle {
    pub(crate) fn from_shared(shared: Arc<VmShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<VmShared> {
        Arc::downgrade(&self.shared)
    }

    /// Upgrade a proxy's back-reference, failing with `NotRunning` when the
    /// VM is gone or stopping
    pub(crate) fn upgrade(weak: &Weak<VmShared>) -> Result<VmHandle> {
        let shared = weak.upgrade().ok_or(BridgeError::NotRunning)?;
        let handle = VmHandle { shared };
        handle.ensure_running()?;
        Ok(handle)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(BridgeError::NotRunning)
        }
    }

    /// Process-unique id of this VM instance
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Whether both handles refer to the same VM instance
    pub fn ptr_eq(&self, other: &VmHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Whether the VM still accepts calls
    pub fn is_running(&self) -> bool {
        self.shared.gateway.is_running()
    }

    /// The call gateway
    pub fn gateway(&self) -> &Arc<ForeignCallGateway> {
        &self.shared.gateway
    }

    /// The reflection catalog
    pub fn catalog(&self) -> &ReflectionCatalog {
        &self.shared.catalog
    }

    /// Configuration the VM was started with
    pub fn configuration(&self) -> &Configuration {
        &self.shared.config
    }

    /// Class metadata by dotted or slashed name
    pub fn find_class(&self, name: &str) -> Result<Arc<ClassDescriptor>> {
        self.ensure_running()?;
        self.shared.catalog.find_class(name)
    }

    /// Lazy listing of the classes directly in a package
    pub fn discover_package_classes(&self, package: &str) -> Result<PackageScan> {
        self.ensure_running()?;
        self.shared.catalog.discover_package_classes(package)
    }

    /// Resolve a dotted path to a package, class or nested class proxy
    pub fn resolve(&self, path: &str) -> Result<Proxy> {
        self.ensure_running()?;
        let segments: Vec<&str> = path.split('.').collect();
        if !segments.iter().all(|s| is_identifier(s)) {
            return Err(BridgeError::InvalidNamespace(path.to_string()));
        }
        let mut current = Proxy::Package(PackageProxy::new(self, segments[0]));
        for segment in &segments[1..] {
            current = current.resolve_member(segment)?.into_proxy(&current, segment)?;
        }
        Ok(current)
    }

    /// Catalog counters
    pub fn catalog_stats(&self) -> CatalogStats {
        self.shared.catalog.stats()
    }

    /// Live handles owned by the bridge
    pub fn live_handles(&self) -> HandleCounts {
        self.shared.gateway.handle_counts()
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

struct Slot {
    phase: Phase,
    vm: Option<Arc<VmShared>>,
    attempt: u64,
    last_failure: Option<(u64, StartupError)>,
}

/// Owns the VM and its start/stop transitions
pub struct LifecycleManager {
    launcher: Box<dyn Launcher>,
    config: Configuration,
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("phase", &self.phase())
            .finish()
    }
}

impl LifecycleManager {
    /// Manager over a launcher; `config` is used by [`Self::ensure_started`]
    pub fn new(launcher: impl Launcher + 'static, config: Configuration) -> Self {
        Self {
            launcher: Box::new(launcher),
            config,
            slot: Mutex::new(Slot {
                phase: Phase::Uninitialized,
                vm: None,
                attempt: 0,
                last_failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Manager that launches a real JVM through JNI
    pub fn jni(config: Configuration) -> Self {
        Self::new(JniLauncher::new(), config)
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.slot.lock().phase
    }

    /// Default configuration
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Start the VM, or return the running one if it was started with the
    /// same configuration.
    ///
    /// Blocks while another start is in flight and reports that start's
    /// outcome. On failure the manager returns to `Uninitialized`.
    pub fn start(&self, config: Configuration) -> Result<VmHandle> {
        config.validate()?;
        let mut slot = self.slot.lock();
        loop {
            match slot.phase {
                Phase::Uninitialized => break,
                Phase::Running => {
                    let vm = slot.vm.clone().ok_or(BridgeError::NotRunning)?;
                    if vm.config != config {
                        return Err(StartupError::ConfigurationConflict.into());
                    }
                    return Ok(VmHandle::from_shared(vm));
                }
                Phase::Starting => {
                    let awaited = slot.attempt;
                    while slot.phase == Phase::Starting {
                        self.changed.wait(&mut slot);
                    }
                    if slot.phase == Phase::Uninitialized {
                        if let Some((attempt, failure)) = &slot.last_failure {
                            if *attempt == awaited {
                                return Err(failure.clone().into());
                            }
                        }
                    }
                }
                Phase::ShuttingDown => {
                    self.changed.wait(&mut slot);
                }
                Phase::Stopped => return Err(StartupError::Terminated.into()),
            }
        }

        slot.phase = Phase::Starting;
        slot.attempt += 1;
        let attempt = slot.attempt;
        drop(slot);

        log::info!("Starting Java {} VM", config.java_version);
        let launched = self.launcher.launch(&config);

        let mut slot = self.slot.lock();
        let outcome = match launched {
            Ok(native) => {
                let gateway = ForeignCallGateway::new(native);
                let catalog = ReflectionCatalog::new(gateway.clone(), config.classpath.clone());
                let shared = Arc::new(VmShared {
                    id: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
                    gateway,
                    catalog,
                    config,
                });
                log::info!("VM {} running", shared.id);
                slot.vm = Some(shared.clone());
                slot.phase = Phase::Running;
                Ok(VmHandle::from_shared(shared))
            }
            Err(e) => {
                log::warn!("VM start failed: {}", e);
                slot.phase = Phase::Uninitialized;
                slot.last_failure = Some((attempt, e.clone()));
                Err(e.into())
            }
        };
        self.changed.notify_all();
        outcome
    }

    /// The running VM, starting it with the default configuration if needed
    pub fn ensure_started(&self) -> Result<VmHandle> {
        if let Ok(handle) = self.handle() {
            return Ok(handle);
        }
        self.start(self.config.clone())
    }

    /// The running VM, or `NotRunning`
    pub fn handle(&self) -> Result<VmHandle> {
        let slot = self.slot.lock();
        match (&slot.phase, &slot.vm) {
            (Phase::Running, Some(vm)) => Ok(VmHandle::from_shared(vm.clone())),
            _ => Err(BridgeError::NotRunning),
        }
    }

    /// Stop the VM: drain in-flight calls, release every cached reference,
    /// detach, destroy. Idempotent; a no-op unless running.
    ///
    /// Fails with `ShutdownInFrame`, leaving the VM running, when called from
    /// a thread that is itself inside a foreign call.
    pub fn shutdown(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        loop {
            match slot.phase {
                Phase::Running => break,
                Phase::Starting => self.changed.wait(&mut slot),
                Phase::ShuttingDown => {
                    while slot.phase == Phase::ShuttingDown {
                        self.changed.wait(&mut slot);
                    }
                    return Ok(());
                }
                Phase::Uninitialized | Phase::Stopped => return Ok(()),
            }
        }
        slot.phase = Phase::ShuttingDown;
        let vm = slot.vm.take();
        drop(slot);

        if let Some(vm) = vm {
            log::info!("Shutting down VM {}", vm.id);
            if let Err(e) = vm.gateway.shutdown() {
                let mut slot = self.slot.lock();
                slot.vm = Some(vm);
                slot.phase = Phase::Running;
                self.changed.notify_all();
                return Err(e);
            }
            vm.catalog.clear();
        }

        let mut slot = self.slot.lock();
        slot.phase = Phase::Stopped;
        self.changed.notify_all();
        Ok(())
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("VM left running at drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLauncher;
    use std::time::Duration;

    fn manager() -> (LifecycleManager, Arc<SimLauncher>) {
        let launcher = Arc::new(SimLauncher::builder().build().unwrap());
        (
            LifecycleManager::new(launcher.clone(), Configuration::default()),
            launcher,
        )
    }

    #[test]
    fn test_phases() {
        let (manager, launcher) = manager();
        assert_eq!(manager.phase(), Phase::Uninitialized);
        assert!(matches!(manager.handle(), Err(BridgeError::NotRunning)));

        let vm = manager.start(Configuration::default()).unwrap();
        assert_eq!(manager.phase(), Phase::Running);
        assert!(vm.ptr_eq(&manager.handle().unwrap()));
        assert!(vm.ptr_eq(&manager.start(Configuration::default()).unwrap()));

        manager.shutdown().unwrap();
        assert_eq!(manager.phase(), Phase::Stopped);
        assert!(launcher.vm().unwrap().is_destroyed());
        manager.shutdown().unwrap();
        assert!(matches!(
            manager.start(Configuration::default()),
            Err(BridgeError::Startup(StartupError::Terminated))
        ));
    }

    #[test]
    fn test_shutdown_inside_a_call_frame_is_refused() {
        let (manager, launcher) = manager();
        let vm = manager.start(Configuration::default()).unwrap();
        let frame = vm.gateway().frame().unwrap();
        assert!(matches!(manager.shutdown(), Err(BridgeError::ShutdownInFrame)));
        assert_eq!(manager.phase(), Phase::Running);
        assert!(vm.ptr_eq(&manager.handle().unwrap()));
        assert!(vm.find_class("java.lang.String").is_ok());

        drop(frame);
        manager.shutdown().unwrap();
        assert_eq!(manager.phase(), Phase::Stopped);
        assert!(launcher.vm().unwrap().is_destroyed());
    }

    #[test]
    fn test_shutdown_before_start_is_noop() {
        let (manager, _launcher) = manager();
        manager.shutdown().unwrap();
        assert_eq!(manager.phase(), Phase::Uninitialized);
        assert!(manager.start(Configuration::default()).is_ok());
    }

    #[test]
    fn test_conflicting_configuration() {
        let (manager, _launcher) = manager();
        manager.start(Configuration::default()).unwrap();
        let other = Configuration::default().with_jvm_option("-Xmx64m");
        assert!(matches!(
            manager.start(other),
            Err(BridgeError::Startup(StartupError::ConfigurationConflict))
        ));
    }

    #[test]
    fn test_failed_start_is_retryable() {
        let launcher = Arc::new(SimLauncher::builder().failing_launches(1).build().unwrap());
        let manager = LifecycleManager::new(launcher.clone(), Configuration::default());
        assert!(matches!(
            manager.start(Configuration::default()),
            Err(BridgeError::Startup(StartupError::CreateFailed { .. }))
        ));
        assert_eq!(manager.phase(), Phase::Uninitialized);
        assert!(manager.start(Configuration::default()).is_ok());
        assert_eq!(launcher.launches(), 2);
    }

    #[test]
    fn test_invalid_configuration_is_rejected_before_launch() {
        let (manager, launcher) = manager();
        let config = Configuration::new("");
        assert!(matches!(
            manager.start(config),
            Err(BridgeError::Startup(StartupError::InvalidConfiguration(_)))
        ));
        assert_eq!(launcher.launches(), 0);
    }

    #[test]
    fn test_racing_starters_share_a_failure() {
        let launcher = Arc::new(
            SimLauncher::builder()
                .failing_launches(1)
                .startup_delay(Duration::from_millis(50))
                .build()
                .unwrap(),
        );
        let manager = Arc::new(LifecycleManager::new(launcher.clone(), Configuration::default()));
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let results: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    manager.start(Configuration::default()).map(|vm| vm.id())
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        // Callers that arrived during the failing start share its error; any
        // later caller starts afresh and succeeds.
        let failures = results.iter().filter(|r| r.is_err()).count();
        assert!(failures >= 1);
        let ids: std::collections::BTreeSet<u64> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert!(ids.len() <= 1);
    }
}

//! Foreign call gateway
//!
//! The only caller of [`NativeInterface`]. Every call runs inside a
//! [`Frame`], which holds a permit from the call gate, pushes a local
//! reference frame, and checks for a pending foreign exception after each
//! call that can raise one.
//!
//! Shutdown is a drain barrier: the gate is closed, in-flight frames finish,
//! then cached references are released and the VM is destroyed.

mod attach;
mod frame;

pub use frame::Frame;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{BridgeError, Result};
use crate::handle::{HandleCounts, NativeHandle, NativeHandleTable, RefKind};
use crate::native::{NativeInterface, RawEnv, RawId, RawRef};

static NEXT_VM: AtomicU64 = AtomicU64::new(1);

/// Local frame capacity requested for each [`Frame`]
const FRAME_CAPACITY: i32 = 32;

/// A value crossing the native boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForeignValue {
    /// No value (`void` return)
    Void,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Reference; `None` is null
    Object(Option<NativeHandle>),
}

impl ForeignValue {
    /// Null reference
    pub const NULL: ForeignValue = ForeignValue::Object(None);

    /// The handle of a non-null reference
    pub fn handle(&self) -> Option<NativeHandle> {
        match self {
            ForeignValue::Object(handle) => *handle,
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    in_flight: usize,
}

/// Admission control for native calls
#[derive(Debug, Default)]
struct CallGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

struct Permit<'a> {
    gate: &'a CallGate,
}

impl CallGate {
    fn opened() -> Self {
        Self {
            state: Mutex::new(GateState {
                open: true,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    fn enter(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }
        state.in_flight += 1;
        Some(Permit { gate: self })
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Close the gate and wait until no permit is outstanding.
    /// Returns false if the gate was already closed.
    fn close_and_drain(&self) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            return false;
        }
        state.open = false;
        while state.in_flight > 0 {
            log::debug!("Waiting for {} in-flight foreign calls", state.in_flight);
            self.drained.wait(&mut state);
        }
        true
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.drained.notify_all();
        }
    }
}

/// Marshals every native call of one VM
pub struct ForeignCallGateway {
    me: Weak<ForeignCallGateway>,
    vm_id: u64,
    native: Box<dyn NativeInterface>,
    handles: NativeHandleTable,
    gate: CallGate,
    /// `Class.getName` and `Throwable.getMessage`, used to describe exceptions
    describe_ids: OnceCell<Option<(RawId, RawId)>>,
}

impl std::fmt::Debug for ForeignCallGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignCallGateway")
            .field("vm_id", &self.vm_id)
            .field("running", &self.is_running())
            .field("handles", &self.handles.counts())
            .finish()
    }
}

impl ForeignCallGateway {
    /// Wrap a freshly launched VM
    pub fn new(native: Box<dyn NativeInterface>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            vm_id: NEXT_VM.fetch_add(1, Ordering::Relaxed),
            native,
            handles: NativeHandleTable::new(),
            gate: CallGate::opened(),
            describe_ids: OnceCell::new(),
        })
    }

    /// Identity of the VM behind this gateway
    pub fn vm_id(&self) -> u64 {
        self.vm_id
    }

    /// Whether calls are still admitted
    pub fn is_running(&self) -> bool {
        self.gate.is_open()
    }

    /// Handle counts by kind
    pub fn handle_counts(&self) -> HandleCounts {
        self.handles.counts()
    }

    pub(crate) fn native(&self) -> &dyn NativeInterface {
        self.native.as_ref()
    }

    pub(crate) fn handles(&self) -> &NativeHandleTable {
        &self.handles
    }

    pub(crate) fn weak(&self) -> Weak<ForeignCallGateway> {
        self.me.clone()
    }

    /// Open a call frame on the current thread, attaching it if needed.
    ///
    /// Fails with `NotRunning` once shutdown has begun, and with `Attach` if
    /// this thread cannot attach.
    pub(crate) fn frame(&self) -> Result<Frame<'_>> {
        let permit = self.gate.enter().ok_or(BridgeError::NotRunning)?;
        let env = attach::current_env(self)?;
        Frame::open(self, env, permit, FRAME_CAPACITY)
    }

    /// Issue queued releases. Called with an attached environment.
    fn release_deferred(&self, env: RawEnv) {
        let deferred = self.handles.take_deferred();
        if deferred.is_empty() {
            return;
        }
        log::debug!("Releasing {} deferred references", deferred.len());
        for (raw, kind) in deferred {
            unsafe { self.delete_raw(env, raw, kind) };
        }
    }

    unsafe fn delete_raw(&self, env: RawEnv, raw: RawRef, kind: RefKind) {
        match kind {
            RefKind::Global => self.native.delete_global_ref(env, raw),
            RefKind::Weak => self.native.delete_weak_global_ref(env, raw),
            RefKind::Local => self.native.delete_local_ref(env, raw),
        }
    }

    /// Release a global or weak handle. Issued immediately when this thread
    /// is attached, queued otherwise. After shutdown began this is a no-op:
    /// the drain owns every remaining reference.
    fn release(&self, handle: NativeHandle) {
        let Some(_permit) = self.gate.enter() else {
            return;
        };
        let Some(raw) = self.handles.remove(handle) else {
            return;
        };
        match attach::existing_env(self) {
            Some(env) => unsafe { self.delete_raw(env, raw, handle.kind()) },
            None => {
                log::debug!("Deferring release of {:?} handle", handle.kind());
                self.handles.defer(raw, handle.kind());
            }
        }
    }

    /// Detach a thread that is exiting. Skipped once shutdown began.
    fn detach_exiting_thread(&self) {
        let Some(_permit) = self.gate.enter() else {
            return;
        };
        let rc = unsafe { self.native.detach_current_thread() };
        log::debug!(
            "Detached exiting {:?} from VM {} ({})",
            std::thread::current().id(),
            self.vm_id,
            rc
        );
    }

    /// Close the gate, wait for in-flight calls, release every owned
    /// reference, detach this thread and destroy the VM.
    ///
    /// Idempotent. Fails with `ShutdownInFrame`, leaving the VM running, if
    /// this thread has a frame open: the drain would wait on it forever.
    /// Problems after the drain are logged, never returned.
    pub(crate) fn shutdown(&self) -> Result<()> {
        let held = attach::open_frames(self.vm_id);
        if held > 0 {
            log::warn!("Refusing shutdown of VM {}: {} frames open on this thread", self.vm_id, held);
            return Err(BridgeError::ShutdownInFrame);
        }
        if !self.gate.close_and_drain() {
            return Ok(());
        }
        let owned = self.handles.drain_all();
        match attach::current_env(self) {
            Ok(env) => {
                log::debug!("Releasing {} references before shutdown", owned.len());
                for (raw, kind) in owned {
                    unsafe { self.delete_raw(env, raw, kind) };
                }
            }
            Err(e) => log::warn!("Cannot release {} references at shutdown: {}", owned.len(), e),
        }
        attach::forget(self);
        let rc = unsafe { self.native.detach_current_thread() };
        if rc != jvm_bridge_sys::JNI_OK && rc != jvm_bridge_sys::JNI_EDETACHED {
            log::warn!("Detaching the shutdown thread returned {}", rc);
        }

        let rc = unsafe { self.native.destroy_vm() };
        if rc != jvm_bridge_sys::JNI_OK {
            log::warn!("DestroyJavaVM returned {}", rc);
        }
        log::info!("VM {} stopped", self.vm_id);
        Ok(())
    }

    fn new_global(&self, handle: NativeHandle) -> GlobalRef {
        GlobalRef {
            inner: Arc::new(OwnedRef {
                handle,
                gateway: self.weak(),
                vm_id: self.vm_id,
            }),
        }
    }
}

#[derive(Debug)]
struct OwnedRef {
    handle: NativeHandle,
    gateway: Weak<ForeignCallGateway>,
    vm_id: u64,
}

impl Drop for OwnedRef {
    fn drop(&mut self) {
        if let Some(gateway) = self.gateway.upgrade() {
            gateway.release(self.handle);
        }
    }
}

/// An owned global reference. Clones share it; the last drop releases it.
#[derive(Debug, Clone)]
pub struct GlobalRef {
    inner: Arc<OwnedRef>,
}

impl GlobalRef {
    /// The global handle, valid on any thread until release
    pub fn handle(&self) -> NativeHandle {
        self.inner.handle
    }

    /// VM this reference belongs to
    pub fn vm_id(&self) -> u64 {
        self.inner.vm_id
    }

    /// Whether both refer to the same reference (not merely the same object)
    pub fn ptr_eq(&self, other: &GlobalRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An owned weak global reference; see [`Frame::upgrade`]
#[derive(Debug, Clone)]
pub struct WeakRef {
    inner: Arc<OwnedRef>,
}

impl WeakRef {
    /// The weak handle
    pub fn handle(&self) -> NativeHandle {
        self.inner.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::native::Launcher;
    use crate::sim::SimLauncher;

    fn gateway() -> (Arc<ForeignCallGateway>, crate::sim::SimVm) {
        let launcher = SimLauncher::builder().build().unwrap();
        let native = launcher.launch(&Configuration::default()).unwrap();
        (ForeignCallGateway::new(native), launcher.vm().unwrap())
    }

    #[test]
    fn test_gate_rejects_after_shutdown() {
        let (gateway, vm) = gateway();
        assert!(gateway.frame().is_ok());
        gateway.shutdown().unwrap();
        assert!(matches!(gateway.frame(), Err(BridgeError::NotRunning)));
        assert!(vm.is_destroyed());
        gateway.shutdown().unwrap();
        assert!(vm.misuse().is_empty());
    }

    #[test]
    fn test_global_ref_release_on_drop() {
        let (gateway, vm) = gateway();
        let global = {
            let frame = gateway.frame().unwrap();
            let s = frame.new_string("kept").unwrap();
            frame.promote(s).unwrap()
        };
        assert_eq!(vm.live_global_refs(), 1);
        let copy = global.clone();
        drop(global);
        assert_eq!(vm.live_global_refs(), 1);
        drop(copy);
        assert_eq!(vm.live_global_refs(), 0);
        assert_eq!(gateway.handle_counts(), HandleCounts::default());
    }

    #[test]
    fn test_release_from_unattached_thread_is_deferred() {
        let (gateway, vm) = gateway();
        let global = {
            let frame = gateway.frame().unwrap();
            let s = frame.new_string("moved").unwrap();
            frame.promote(s).unwrap()
        };
        std::thread::spawn(move || drop(global)).join().unwrap();
        assert_eq!(gateway.handle_counts().deferred, 1);
        assert_eq!(vm.live_global_refs(), 1);

        drop(gateway.frame().unwrap());
        assert_eq!(gateway.handle_counts().deferred, 0);
        assert_eq!(vm.live_global_refs(), 0);
        assert!(vm.misuse().is_empty());
    }

    #[test]
    fn test_shutdown_releases_cached_globals() {
        let (gateway, vm) = gateway();
        let global = {
            let frame = gateway.frame().unwrap();
            let s = frame.new_string("cached").unwrap();
            frame.promote(s).unwrap()
        };
        gateway.shutdown().unwrap();
        assert_eq!(vm.live_global_refs(), 0);
        drop(global);
        assert!(vm.misuse().is_empty());
    }

    #[test]
    fn test_shutdown_inside_frame_fails_fast() {
        let (gateway, vm) = gateway();
        let frame = gateway.frame().unwrap();
        assert!(matches!(gateway.shutdown(), Err(BridgeError::ShutdownInFrame)));
        assert!(gateway.is_running());
        assert!(!vm.is_destroyed());

        // the refused shutdown left the frame usable
        let s = frame.new_string("still usable").unwrap();
        assert_eq!(frame.get_string(s).unwrap(), "still usable");
        drop(frame);
        gateway.shutdown().unwrap();
        assert!(vm.is_destroyed());
        assert!(vm.misuse().is_empty(), "{:?}", vm.misuse());
    }

    #[test]
    fn test_frames_on_other_threads_do_not_block_the_check() {
        let (gateway, vm) = gateway();
        let shared = gateway.clone();
        let (opened_tx, opened_rx) = std::sync::mpsc::channel();
        let (close_tx, close_rx) = std::sync::mpsc::channel::<()>();
        let holder = std::thread::spawn(move || {
            let frame = shared.frame().unwrap();
            opened_tx.send(()).unwrap();
            close_rx.recv().unwrap();
            drop(frame);
        });
        opened_rx.recv().unwrap();

        let closer = {
            let gateway = gateway.clone();
            std::thread::spawn(move || gateway.shutdown())
        };
        while gateway.is_running() {
            std::thread::yield_now();
        }
        close_tx.send(()).unwrap();
        holder.join().unwrap();
        closer.join().unwrap().unwrap();
        assert!(vm.is_destroyed());
    }
}

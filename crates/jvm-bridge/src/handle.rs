//! Native handle table
//!
//! Raw foreign references never leave this table. Everything above the
//! gateway holds a [`NativeHandle`], an opaque token resolved back to the raw
//! reference only at the moment of a native call.
//!
//! Local handles belong to the frame and thread that created them and are
//! retired when the frame closes. Global and weak handles live until they
//! are released explicitly, or until shutdown drains the table.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use crate::error::{BridgeError, Result};
use crate::native::RawRef;

/// Reference kind of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Valid only inside the creating frame and thread
    Local,
    /// Valid on any thread until released
    Global,
    /// Does not keep its referent alive
    Weak,
}

/// Opaque token for a foreign reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle {
    id: u64,
    kind: RefKind,
    owner: ThreadId,
}

impl NativeHandle {
    /// Reference kind
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Thread that created the handle
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Process-unique token
    pub fn token(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct Entry {
    raw: RawRef,
    kind: RefKind,
    owner: ThreadId,
}

#[derive(Debug, Default)]
struct TableInner {
    entries: FxHashMap<u64, Entry>,
    /// Local handle ids by open frame
    frames: FxHashMap<u64, Vec<u64>>,
    /// Globals and weaks whose release could not be issued on the dropping thread
    deferred: Vec<(RawRef, RefKind)>,
}

/// Handle counts by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleCounts {
    /// Live local handles
    pub local: usize,
    /// Live global handles
    pub global: usize,
    /// Live weak handles
    pub weak: usize,
    /// Releases waiting for the next frame close
    pub deferred: usize,
}

/// Registry of every foreign reference the bridge holds
#[derive(Debug, Default)]
pub struct NativeHandleTable {
    inner: Mutex<TableInner>,
    next_frame: AtomicU64,
}

/// Tokens are unique across tables so a handle of one VM never resolves in another
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl NativeHandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a frame scope for local handles
    pub(crate) fn open_frame(&self) -> u64 {
        let frame = self.next_frame.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.lock().frames.insert(frame, Vec::new());
        frame
    }

    /// Register a raw reference. Locals must name their frame; a local
    /// registered in a frame that is no longer open is stale from the start.
    pub(crate) fn register(&self, raw: RawRef, kind: RefKind, frame: Option<u64>) -> NativeHandle {
        let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let owner = thread::current().id();
        let handle = NativeHandle { id, kind, owner };
        let mut inner = self.inner.lock();
        if kind == RefKind::Local {
            match frame.and_then(|f| inner.frames.get_mut(&f)) {
                Some(ids) => ids.push(id),
                None => return handle,
            }
        }
        inner.entries.insert(id, Entry { raw, kind, owner });
        handle
    }

    /// Resolve a handle to its raw reference.
    ///
    /// Fails with `StaleHandle` if the handle was released, its frame closed,
    /// or a local handle is used from another thread.
    pub(crate) fn resolve(&self, handle: NativeHandle) -> Result<RawRef> {
        let inner = self.inner.lock();
        match inner.entries.get(&handle.id) {
            Some(entry) if entry.kind == RefKind::Local && entry.owner != thread::current().id() => {
                Err(BridgeError::StaleHandle)
            }
            Some(entry) => Ok(entry.raw),
            None => Err(BridgeError::StaleHandle),
        }
    }

    /// Remove a handle, returning its raw reference if it was still live
    pub(crate) fn remove(&self, handle: NativeHandle) -> Option<RawRef> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.remove(&handle.id)?;
        Some(entry.raw)
    }

    /// Retire every local handle of a frame. Returns the retired count.
    pub(crate) fn close_frame(&self, frame: u64) -> usize {
        let mut inner = self.inner.lock();
        let ids = inner.frames.remove(&frame).unwrap_or_default();
        let mut retired = 0;
        for id in ids {
            if inner.entries.remove(&id).is_some() {
                retired += 1;
            }
        }
        retired
    }

    /// Queue a release for the next thread able to issue it
    pub(crate) fn defer(&self, raw: RawRef, kind: RefKind) {
        self.inner.lock().deferred.push((raw, kind));
    }

    /// Take every queued release
    pub(crate) fn take_deferred(&self) -> Vec<(RawRef, RefKind)> {
        std::mem::take(&mut self.inner.lock().deferred)
    }

    /// Empty the table. Returns every global and weak reference still owned,
    /// plus the deferred queue; locals are dropped with their frames.
    pub(crate) fn drain_all(&self) -> Vec<(RawRef, RefKind)> {
        let mut inner = self.inner.lock();
        let mut owned: Vec<(RawRef, RefKind)> = inner
            .entries
            .drain()
            .filter(|(_, e)| e.kind != RefKind::Local)
            .map(|(_, e)| (e.raw, e.kind))
            .collect();
        owned.append(&mut inner.deferred);
        inner.frames.clear();
        owned
    }

    /// Current counts by kind
    pub fn counts(&self) -> HandleCounts {
        let inner = self.inner.lock();
        let mut counts = HandleCounts {
            deferred: inner.deferred.len(),
            ..Default::default()
        };
        for entry in inner.entries.values() {
            match entry.kind {
                RefKind::Local => counts.local += 1,
                RefKind::Global => counts.global += 1,
                RefKind::Weak => counts.weak += 1,
            }
        }
        counts
    }

    /// Number of live handles of all kinds
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the table holds no handles
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locals_retire_with_frame() {
        let table = NativeHandleTable::new();
        let frame = table.open_frame();
        let local = table.register(RawRef(0x10), RefKind::Local, Some(frame));
        let global = table.register(RawRef(0x20), RefKind::Global, None);

        assert_eq!(table.resolve(local).unwrap(), RawRef(0x10));
        assert_eq!(table.close_frame(frame), 1);
        assert!(matches!(table.resolve(local), Err(BridgeError::StaleHandle)));
        assert_eq!(table.resolve(global).unwrap(), RawRef(0x20));
    }

    #[test]
    fn test_local_in_closed_frame_is_stale() {
        let table = NativeHandleTable::new();
        let frame = table.open_frame();
        table.close_frame(frame);
        let late = table.register(RawRef(0x10), RefKind::Local, Some(frame));
        assert!(matches!(table.resolve(late), Err(BridgeError::StaleHandle)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_local_handle_is_thread_bound() {
        let table = std::sync::Arc::new(NativeHandleTable::new());
        let frame = table.open_frame();
        let local = table.register(RawRef(0x10), RefKind::Local, Some(frame));
        let global = table.register(RawRef(0x20), RefKind::Global, None);

        let shared = table.clone();
        let (local_result, global_result) =
            std::thread::spawn(move || (shared.resolve(local).is_err(), shared.resolve(global).is_ok()))
                .join()
                .unwrap();
        assert!(local_result);
        assert!(global_result);
    }

    #[test]
    fn test_tokens_are_unique() {
        let table = NativeHandleTable::new();
        let a = table.register(RawRef(0x10), RefKind::Global, None);
        let b = table.register(RawRef(0x10), RefKind::Global, None);
        assert_ne!(a, b);
        assert_ne!(a.token(), b.token());
        assert_eq!(table.counts().global, 2);
    }

    #[test]
    fn test_handle_of_other_table_is_stale() {
        let first = NativeHandleTable::new();
        let second = NativeHandleTable::new();
        let h = first.register(RawRef(0x10), RefKind::Global, None);
        assert!(matches!(second.resolve(h), Err(BridgeError::StaleHandle)));
    }

    #[test]
    fn test_drain_returns_owned_and_deferred() {
        let table = NativeHandleTable::new();
        let frame = table.open_frame();
        table.register(RawRef(0x10), RefKind::Local, Some(frame));
        table.register(RawRef(0x20), RefKind::Global, None);
        table.register(RawRef(0x30), RefKind::Weak, None);
        table.defer(RawRef(0x40), RefKind::Global);

        let mut drained = table.drain_all();
        drained.sort_by_key(|(raw, _)| raw.0);
        assert_eq!(
            drained,
            vec![
                (RawRef(0x20), RefKind::Global),
                (RawRef(0x30), RefKind::Weak),
                (RawRef(0x40), RefKind::Global),
            ]
        );
        assert!(table.is_empty());
        assert_eq!(table.counts(), HandleCounts::default());
    }

    #[test]
    fn test_remove_is_single_shot() {
        let table = NativeHandleTable::new();
        let h = table.register(RawRef(0x20), RefKind::Global, None);
        assert_eq!(table.remove(h), Some(RawRef(0x20)));
        assert_eq!(table.remove(h), None);
    }
}

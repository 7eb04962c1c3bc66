//! Simulated VM
//!
//! An in-process implementation of [`NativeInterface`] with JNI semantics:
//! - Local references live in per-thread frames; globals and weaks until
//!   deleted
//! - Failing calls leave a pending exception that must be cleared
//! - Class, method and field metadata come from `java.lang.reflect` objects
//!
//! Fixture classes are declared with [`ClassBuilder`]. A class marked
//! [`ClassBuilder::on_classpath`] is only found when a configured classpath
//! directory or archive holds its `.class` entry.
//!
//! The VM never crashes on misuse; it records it instead (see
//! [`SimVm::misuse`]) so tests can assert the bridge honored every rule.

pub mod builder;
mod builtins;
pub mod heap;

pub use builder::ClassBuilder;
pub use heap::{NativeBody, ObjId, SimHeap, SimResult, SimThrow, SimValue};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use heap::{ClassKind, HeapObject, SimClass};

use crate::config::Configuration;
use crate::error::{Result, StartupError};
use crate::handle::RefKind;
use crate::native::{JValue, Launcher, NativeInterface, PrimitiveArray, RawEnv, RawId, RawRef};
use crate::signature::{ReturnKind, TypeSig};

/// Counters of what the VM was asked to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// `FindClass` calls
    pub find_class_calls: u64,
    /// Calls into `java.lang.Class` and `java.lang.reflect.*` methods
    pub reflection_calls: u64,
    /// All method and constructor invocations
    pub method_calls: u64,
    /// Threads attached
    pub attaches: u64,
    /// Threads detached
    pub detaches: u64,
    /// Exceptions raised
    pub exceptions_thrown: u64,
}

#[derive(Debug, Clone, Copy)]
struct RefSlot {
    obj: Option<ObjId>,
    kind: RefKind,
}

#[derive(Debug)]
struct EnvState {
    thread: ThreadId,
    pending: Option<ObjId>,
    frames: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MethodKey {
    class: usize,
    index: usize,
    constructor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FieldKey {
    class: usize,
    index: usize,
}

#[derive(Debug)]
struct SimState {
    heap: SimHeap,
    classpath: Vec<PathBuf>,
    visible: FxHashMap<usize, bool>,
    refs: FxHashMap<usize, RefSlot>,
    next_ref: usize,
    envs: FxHashMap<usize, EnvState>,
    threads: FxHashMap<ThreadId, usize>,
    next_env: usize,
    method_ids: Vec<MethodKey>,
    method_index: FxHashMap<MethodKey, usize>,
    field_ids: Vec<FieldKey>,
    field_index: FxHashMap<FieldKey, usize>,
    stats: SimStats,
    misuse: Vec<String>,
    destroyed: bool,
}

static NEXT_VM_ID: AtomicU64 = AtomicU64::new(1);

/// A simulated VM instance. Clones share the same VM.
#[derive(Debug, Clone)]
pub struct SimVm {
    id: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimState {
    fn misuse(&mut self, what: String) {
        log::warn!("Simulated VM misuse: {}", what);
        self.misuse.push(what);
    }

    /// Validate an environment for a call. `None` means the call must not run.
    fn enter(&mut self, env: RawEnv, op: &str, allow_pending: bool) -> Option<usize> {
        if self.destroyed {
            self.misuse(format!("{} after destroy", op));
            return None;
        }
        let current = thread::current().id();
        let pending = match self.envs.get(&env.0) {
            Some(state) if state.thread == current => state.pending.is_some(),
            Some(_) => {
                self.misuse(format!("{} with an environment of another thread", op));
                return None;
            }
            None => {
                self.misuse(format!("{} with an unknown environment", op));
                return None;
            }
        };
        if pending && !allow_pending {
            self.misuse(format!("{} with a pending exception", op));
            return None;
        }
        Some(env.0)
    }

    fn deref(&mut self, r: RawRef, op: &str) -> Option<ObjId> {
        if r.is_null() {
            return None;
        }
        match self.refs.get(&r.0) {
            Some(slot) => slot.obj,
            None => {
                self.misuse(format!("{} with a deleted reference", op));
                None
            }
        }
    }

    fn new_ref(&mut self, obj: ObjId, kind: RefKind) -> RawRef {
        self.next_ref += 1;
        self.refs.insert(self.next_ref, RefSlot { obj: Some(obj), kind });
        RawRef(self.next_ref)
    }

    fn local(&mut self, env: usize, obj: Option<ObjId>) -> RawRef {
        let Some(obj) = obj else {
            return RawRef::NULL;
        };
        let r = self.new_ref(obj, RefKind::Local);
        if let Some(frame) = self.envs.get_mut(&env).and_then(|e| e.frames.last_mut()) {
            frame.push(r.0);
        }
        r
    }

    fn throw(&mut self, env: usize, throw: &SimThrow) {
        let obj = self.heap.new_throwable(throw);
        self.stats.exceptions_thrown += 1;
        if let Some(state) = self.envs.get_mut(&env) {
            state.pending = Some(obj);
        }
    }

    fn class_of_ref(&mut self, env: usize, class: RawRef, op: &str) -> Option<ClassKind> {
        let obj = self.deref(class, op)?;
        match self.heap.object(obj) {
            Some(HeapObject::Class(kind)) => Some(kind.clone()),
            _ => {
                self.throw(env, &SimThrow::bare("java/lang/ClassCastException"));
                None
            }
        }
    }

    fn class_visible(&mut self, idx: usize) -> bool {
        if !self.heap.class(idx).requires_classpath {
            return true;
        }
        if let Some(visible) = self.visible.get(&idx) {
            return *visible;
        }
        let entry_name = format!("{}.class", self.heap.class(idx).name);
        let visible = self.classpath.iter().any(|entry| {
            if entry.is_dir() {
                entry.join(&entry_name).is_file()
            } else {
                File::open(entry)
                    .ok()
                    .and_then(|f| zip::ZipArchive::new(f).ok())
                    .map(|mut archive| archive.by_name(&entry_name).is_ok())
                    .unwrap_or(false)
            }
        });
        self.visible.insert(idx, visible);
        visible
    }

    fn to_sim(&mut self, value: &JValue, op: &str) -> SimValue {
        match *value {
            JValue::Void => SimValue::Void,
            JValue::Boolean(v) => SimValue::Boolean(v),
            JValue::Byte(v) => SimValue::Byte(v),
            JValue::Char(v) => SimValue::Char(v),
            JValue::Short(v) => SimValue::Short(v),
            JValue::Int(v) => SimValue::Int(v),
            JValue::Long(v) => SimValue::Long(v),
            JValue::Float(v) => SimValue::Float(v),
            JValue::Double(v) => SimValue::Double(v),
            JValue::Object(r) => SimValue::Ref(self.deref(r, op)),
        }
    }

    fn to_jvalue(&mut self, env: usize, value: SimValue, kind: ReturnKind) -> JValue {
        match kind {
            ReturnKind::Void => JValue::Void,
            ReturnKind::Boolean => JValue::Boolean(value.as_bool().unwrap_or(false)),
            ReturnKind::Byte => JValue::Byte(value.as_long().unwrap_or(0) as i8),
            ReturnKind::Char => JValue::Char(value.as_long().unwrap_or(0) as u16),
            ReturnKind::Short => JValue::Short(value.as_long().unwrap_or(0) as i16),
            ReturnKind::Int => JValue::Int(value.as_long().unwrap_or(0) as i32),
            ReturnKind::Long => JValue::Long(value.as_long().unwrap_or(0)),
            ReturnKind::Float => JValue::Float(value.as_double().unwrap_or(0.0) as f32),
            ReturnKind::Double => JValue::Double(value.as_double().unwrap_or(0.0)),
            ReturnKind::Object => JValue::Object(self.local(env, value.as_ref())),
        }
    }

    fn method_id(&mut self, key: MethodKey) -> RawId {
        if let Some(idx) = self.method_index.get(&key) {
            return RawId(*idx + 1);
        }
        self.method_ids.push(key);
        let idx = self.method_ids.len() - 1;
        self.method_index.insert(key, idx);
        RawId(idx + 1)
    }

    fn field_id(&mut self, key: FieldKey) -> RawId {
        if let Some(idx) = self.field_index.get(&key) {
            return RawId(*idx + 1);
        }
        self.field_ids.push(key);
        let idx = self.field_ids.len() - 1;
        self.field_index.insert(key, idx);
        RawId(idx + 1)
    }

    fn method_key(&mut self, id: RawId, op: &str) -> Option<MethodKey> {
        let key = id.0.checked_sub(1).and_then(|i| self.method_ids.get(i)).copied();
        if key.is_none() {
            self.misuse(format!("{} with an unknown method id", op));
        }
        key
    }

    fn field_key(&mut self, id: RawId, op: &str) -> Option<FieldKey> {
        let key = id.0.checked_sub(1).and_then(|i| self.field_ids.get(i)).copied();
        if key.is_none() {
            self.misuse(format!("{} with an unknown field id", op));
        }
        key
    }

    /// Run a method or constructor body. Returns `None` if it threw.
    fn invoke(&mut self, env: usize, key: MethodKey, this: Option<ObjId>, args: &[JValue], op: &str) -> Option<SimValue> {
        let mut class = key.class;
        let mut method = if key.constructor {
            self.heap.class(key.class).constructors[key.index].clone()
        } else {
            self.heap.class(key.class).methods[key.index].clone()
        };

        if !key.constructor && !method.is_static() {
            let Some(receiver) = this else {
                self.throw(env, &SimThrow::null_pointer());
                return None;
            };
            // virtual dispatch from the receiver's runtime class
            if let ClassKind::Named(runtime) = self.heap.runtime_kind(receiver) {
                if let Some((c, i)) = self.heap.find_method(runtime, &method.name, &method.descriptor, false) {
                    class = c;
                    method = self.heap.class(c).methods[i].clone();
                }
            }
        }

        if args.len() != method.sig.params.len() {
            self.misuse(format!(
                "{} of {}.{} with {} arguments",
                op,
                self.heap.class(class).name,
                method.name,
                args.len()
            ));
            self.throw(env, &SimThrow::illegal_argument("wrong number of arguments"));
            return None;
        }
        let sim_args: Vec<SimValue> = args.iter().map(|a| self.to_sim(a, op)).collect();

        self.stats.method_calls += 1;
        let owner = &self.heap.class(class).name;
        if owner == "java/lang/Class" || owner.starts_with("java/lang/reflect/") {
            self.stats.reflection_calls += 1;
        }

        let Some(body) = method.body.clone() else {
            self.throw(env, &SimThrow::new("java/lang/AbstractMethodError", method.name.clone()));
            return None;
        };
        match body(&mut self.heap, this, &sim_args) {
            Ok(value) => Some(value),
            Err(thrown) => {
                self.throw(env, &thrown);
                None
            }
        }
    }

    fn array_index(&mut self, env: usize, array: ObjId, index: i32) -> Option<usize> {
        let len = self.heap.array_items(array).map(<[SimValue]>::len).unwrap_or(0);
        match usize::try_from(index) {
            Ok(i) if i < len => Some(i),
            _ => {
                self.throw(
                    env,
                    &SimThrow::new(
                        "java/lang/ArrayIndexOutOfBoundsException",
                        format!("Index {} out of bounds for length {}", index, len),
                    ),
                );
                None
            }
        }
    }

    fn drop_refs_of(&mut self, ids: Vec<usize>) {
        for id in ids {
            self.refs.remove(&id);
        }
    }
}

impl SimVm {
    fn new(classes: Vec<SimClass>, classpath: Vec<PathBuf>) -> Self {
        Self {
            id: NEXT_VM_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(Mutex::new(SimState {
                heap: SimHeap::new(classes),
                classpath,
                visible: FxHashMap::default(),
                refs: FxHashMap::default(),
                next_ref: 0,
                envs: FxHashMap::default(),
                threads: FxHashMap::default(),
                next_env: 0,
                method_ids: Vec::new(),
                method_index: FxHashMap::default(),
                field_ids: Vec::new(),
                field_index: FxHashMap::default(),
                stats: SimStats::default(),
                misuse: Vec::new(),
                destroyed: false,
            })),
        }
    }

    /// Process-unique identity of this VM
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Counters so far
    pub fn stats(&self) -> SimStats {
        self.state.lock().stats
    }

    /// Every rule violation observed, in order
    pub fn misuse(&self) -> Vec<String> {
        self.state.lock().misuse.clone()
    }

    fn count_refs(&self, kind: RefKind) -> usize {
        self.state
            .lock()
            .refs
            .values()
            .filter(|slot| slot.kind == kind)
            .count()
    }

    /// Live global references
    pub fn live_global_refs(&self) -> usize {
        self.count_refs(RefKind::Global)
    }

    /// Live local references across all threads
    pub fn live_local_refs(&self) -> usize {
        self.count_refs(RefKind::Local)
    }

    /// Threads with an uncleared exception
    pub fn pending_exceptions(&self) -> usize {
        self.state
            .lock()
            .envs
            .values()
            .filter(|e| e.pending.is_some())
            .count()
    }

    /// Currently attached threads
    pub fn attached_threads(&self) -> usize {
        self.state.lock().envs.len()
    }

    /// Whether `DestroyJavaVM` ran
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Simulate a collection: weak references whose referent is not held by
    /// any strong reference are cleared.
    pub fn clear_weak_refs(&self) {
        let mut state = self.state.lock();
        let strong: Vec<ObjId> = state
            .refs
            .values()
            .filter(|slot| slot.kind != RefKind::Weak)
            .filter_map(|slot| slot.obj)
            .collect();
        for slot in state.refs.values_mut() {
            if slot.kind == RefKind::Weak && slot.obj.map_or(false, |o| !strong.contains(&o)) {
                slot.obj = None;
            }
        }
    }
}

impl NativeInterface for SimVm {
    unsafe fn attach_current_thread(&self) -> std::result::Result<RawEnv, i32> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(jvm_bridge_sys::JNI_ERR);
        }
        let current = thread::current().id();
        if let Some(env) = state.threads.get(&current) {
            return Ok(RawEnv(*env));
        }
        state.next_env += 1;
        let env = state.next_env;
        state.envs.insert(
            env,
            EnvState {
                thread: current,
                pending: None,
                frames: vec![Vec::new()],
            },
        );
        state.threads.insert(current, env);
        state.stats.attaches += 1;
        Ok(RawEnv(env))
    }

    unsafe fn detach_current_thread(&self) -> i32 {
        let mut state = self.state.lock();
        if state.destroyed {
            state.misuse("detach after destroy".to_string());
            return jvm_bridge_sys::JNI_ERR;
        }
        let Some(env) = state.threads.remove(&thread::current().id()) else {
            return jvm_bridge_sys::JNI_EDETACHED;
        };
        if let Some(env_state) = state.envs.remove(&env) {
            let locals: Vec<usize> = env_state.frames.into_iter().flatten().collect();
            state.drop_refs_of(locals);
        }
        state.stats.detaches += 1;
        jvm_bridge_sys::JNI_OK
    }

    unsafe fn destroy_vm(&self) -> i32 {
        let mut state = self.state.lock();
        if state.destroyed {
            state.misuse("destroy twice".to_string());
            return jvm_bridge_sys::JNI_ERR;
        }
        state.destroyed = true;
        jvm_bridge_sys::JNI_OK
    }

    unsafe fn find_class(&self, env: RawEnv, name: &str) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "FindClass", false) else {
            return RawRef::NULL;
        };
        state.stats.find_class_calls += 1;
        let kind = if name.starts_with('[') {
            TypeSig::parse_descriptor(name)
                .ok()
                .and_then(|sig| state.heap.kind_for_sig(&sig))
        } else {
            match state.heap.class_idx(name) {
                Some(idx) if state.class_visible(idx) => Some(ClassKind::Named(idx)),
                _ => None,
            }
        };
        match kind {
            Some(kind) => {
                let obj = state.heap.class_object(kind);
                state.local(env, Some(obj))
            }
            None => {
                state.throw(env, &SimThrow::new("java/lang/NoClassDefFoundError", name));
                RawRef::NULL
            }
        }
    }

    unsafe fn get_object_class(&self, env: RawEnv, obj: RawRef) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "GetObjectClass", false) else {
            return RawRef::NULL;
        };
        let Some(obj) = state.deref(obj, "GetObjectClass") else {
            state.misuse("GetObjectClass on null".to_string());
            return RawRef::NULL;
        };
        let kind = state.heap.runtime_kind(obj);
        let class = state.heap.class_object(kind);
        state.local(env, Some(class))
    }

    unsafe fn is_instance_of(&self, env: RawEnv, obj: RawRef, class: RawRef) -> bool {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "IsInstanceOf", false) else {
            return false;
        };
        let Some(kind) = state.class_of_ref(env, class, "IsInstanceOf") else {
            return false;
        };
        match state.deref(obj, "IsInstanceOf") {
            Some(obj) => state.heap.is_instance(obj, &kind),
            None => true,
        }
    }

    unsafe fn get_method_id(&self, env: RawEnv, class: RawRef, name: &str, descriptor: &str, is_static: bool) -> Option<RawId> {
        let mut state = self.state.lock();
        let env = state.enter(env, "GetMethodID", false)?;
        let kind = state.class_of_ref(env, class, "GetMethodID")?;
        let found = match kind {
            ClassKind::Named(idx) if name == "<init>" => state
                .heap
                .find_constructor(idx, descriptor)
                .map(|index| MethodKey {
                    class: idx,
                    index,
                    constructor: true,
                }),
            ClassKind::Named(idx) => state
                .heap
                .find_method(idx, name, descriptor, is_static)
                .map(|(class, index)| MethodKey {
                    class,
                    index,
                    constructor: false,
                }),
            _ => None,
        };
        match found {
            Some(key) => Some(state.method_id(key)),
            None => {
                state.throw(env, &SimThrow::new("java/lang/NoSuchMethodError", name));
                None
            }
        }
    }

    unsafe fn get_field_id(&self, env: RawEnv, class: RawRef, name: &str, descriptor: &str, is_static: bool) -> Option<RawId> {
        let mut state = self.state.lock();
        let env = state.enter(env, "GetFieldID", false)?;
        let kind = state.class_of_ref(env, class, "GetFieldID")?;
        let found = match kind {
            ClassKind::Named(idx) => state.heap.find_field(idx, name, descriptor, is_static),
            _ => None,
        };
        match found {
            Some((class, index)) => Some(state.field_id(FieldKey { class, index })),
            None => {
                state.throw(env, &SimThrow::new("java/lang/NoSuchFieldError", name));
                None
            }
        }
    }

    unsafe fn new_object(&self, env: RawEnv, class: RawRef, ctor: RawId, args: &[JValue]) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "NewObject", false) else {
            return RawRef::NULL;
        };
        let Some(key) = state.method_key(ctor, "NewObject") else {
            return RawRef::NULL;
        };
        if !key.constructor {
            state.misuse("NewObject with a non-constructor method id".to_string());
            return RawRef::NULL;
        }
        let modifiers = crate::catalog::Modifiers(state.heap.class(key.class).modifiers);
        if modifiers.is_abstract() || modifiers.is_interface() {
            let name = state.heap.class(key.class).name.replace('/', ".");
            state.throw(env, &SimThrow::new("java/lang/InstantiationException", name));
            return RawRef::NULL;
        }
        let _ = state.class_of_ref(env, class, "NewObject");
        let obj = state.heap.alloc_instance(key.class);
        match state.invoke(env, key, Some(obj), args, "NewObject") {
            Some(_) => state.local(env, Some(obj)),
            None => RawRef::NULL,
        }
    }

    unsafe fn call_method(&self, env: RawEnv, obj: RawRef, method: RawId, kind: ReturnKind, args: &[JValue]) -> JValue {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "CallMethod", false) else {
            return JValue::Void;
        };
        let Some(key) = state.method_key(method, "CallMethod") else {
            return JValue::Void;
        };
        let this = state.deref(obj, "CallMethod");
        match state.invoke(env, key, this, args, "CallMethod") {
            Some(value) => state.to_jvalue(env, value, kind),
            None => state.to_jvalue(env, SimValue::NULL, kind),
        }
    }

    unsafe fn call_static_method(&self, env: RawEnv, class: RawRef, method: RawId, kind: ReturnKind, args: &[JValue]) -> JValue {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "CallStaticMethod", false) else {
            return JValue::Void;
        };
        let Some(key) = state.method_key(method, "CallStaticMethod") else {
            return JValue::Void;
        };
        let _ = state.class_of_ref(env, class, "CallStaticMethod");
        match state.invoke(env, key, None, args, "CallStaticMethod") {
            Some(value) => state.to_jvalue(env, value, kind),
            None => state.to_jvalue(env, SimValue::NULL, kind),
        }
    }

    unsafe fn get_field(&self, env: RawEnv, obj: RawRef, field: RawId, kind: ReturnKind) -> JValue {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "GetField", false) else {
            return JValue::Void;
        };
        let Some(key) = state.field_key(field, "GetField") else {
            return JValue::Void;
        };
        let Some(obj) = state.deref(obj, "GetField") else {
            state.misuse("GetField on null".to_string());
            return JValue::Void;
        };
        let name = state.heap.class(key.class).fields[key.index].name.clone();
        let value = state.heap.field(obj, &name);
        state.to_jvalue(env, value, kind)
    }

    unsafe fn set_field(&self, env: RawEnv, obj: RawRef, field: RawId, value: JValue) {
        let mut state = self.state.lock();
        if state.enter(env, "SetField", false).is_none() {
            return;
        }
        let Some(key) = state.field_key(field, "SetField") else {
            return;
        };
        let Some(obj) = state.deref(obj, "SetField") else {
            state.misuse("SetField on null".to_string());
            return;
        };
        let name = state.heap.class(key.class).fields[key.index].name.clone();
        let value = state.to_sim(&value, "SetField");
        state.heap.set_field(obj, &name, value);
    }

    unsafe fn get_static_field(&self, env: RawEnv, _class: RawRef, field: RawId, kind: ReturnKind) -> JValue {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "GetStaticField", false) else {
            return JValue::Void;
        };
        let Some(key) = state.field_key(field, "GetStaticField") else {
            return JValue::Void;
        };
        let name = state.heap.class(key.class).fields[key.index].name.clone();
        let value = state.heap.static_value(key.class, &name);
        state.to_jvalue(env, value, kind)
    }

    unsafe fn set_static_field(&self, env: RawEnv, _class: RawRef, field: RawId, value: JValue) {
        let mut state = self.state.lock();
        if state.enter(env, "SetStaticField", false).is_none() {
            return;
        }
        let Some(key) = state.field_key(field, "SetStaticField") else {
            return;
        };
        let name = state.heap.class(key.class).fields[key.index].name.clone();
        let value = state.to_sim(&value, "SetStaticField");
        state.heap.set_static_value(key.class, &name, value);
    }

    unsafe fn new_string(&self, env: RawEnv, text: &str) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "NewString", false) else {
            return RawRef::NULL;
        };
        let obj = state.heap.new_string(text);
        state.local(env, Some(obj))
    }

    unsafe fn get_string(&self, env: RawEnv, string: RawRef) -> Option<String> {
        let mut state = self.state.lock();
        state.enter(env, "GetStringRegion", false)?;
        let obj = state.deref(string, "GetStringRegion")?;
        state.heap.string(SimValue::Ref(Some(obj))).ok()
    }

    unsafe fn get_array_length(&self, env: RawEnv, array: RawRef) -> i32 {
        let mut state = self.state.lock();
        if state.enter(env, "GetArrayLength", false).is_none() {
            return 0;
        }
        let len = state
            .deref(array, "GetArrayLength")
            .and_then(|obj| state.heap.array_items(obj).map(|items| items.len()));
        match len {
            Some(len) => len as i32,
            None => {
                state.misuse("GetArrayLength on a non-array".to_string());
                0
            }
        }
    }

    unsafe fn new_object_array(&self, env: RawEnv, len: i32, component: RawRef, init: RawRef) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "NewObjectArray", false) else {
            return RawRef::NULL;
        };
        let Some(kind) = state.class_of_ref(env, component, "NewObjectArray") else {
            return RawRef::NULL;
        };
        if len < 0 {
            state.throw(env, &SimThrow::new("java/lang/NegativeArraySizeException", len.to_string()));
            return RawRef::NULL;
        }
        let init = state.deref(init, "NewObjectArray");
        let component = state.heap.sig_for_kind(&kind);
        let array = state
            .heap
            .new_array(component, vec![SimValue::Ref(init); len as usize]);
        state.local(env, Some(array))
    }

    unsafe fn get_object_array_element(&self, env: RawEnv, array: RawRef, index: i32) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "GetObjectArrayElement", false) else {
            return RawRef::NULL;
        };
        let Some(array) = state.deref(array, "GetObjectArrayElement") else {
            state.throw(env, &SimThrow::null_pointer());
            return RawRef::NULL;
        };
        let Some(i) = state.array_index(env, array, index) else {
            return RawRef::NULL;
        };
        let item = state.heap.array_items(array).and_then(|items| items[i].as_ref());
        state.local(env, item)
    }

    unsafe fn set_object_array_element(&self, env: RawEnv, array: RawRef, index: i32, value: RawRef) {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "SetObjectArrayElement", false) else {
            return;
        };
        let Some(array) = state.deref(array, "SetObjectArrayElement") else {
            state.throw(env, &SimThrow::null_pointer());
            return;
        };
        let Some(i) = state.array_index(env, array, index) else {
            return;
        };
        let value = state.deref(value, "SetObjectArrayElement");
        if let Some(obj) = value {
            let component = state.heap.array_mut(array).map(|(c, _)| c.clone());
            let storable = component
                .and_then(|c| state.heap.kind_for_sig(&c))
                .map_or(false, |kind| state.heap.is_instance(obj, &kind));
            if !storable {
                let class = state.heap.class_name_of(obj);
                state.throw(env, &SimThrow::new("java/lang/ArrayStoreException", class));
                return;
            }
        }
        if let Some((_, items)) = state.heap.array_mut(array) {
            items[i] = SimValue::Ref(value);
        }
    }

    unsafe fn new_primitive_array(&self, env: RawEnv, values: &PrimitiveArray) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "NewArray", false) else {
            return RawRef::NULL;
        };
        let (component, items): (TypeSig, Vec<SimValue>) = match values {
            PrimitiveArray::Boolean(v) => (TypeSig::Boolean, v.iter().map(|x| SimValue::Boolean(*x)).collect()),
            PrimitiveArray::Byte(v) => (TypeSig::Byte, v.iter().map(|x| SimValue::Byte(*x)).collect()),
            PrimitiveArray::Char(v) => (TypeSig::Char, v.iter().map(|x| SimValue::Char(*x)).collect()),
            PrimitiveArray::Short(v) => (TypeSig::Short, v.iter().map(|x| SimValue::Short(*x)).collect()),
            PrimitiveArray::Int(v) => (TypeSig::Int, v.iter().map(|x| SimValue::Int(*x)).collect()),
            PrimitiveArray::Long(v) => (TypeSig::Long, v.iter().map(|x| SimValue::Long(*x)).collect()),
            PrimitiveArray::Float(v) => (TypeSig::Float, v.iter().map(|x| SimValue::Float(*x)).collect()),
            PrimitiveArray::Double(v) => (TypeSig::Double, v.iter().map(|x| SimValue::Double(*x)).collect()),
        };
        let array = state.heap.new_array(component, items);
        state.local(env, Some(array))
    }

    unsafe fn get_primitive_array(&self, env: RawEnv, array: RawRef, kind: ReturnKind) -> Option<PrimitiveArray> {
        let mut state = self.state.lock();
        state.enter(env, "GetArrayRegion", false)?;
        let obj = state.deref(array, "GetArrayRegion")?;
        let items = state.heap.array_items(obj)?.to_vec();
        let array = match kind {
            ReturnKind::Boolean => PrimitiveArray::Boolean(items.iter().map(|v| v.as_bool().unwrap_or(false)).collect()),
            ReturnKind::Byte => PrimitiveArray::Byte(items.iter().map(|v| v.as_long().unwrap_or(0) as i8).collect()),
            ReturnKind::Char => PrimitiveArray::Char(items.iter().map(|v| v.as_long().unwrap_or(0) as u16).collect()),
            ReturnKind::Short => PrimitiveArray::Short(items.iter().map(|v| v.as_long().unwrap_or(0) as i16).collect()),
            ReturnKind::Int => PrimitiveArray::Int(items.iter().map(|v| v.as_long().unwrap_or(0) as i32).collect()),
            ReturnKind::Long => PrimitiveArray::Long(items.iter().map(|v| v.as_long().unwrap_or(0)).collect()),
            ReturnKind::Float => PrimitiveArray::Float(items.iter().map(|v| v.as_double().unwrap_or(0.0) as f32).collect()),
            ReturnKind::Double => PrimitiveArray::Double(items.iter().map(|v| v.as_double().unwrap_or(0.0)).collect()),
            ReturnKind::Void | ReturnKind::Object => return None,
        };
        Some(array)
    }

    unsafe fn new_global_ref(&self, env: RawEnv, obj: RawRef) -> RawRef {
        let mut state = self.state.lock();
        if state.enter(env, "NewGlobalRef", true).is_none() {
            return RawRef::NULL;
        }
        match state.deref(obj, "NewGlobalRef") {
            Some(obj) => state.new_ref(obj, RefKind::Global),
            None => RawRef::NULL,
        }
    }

    unsafe fn delete_global_ref(&self, env: RawEnv, obj: RawRef) {
        let mut state = self.state.lock();
        if state.enter(env, "DeleteGlobalRef", true).is_none() || obj.is_null() {
            return;
        }
        match state.refs.get(&obj.0).map(|slot| slot.kind) {
            Some(RefKind::Global) => {
                state.refs.remove(&obj.0);
            }
            _ => state.misuse("DeleteGlobalRef on a non-global reference".to_string()),
        }
    }

    unsafe fn new_local_ref(&self, env: RawEnv, obj: RawRef) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "NewLocalRef", false) else {
            return RawRef::NULL;
        };
        let target = state.deref(obj, "NewLocalRef");
        state.local(env, target)
    }

    unsafe fn delete_local_ref(&self, env: RawEnv, obj: RawRef) {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "DeleteLocalRef", true) else {
            return;
        };
        if obj.is_null() {
            return;
        }
        match state.refs.get(&obj.0).map(|slot| slot.kind) {
            Some(RefKind::Local) => {
                state.refs.remove(&obj.0);
                if let Some(env_state) = state.envs.get_mut(&env) {
                    for frame in env_state.frames.iter_mut() {
                        frame.retain(|id| *id != obj.0);
                    }
                }
            }
            _ => state.misuse("DeleteLocalRef on a non-local reference".to_string()),
        }
    }

    unsafe fn new_weak_global_ref(&self, env: RawEnv, obj: RawRef) -> RawRef {
        let mut state = self.state.lock();
        if state.enter(env, "NewWeakGlobalRef", false).is_none() {
            return RawRef::NULL;
        }
        match state.deref(obj, "NewWeakGlobalRef") {
            Some(obj) => state.new_ref(obj, RefKind::Weak),
            None => RawRef::NULL,
        }
    }

    unsafe fn delete_weak_global_ref(&self, env: RawEnv, obj: RawRef) {
        let mut state = self.state.lock();
        if state.enter(env, "DeleteWeakGlobalRef", true).is_none() || obj.is_null() {
            return;
        }
        match state.refs.get(&obj.0).map(|slot| slot.kind) {
            Some(RefKind::Weak) => {
                state.refs.remove(&obj.0);
            }
            _ => state.misuse("DeleteWeakGlobalRef on a non-weak reference".to_string()),
        }
    }

    unsafe fn push_local_frame(&self, env: RawEnv, _capacity: i32) -> i32 {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "PushLocalFrame", false) else {
            return jvm_bridge_sys::JNI_ERR;
        };
        if let Some(env_state) = state.envs.get_mut(&env) {
            env_state.frames.push(Vec::new());
        }
        jvm_bridge_sys::JNI_OK
    }

    unsafe fn pop_local_frame(&self, env: RawEnv) {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "PopLocalFrame", true) else {
            return;
        };
        let popped = match state.envs.get_mut(&env) {
            Some(env_state) if env_state.frames.len() > 1 => env_state.frames.pop(),
            _ => None,
        };
        match popped {
            Some(ids) => state.drop_refs_of(ids),
            None => state.misuse("PopLocalFrame without a pushed frame".to_string()),
        }
    }

    unsafe fn exception_check(&self, env: RawEnv) -> bool {
        let mut state = self.state.lock();
        match state.enter(env, "ExceptionCheck", true) {
            Some(env) => state.envs.get(&env).map_or(false, |e| e.pending.is_some()),
            None => false,
        }
    }

    unsafe fn exception_occurred(&self, env: RawEnv) -> RawRef {
        let mut state = self.state.lock();
        let Some(env) = state.enter(env, "ExceptionOccurred", true) else {
            return RawRef::NULL;
        };
        let pending = state.envs.get(&env).and_then(|e| e.pending);
        state.local(env, pending)
    }

    unsafe fn exception_clear(&self, env: RawEnv) {
        let mut state = self.state.lock();
        if let Some(env) = state.enter(env, "ExceptionClear", true) {
            if let Some(env_state) = state.envs.get_mut(&env) {
                env_state.pending = None;
            }
        }
    }
}

/// Launches simulated VMs
pub struct SimLauncher {
    classes: Vec<SimClass>,
    startup_delay: Option<Duration>,
    failures_left: AtomicUsize,
    launches: AtomicUsize,
    created: Mutex<Vec<SimVm>>,
}

impl std::fmt::Debug for SimLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimLauncher")
            .field("classes", &self.classes.len())
            .field("launches", &self.launches())
            .finish()
    }
}

impl SimLauncher {
    /// Start building a launcher
    pub fn builder() -> SimLauncherBuilder {
        SimLauncherBuilder::default()
    }

    /// Number of `launch` calls so far, failed ones included
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Every VM created so far
    pub fn vms(&self) -> Vec<SimVm> {
        self.created.lock().clone()
    }

    /// The most recently created VM
    pub fn vm(&self) -> Option<SimVm> {
        self.created.lock().last().cloned()
    }
}

impl Launcher for SimLauncher {
    fn launch(&self, config: &Configuration) -> std::result::Result<Box<dyn NativeInterface>, StartupError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.startup_delay {
            thread::sleep(delay);
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StartupError::CreateFailed {
                code: jvm_bridge_sys::JNI_ERR,
            });
        }
        let vm = SimVm::new(self.classes.clone(), config.classpath.clone());
        // JNI_CreateJavaVM attaches the creating thread
        unsafe { vm.attach_current_thread() }.map_err(|code| StartupError::CreateFailed { code })?;
        log::debug!("Simulated VM {} created", vm.id());
        self.created.lock().push(vm.clone());
        Ok(Box::new(vm))
    }
}

/// Builder for [`SimLauncher`]
#[derive(Default)]
pub struct SimLauncherBuilder {
    classes: Vec<ClassBuilder>,
    startup_delay: Option<Duration>,
    failing_launches: usize,
}

impl SimLauncherBuilder {
    /// Add a fixture class; a later class replaces an earlier one of the same name
    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.classes.push(class);
        self
    }

    /// Sleep this long inside every launch
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    /// Fail the first `count` launches with `CreateFailed`
    pub fn failing_launches(mut self, count: usize) -> Self {
        self.failing_launches = count;
        self
    }

    /// Build the launcher. Fails on malformed fixture descriptors.
    pub fn build(self) -> Result<SimLauncher> {
        let mut classes = builtins::classes()?;
        for builder in self.classes {
            let class = builder.finish()?;
            match classes.iter().position(|c| c.name == class.name) {
                Some(existing) => classes[existing] = class,
                None => classes.push(class),
            }
        }
        Ok(SimLauncher {
            classes,
            startup_delay: self.startup_delay,
            failures_left: AtomicUsize::new(self.failing_launches),
            launches: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch() -> SimVm {
        let launcher = SimLauncher::builder().build().unwrap();
        launcher.launch(&Configuration::default()).unwrap();
        launcher.vm().unwrap()
    }

    fn env(vm: &SimVm) -> RawEnv {
        unsafe { vm.attach_current_thread().unwrap() }
    }

    #[test]
    fn test_find_class_and_missing_class() {
        let vm = launch();
        let env = env(&vm);
        unsafe {
            let class = vm.find_class(env, "java/lang/String");
            assert!(!class.is_null());
            assert!(!vm.exception_check(env));

            let missing = vm.find_class(env, "does/not/Exist");
            assert!(missing.is_null());
            assert!(vm.exception_check(env));
            vm.exception_clear(env);
            assert!(!vm.exception_check(env));
        }
        assert!(vm.misuse().is_empty());
        assert_eq!(vm.stats().find_class_calls, 2);
    }

    #[test]
    fn test_pop_frame_releases_locals() {
        let vm = launch();
        let env = env(&vm);
        unsafe {
            assert_eq!(vm.push_local_frame(env, 16), 0);
            vm.new_string(env, "a");
            vm.new_string(env, "b");
            assert_eq!(vm.live_local_refs(), 2);
            vm.pop_local_frame(env);
        }
        assert_eq!(vm.live_local_refs(), 0);
    }

    #[test]
    fn test_call_with_pending_exception_is_misuse() {
        let vm = launch();
        let env = env(&vm);
        unsafe {
            vm.find_class(env, "no/Such");
            vm.new_string(env, "x");
        }
        assert_eq!(vm.misuse().len(), 1);
    }

    #[test]
    fn test_static_call_and_string_roundtrip() {
        let vm = launch();
        let env = env(&vm);
        unsafe {
            let class = vm.find_class(env, "java/lang/String");
            let id = vm
                .get_method_id(env, class, "valueOf", "(I)Ljava/lang/String;", true)
                .unwrap();
            let result = vm.call_static_method(env, class, id, ReturnKind::Object, &[JValue::Int(42)]);
            let JValue::Object(s) = result else {
                panic!("expected object, got {:?}", result);
            };
            assert_eq!(vm.get_string(env, s).as_deref(), Some("42"));
        }
        assert!(vm.stats().method_calls >= 1);
    }

    #[test]
    fn test_classpath_gated_class() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = SimLauncher::builder()
            .class(ClassBuilder::new("pkg/Hidden").on_classpath())
            .build()
            .unwrap();

        launcher.launch(&Configuration::default()).unwrap();
        let first = launcher.vm().unwrap();
        let first_env = env(&first);
        unsafe {
            assert!(first.find_class(first_env, "pkg/Hidden").is_null());
            first.exception_clear(first_env);
        }

        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/Hidden.class"), b"").unwrap();
        let config = Configuration::default().with_classpath_entry(dir.path());
        launcher.launch(&config).unwrap();
        let second = launcher.vm().unwrap();
        let second_env = env(&second);
        unsafe {
            assert!(!second.find_class(second_env, "pkg/Hidden").is_null());
        }
    }

    #[test]
    fn test_weak_refs_clear_without_strong_holder() {
        let vm = launch();
        let env = env(&vm);
        unsafe {
            let s = vm.new_string(env, "weak");
            let weak = vm.new_weak_global_ref(env, s);
            vm.delete_local_ref(env, s);
            vm.clear_weak_refs();
            assert!(vm.new_local_ref(env, weak).is_null());
        }
    }

    #[test]
    fn test_failing_launches() {
        let launcher = SimLauncher::builder().failing_launches(1).build().unwrap();
        assert!(matches!(
            launcher.launch(&Configuration::default()),
            Err(StartupError::CreateFailed { .. })
        ));
        assert!(launcher.launch(&Configuration::default()).is_ok());
        assert_eq!(launcher.launches(), 2);
        assert_eq!(launcher.vms().len(), 1);
    }
}

//! JNI backend
//!
//! Drives a real `libjvm` through the `JNIEnv` and `JavaVM` function tables.

use std::ffi::{c_char, c_void, CString};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use jvm_bridge_sys::{
    self as sys, index, jboolean, jbyte, jchar, jdouble, jfloat, jint, jlong, jobject, jshort,
    jsize, jvalue, table_fn, JNIEnv, JavaVM, JavaVMAttachArgs, JavaVMInitArgs, JavaVMOption,
    Library,
};

use super::{JValue, Launcher, NativeInterface, PrimitiveArray, RawEnv, RawId, RawRef};
use crate::config::Configuration;
use crate::error::StartupError;
use crate::signature::ReturnKind;

use super::locate;

/// Set once a VM has been created in this process. JNI allows at most one
/// VM per process, and never a second one after destruction.
static VM_CREATED: AtomicBool = AtomicBool::new(false);

/// Launches a real JVM from `libjvm`
#[derive(Debug, Default, Clone, Copy)]
pub struct JniLauncher;

impl JniLauncher {
    /// Create a launcher
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for JniLauncher {
    fn launch(&self, config: &Configuration) -> Result<Box<dyn NativeInterface>, StartupError> {
        if VM_CREATED.swap(true, Ordering::SeqCst) {
            return Err(StartupError::AlreadyCreated);
        }
        match create_vm(config) {
            Ok(vm) => Ok(Box::new(vm)),
            Err(e) => {
                VM_CREATED.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

/// Extra options applied on Apple Silicon hosts
fn platform_options() -> Vec<String> {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        vec![
            "-Djava.awt.headless=true".to_string(),
            "-XX:+UseG1GC".to_string(),
            "-XX:MaxGCPauseMillis=200".to_string(),
            "-XX:+ExplicitGCInvokesConcurrent".to_string(),
        ]
    } else {
        Vec::new()
    }
}

fn create_vm(config: &Configuration) -> Result<JniInterface, StartupError> {
    let path = locate::find_libjvm(config)?;
    log::info!("Using libjvm at: {}", path.display());

    let library = Library::open(&path).map_err(|e| StartupError::LibraryLoad {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let create: sys::CreateJavaVmFn = unsafe { library.get(sys::CREATE_JAVA_VM_SYMBOL) }
        .map_err(|_| StartupError::SymbolMissing {
            symbol: sys::CREATE_JAVA_VM_SYMBOL.to_string(),
            path: path.clone(),
        })?;

    let mut option_strings = Vec::new();
    for option in config.vm_options().into_iter().chain(platform_options()) {
        log::debug!("JVM option: {}", option);
        let c_option = CString::new(option).map_err(|_| {
            StartupError::InvalidConfiguration("VM options must not contain NUL".to_string())
        })?;
        option_strings.push(c_option);
    }
    let mut options: Vec<JavaVMOption> = option_strings
        .iter()
        .map(|s| JavaVMOption {
            option_string: s.as_ptr() as *mut _,
            extra_info: ptr::null_mut(),
        })
        .collect();

    let mut args = JavaVMInitArgs {
        version: sys::JNI_VERSION_1_8,
        n_options: options.len() as jint,
        options: if options.is_empty() {
            ptr::null_mut()
        } else {
            options.as_mut_ptr()
        },
        ignore_unrecognized: sys::JNI_FALSE,
    };

    let mut vm: JavaVM = ptr::null_mut();
    let mut env: *mut c_void = ptr::null_mut();
    let rc = unsafe { create(&mut vm, &mut env, &mut args as *mut JavaVMInitArgs as *mut c_void) };
    if rc != sys::JNI_OK || vm.is_null() {
        return Err(StartupError::CreateFailed { code: rc });
    }

    let interface = JniInterface {
        vm: vm as usize,
        // libjvm cannot be unloaded once a VM was created in it
        _library: Box::leak(Box::new(library)),
    };

    // JNI_CreateJavaVM leaves the launching thread attached as a non-daemon
    // thread, and DestroyJavaVM waits for every non-daemon thread. Detach it
    // so this thread re-attaches as a daemon on first use like any other.
    let rc = unsafe { interface.detach_current_thread() };
    if rc != sys::JNI_OK {
        log::warn!("Detaching the launching thread returned {}", rc);
    }
    Ok(interface)
}

/// A JVM created through `JNI_CreateJavaVM`
#[derive(Debug)]
pub struct JniInterface {
    vm: usize,
    _library: &'static Library,
}

type CallA<R> = unsafe extern "system" fn(JNIEnv, jobject, sys::jmethodID, *const jvalue) -> R;
type GetField<R> = unsafe extern "system" fn(JNIEnv, jobject, sys::jfieldID) -> R;
type SetField<V> = unsafe extern "system" fn(JNIEnv, jobject, sys::jfieldID, V);
type NewArray = unsafe extern "system" fn(JNIEnv, jsize) -> jobject;
type GetRegion<T> = unsafe extern "system" fn(JNIEnv, jobject, jsize, jsize, *mut T);
type SetRegion<T> = unsafe extern "system" fn(JNIEnv, jobject, jsize, jsize, *const T);
type GetId = unsafe extern "system" fn(JNIEnv, jobject, *const c_char, *const c_char) -> *mut c_void;

fn env_ptr(env: RawEnv) -> JNIEnv {
    env.0 as JNIEnv
}

fn obj(r: RawRef) -> jobject {
    r.0 as jobject
}

fn raw(o: jobject) -> RawRef {
    RawRef(o as usize)
}

fn to_jvalue(value: &JValue) -> jvalue {
    match *value {
        JValue::Void => jvalue { j: 0 },
        JValue::Boolean(b) => jvalue { z: b as jboolean },
        JValue::Byte(b) => jvalue { b },
        JValue::Char(c) => jvalue { c },
        JValue::Short(s) => jvalue { s },
        JValue::Int(i) => jvalue { i },
        JValue::Long(j) => jvalue { j },
        JValue::Float(f) => jvalue { f },
        JValue::Double(d) => jvalue { d },
        JValue::Object(r) => jvalue { l: obj(r) },
    }
}

/// Slot offset of a primitive kind among the `<Type>Array` families,
/// which start at Boolean
fn array_slot(kind: ReturnKind) -> usize {
    kind.call_slot() - 1
}

unsafe fn call_a<R>(env: RawEnv, slot: usize, target: RawRef, id: RawId, args: &[jvalue]) -> R {
    let env = env_ptr(env);
    let f: CallA<R> = table_fn(env, slot);
    f(env, obj(target), id.0 as sys::jmethodID, args.as_ptr())
}

unsafe fn dispatch(env: RawEnv, base: usize, target: RawRef, id: RawId, kind: ReturnKind, args: &[JValue]) -> JValue {
    let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
    let slot = base + kind.call_slot() * index::env::CALL_METHOD_A_STRIDE;
    match kind {
        ReturnKind::Object => JValue::Object(raw(call_a::<jobject>(env, slot, target, id, &args))),
        ReturnKind::Boolean => JValue::Boolean(call_a::<jboolean>(env, slot, target, id, &args) != 0),
        ReturnKind::Byte => JValue::Byte(call_a::<jbyte>(env, slot, target, id, &args)),
        ReturnKind::Char => JValue::Char(call_a::<jchar>(env, slot, target, id, &args)),
        ReturnKind::Short => JValue::Short(call_a::<jshort>(env, slot, target, id, &args)),
        ReturnKind::Int => JValue::Int(call_a::<jint>(env, slot, target, id, &args)),
        ReturnKind::Long => JValue::Long(call_a::<jlong>(env, slot, target, id, &args)),
        ReturnKind::Float => JValue::Float(call_a::<jfloat>(env, slot, target, id, &args)),
        ReturnKind::Double => JValue::Double(call_a::<jdouble>(env, slot, target, id, &args)),
        ReturnKind::Void => {
            call_a::<()>(env, slot, target, id, &args);
            JValue::Void
        }
    }
}

unsafe fn get_field_a<R>(env: RawEnv, slot: usize, target: RawRef, id: RawId) -> R {
    let env = env_ptr(env);
    let f: GetField<R> = table_fn(env, slot);
    f(env, obj(target), id.0 as sys::jfieldID)
}

unsafe fn read_field(env: RawEnv, base: usize, target: RawRef, id: RawId, kind: ReturnKind) -> JValue {
    let slot = base + kind.call_slot();
    match kind {
        ReturnKind::Object => JValue::Object(raw(get_field_a::<jobject>(env, slot, target, id))),
        ReturnKind::Boolean => JValue::Boolean(get_field_a::<jboolean>(env, slot, target, id) != 0),
        ReturnKind::Byte => JValue::Byte(get_field_a(env, slot, target, id)),
        ReturnKind::Char => JValue::Char(get_field_a(env, slot, target, id)),
        ReturnKind::Short => JValue::Short(get_field_a(env, slot, target, id)),
        ReturnKind::Int => JValue::Int(get_field_a(env, slot, target, id)),
        ReturnKind::Long => JValue::Long(get_field_a(env, slot, target, id)),
        ReturnKind::Float => JValue::Float(get_field_a(env, slot, target, id)),
        ReturnKind::Double => JValue::Double(get_field_a(env, slot, target, id)),
        ReturnKind::Void => JValue::Void,
    }
}

unsafe fn set_field_a<V>(env: RawEnv, slot: usize, target: RawRef, id: RawId, value: V) {
    let env = env_ptr(env);
    let f: SetField<V> = table_fn(env, slot);
    f(env, obj(target), id.0 as sys::jfieldID, value)
}

unsafe fn write_field(env: RawEnv, base: usize, target: RawRef, id: RawId, value: JValue) {
    let slot = base + value.kind().call_slot();
    match value {
        JValue::Void => {}
        JValue::Object(r) => set_field_a(env, slot, target, id, obj(r)),
        JValue::Boolean(b) => set_field_a(env, slot, target, id, b as jboolean),
        JValue::Byte(v) => set_field_a(env, slot, target, id, v),
        JValue::Char(v) => set_field_a(env, slot, target, id, v),
        JValue::Short(v) => set_field_a(env, slot, target, id, v),
        JValue::Int(v) => set_field_a(env, slot, target, id, v),
        JValue::Long(v) => set_field_a(env, slot, target, id, v),
        JValue::Float(v) => set_field_a(env, slot, target, id, v),
        JValue::Double(v) => set_field_a(env, slot, target, id, v),
    }
}

unsafe fn read_region<T: Copy + Default>(env: RawEnv, kind: ReturnKind, array: RawRef, len: jsize) -> Vec<T> {
    let env = env_ptr(env);
    let f: GetRegion<T> = table_fn(env, index::env::GET_BOOLEAN_ARRAY_REGION + array_slot(kind));
    let mut buf = vec![T::default(); len.max(0) as usize];
    f(env, obj(array), 0, len, buf.as_mut_ptr());
    buf
}

unsafe fn new_filled<T>(env: RawEnv, kind: ReturnKind, values: &[T]) -> RawRef {
    let env_p = env_ptr(env);
    let new: NewArray = table_fn(env_p, index::env::NEW_BOOLEAN_ARRAY + array_slot(kind));
    let array = new(env_p, values.len() as jsize);
    if array.is_null() {
        return RawRef::NULL;
    }
    let set: SetRegion<T> = table_fn(env_p, index::env::SET_BOOLEAN_ARRAY_REGION + array_slot(kind));
    set(env_p, array, 0, values.len() as jsize, values.as_ptr());
    raw(array)
}

impl JniInterface {
    fn vm_ptr(&self) -> JavaVM {
        self.vm as JavaVM
    }

    unsafe fn lookup_id(&self, env: RawEnv, slot: usize, class: RawRef, name: &str, descriptor: &str) -> Option<RawId> {
        let name = CString::new(name).ok()?;
        let descriptor = CString::new(descriptor).ok()?;
        let env = env_ptr(env);
        let f: GetId = table_fn(env, slot);
        let id = f(env, obj(class), name.as_ptr(), descriptor.as_ptr());
        if id.is_null() {
            None
        } else {
            Some(RawId(id as usize))
        }
    }
}

impl NativeInterface for JniInterface {
    unsafe fn attach_current_thread(&self) -> Result<RawEnv, i32> {
        let vm = self.vm_ptr();
        let attach: unsafe extern "system" fn(JavaVM, *mut *mut c_void, *mut c_void) -> jint =
            table_fn(vm, index::invoke::ATTACH_CURRENT_THREAD_AS_DAEMON);
        let mut args = JavaVMAttachArgs {
            version: sys::JNI_VERSION_1_8,
            name: ptr::null_mut(),
            group: ptr::null_mut(),
        };
        let mut env: *mut c_void = ptr::null_mut();
        let rc = attach(vm, &mut env, &mut args as *mut JavaVMAttachArgs as *mut c_void);
        if rc != sys::JNI_OK || env.is_null() {
            return Err(rc);
        }
        Ok(RawEnv(env as usize))
    }

    unsafe fn detach_current_thread(&self) -> i32 {
        let vm = self.vm_ptr();
        let detach: unsafe extern "system" fn(JavaVM) -> jint =
            table_fn(vm, index::invoke::DETACH_CURRENT_THREAD);
        detach(vm)
    }

    unsafe fn destroy_vm(&self) -> i32 {
        let vm = self.vm_ptr();
        let destroy: unsafe extern "system" fn(JavaVM) -> jint =
            table_fn(vm, index::invoke::DESTROY_JAVA_VM);
        destroy(vm)
    }

    unsafe fn find_class(&self, env: RawEnv, name: &str) -> RawRef {
        let Ok(name) = CString::new(name) else {
            return RawRef::NULL;
        };
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, *const c_char) -> jobject =
            table_fn(env, index::env::FIND_CLASS);
        raw(f(env, name.as_ptr()))
    }

    unsafe fn get_object_class(&self, env: RawEnv, target: RawRef) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jobject =
            table_fn(env, index::env::GET_OBJECT_CLASS);
        raw(f(env, obj(target)))
    }

    unsafe fn is_instance_of(&self, env: RawEnv, target: RawRef, class: RawRef) -> bool {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject, jobject) -> jboolean =
            table_fn(env, index::env::IS_INSTANCE_OF);
        f(env, obj(target), obj(class)) != 0
    }

    unsafe fn get_method_id(&self, env: RawEnv, class: RawRef, name: &str, descriptor: &str, is_static: bool) -> Option<RawId> {
        let slot = if is_static {
            index::env::GET_STATIC_METHOD_ID
        } else {
            index::env::GET_METHOD_ID
        };
        self.lookup_id(env, slot, class, name, descriptor)
    }

    unsafe fn get_field_id(&self, env: RawEnv, class: RawRef, name: &str, descriptor: &str, is_static: bool) -> Option<RawId> {
        let slot = if is_static {
            index::env::GET_STATIC_FIELD_ID
        } else {
            index::env::GET_FIELD_ID
        };
        self.lookup_id(env, slot, class, name, descriptor)
    }

    unsafe fn new_object(&self, env: RawEnv, class: RawRef, ctor: RawId, args: &[JValue]) -> RawRef {
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        raw(call_a::<jobject>(env, index::env::NEW_OBJECT_A, class, ctor, &args))
    }

    unsafe fn call_method(&self, env: RawEnv, target: RawRef, method: RawId, kind: ReturnKind, args: &[JValue]) -> JValue {
        dispatch(env, index::env::CALL_OBJECT_METHOD_A, target, method, kind, args)
    }

    unsafe fn call_static_method(&self, env: RawEnv, class: RawRef, method: RawId, kind: ReturnKind, args: &[JValue]) -> JValue {
        dispatch(env, index::env::CALL_STATIC_OBJECT_METHOD_A, class, method, kind, args)
    }

    unsafe fn get_field(&self, env: RawEnv, target: RawRef, field: RawId, kind: ReturnKind) -> JValue {
        read_field(env, index::env::GET_OBJECT_FIELD, target, field, kind)
    }

    unsafe fn set_field(&self, env: RawEnv, target: RawRef, field: RawId, value: JValue) {
        write_field(env, index::env::SET_OBJECT_FIELD, target, field, value)
    }

    unsafe fn get_static_field(&self, env: RawEnv, class: RawRef, field: RawId, kind: ReturnKind) -> JValue {
        read_field(env, index::env::GET_STATIC_OBJECT_FIELD, class, field, kind)
    }

    unsafe fn set_static_field(&self, env: RawEnv, class: RawRef, field: RawId, value: JValue) {
        write_field(env, index::env::SET_STATIC_OBJECT_FIELD, class, field, value)
    }

    unsafe fn new_string(&self, env: RawEnv, text: &str) -> RawRef {
        let units: Vec<jchar> = text.encode_utf16().collect();
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, *const jchar, jsize) -> jobject =
            table_fn(env, index::env::NEW_STRING);
        raw(f(env, units.as_ptr(), units.len() as jsize))
    }

    unsafe fn get_string(&self, env: RawEnv, string: RawRef) -> Option<String> {
        let env_p = env_ptr(env);
        let length: unsafe extern "system" fn(JNIEnv, jobject) -> jsize =
            table_fn(env_p, index::env::GET_STRING_LENGTH);
        let len = length(env_p, obj(string));
        if len < 0 {
            return None;
        }
        let region: GetRegion<jchar> = table_fn(env_p, index::env::GET_STRING_REGION);
        let mut buf = vec![0u16; len as usize];
        region(env_p, obj(string), 0, len, buf.as_mut_ptr());
        Some(String::from_utf16_lossy(&buf))
    }

    unsafe fn get_array_length(&self, env: RawEnv, array: RawRef) -> i32 {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jsize =
            table_fn(env, index::env::GET_ARRAY_LENGTH);
        f(env, obj(array))
    }

    unsafe fn new_object_array(&self, env: RawEnv, len: i32, component: RawRef, init: RawRef) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jsize, jobject, jobject) -> jobject =
            table_fn(env, index::env::NEW_OBJECT_ARRAY);
        raw(f(env, len, obj(component), obj(init)))
    }

    unsafe fn get_object_array_element(&self, env: RawEnv, array: RawRef, idx: i32) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject, jsize) -> jobject =
            table_fn(env, index::env::GET_OBJECT_ARRAY_ELEMENT);
        raw(f(env, obj(array), idx))
    }

    unsafe fn set_object_array_element(&self, env: RawEnv, array: RawRef, idx: i32, value: RawRef) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject, jsize, jobject) =
            table_fn(env, index::env::SET_OBJECT_ARRAY_ELEMENT);
        f(env, obj(array), idx, obj(value))
    }

    unsafe fn new_primitive_array(&self, env: RawEnv, values: &PrimitiveArray) -> RawRef {
        let kind = values.kind();
        match values {
            PrimitiveArray::Boolean(v) => {
                let bytes: Vec<jboolean> = v.iter().map(|b| *b as jboolean).collect();
                new_filled(env, kind, &bytes)
            }
            PrimitiveArray::Byte(v) => new_filled(env, kind, v),
            PrimitiveArray::Char(v) => new_filled(env, kind, v),
            PrimitiveArray::Short(v) => new_filled(env, kind, v),
            PrimitiveArray::Int(v) => new_filled(env, kind, v),
            PrimitiveArray::Long(v) => new_filled(env, kind, v),
            PrimitiveArray::Float(v) => new_filled(env, kind, v),
            PrimitiveArray::Double(v) => new_filled(env, kind, v),
        }
    }

    unsafe fn get_primitive_array(&self, env: RawEnv, array: RawRef, kind: ReturnKind) -> Option<PrimitiveArray> {
        let len = self.get_array_length(env, array);
        Some(match kind {
            ReturnKind::Boolean => PrimitiveArray::Boolean(
                read_region::<jboolean>(env, kind, array, len)
                    .into_iter()
                    .map(|b| b != 0)
                    .collect(),
            ),
            ReturnKind::Byte => PrimitiveArray::Byte(read_region(env, kind, array, len)),
            ReturnKind::Char => PrimitiveArray::Char(read_region(env, kind, array, len)),
            ReturnKind::Short => PrimitiveArray::Short(read_region(env, kind, array, len)),
            ReturnKind::Int => PrimitiveArray::Int(read_region(env, kind, array, len)),
            ReturnKind::Long => PrimitiveArray::Long(read_region(env, kind, array, len)),
            ReturnKind::Float => PrimitiveArray::Float(read_region(env, kind, array, len)),
            ReturnKind::Double => PrimitiveArray::Double(read_region(env, kind, array, len)),
            ReturnKind::Void | ReturnKind::Object => return None,
        })
    }

    unsafe fn new_global_ref(&self, env: RawEnv, target: RawRef) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jobject =
            table_fn(env, index::env::NEW_GLOBAL_REF);
        raw(f(env, obj(target)))
    }

    unsafe fn delete_global_ref(&self, env: RawEnv, target: RawRef) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) = table_fn(env, index::env::DELETE_GLOBAL_REF);
        f(env, obj(target))
    }

    unsafe fn new_local_ref(&self, env: RawEnv, target: RawRef) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jobject =
            table_fn(env, index::env::NEW_LOCAL_REF);
        raw(f(env, obj(target)))
    }

    unsafe fn delete_local_ref(&self, env: RawEnv, target: RawRef) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) = table_fn(env, index::env::DELETE_LOCAL_REF);
        f(env, obj(target))
    }

    unsafe fn new_weak_global_ref(&self, env: RawEnv, target: RawRef) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jobject =
            table_fn(env, index::env::NEW_WEAK_GLOBAL_REF);
        raw(f(env, obj(target)))
    }

    unsafe fn delete_weak_global_ref(&self, env: RawEnv, target: RawRef) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) =
            table_fn(env, index::env::DELETE_WEAK_GLOBAL_REF);
        f(env, obj(target))
    }

    unsafe fn push_local_frame(&self, env: RawEnv, capacity: i32) -> i32 {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jint) -> jint = table_fn(env, index::env::PUSH_LOCAL_FRAME);
        f(env, capacity)
    }

    unsafe fn pop_local_frame(&self, env: RawEnv) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv, jobject) -> jobject =
            table_fn(env, index::env::POP_LOCAL_FRAME);
        f(env, ptr::null_mut());
    }

    unsafe fn exception_check(&self, env: RawEnv) -> bool {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv) -> jboolean = table_fn(env, index::env::EXCEPTION_CHECK);
        f(env) != 0
    }

    unsafe fn exception_occurred(&self, env: RawEnv) -> RawRef {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv) -> jobject =
            table_fn(env, index::env::EXCEPTION_OCCURRED);
        raw(f(env))
    }

    unsafe fn exception_clear(&self, env: RawEnv) {
        let env = env_ptr(env);
        let f: unsafe extern "system" fn(JNIEnv) = table_fn(env, index::env::EXCEPTION_CLEAR);
        f(env)
    }
}

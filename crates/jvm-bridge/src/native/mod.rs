//! Native interface seam
//!
//! [`NativeInterface`] is the binary interface of a running foreign VM,
//! expressed with opaque values instead of pointers. Two implementations
//! exist:
//! - [`jni::JniInterface`]: a real `libjvm` driven through the JNI function
//!   tables (see [`JniLauncher`])
//! - `sim::SimVm`: an in-process simulated VM, behind the `sim` feature
//!
//! Only the gateway calls into this trait. Every method that can raise a
//! foreign exception leaves it pending, exactly like JNI; the caller must
//! check and clear it before issuing another call.

pub mod jni;
pub mod locate;

pub use jni::{JniInterface, JniLauncher};

use crate::config::Configuration;
use crate::error::StartupError;
use crate::signature::ReturnKind;
use std::sync::Arc;

/// An opaque object reference (local, global or weak) as handed out by the VM.
///
/// Never leaves the handle table or the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRef(pub(crate) usize);

impl RawRef {
    /// The null reference
    pub const NULL: RawRef = RawRef(0);

    /// Whether this is the null reference
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// An opaque method or field identifier. Valid for the VM's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawId(pub(crate) usize);

/// An opaque per-thread environment pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEnv(pub(crate) usize);

/// A typed argument, return value or field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    /// No value (`void` returns)
    Void,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char` (one UTF-16 code unit)
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
    /// Any reference, possibly null
    Object(RawRef),
}

impl JValue {
    /// The kind of this value
    pub fn kind(&self) -> ReturnKind {
        match self {
            JValue::Void => ReturnKind::Void,
            JValue::Boolean(_) => ReturnKind::Boolean,
            JValue::Byte(_) => ReturnKind::Byte,
            JValue::Char(_) => ReturnKind::Char,
            JValue::Short(_) => ReturnKind::Short,
            JValue::Int(_) => ReturnKind::Int,
            JValue::Long(_) => ReturnKind::Long,
            JValue::Float(_) => ReturnKind::Float,
            JValue::Double(_) => ReturnKind::Double,
            JValue::Object(_) => ReturnKind::Object,
        }
    }
}

/// Contents of a primitive array
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    /// `boolean[]`
    Boolean(Vec<bool>),
    /// `byte[]`
    Byte(Vec<i8>),
    /// `char[]`
    Char(Vec<u16>),
    /// `short[]`
    Short(Vec<i16>),
    /// `int[]`
    Int(Vec<i32>),
    /// `long[]`
    Long(Vec<i64>),
    /// `float[]`
    Float(Vec<f32>),
    /// `double[]`
    Double(Vec<f64>),
}

impl PrimitiveArray {
    /// Element kind
    pub fn kind(&self) -> ReturnKind {
        match self {
            PrimitiveArray::Boolean(_) => ReturnKind::Boolean,
            PrimitiveArray::Byte(_) => ReturnKind::Byte,
            PrimitiveArray::Char(_) => ReturnKind::Char,
            PrimitiveArray::Short(_) => ReturnKind::Short,
            PrimitiveArray::Int(_) => ReturnKind::Int,
            PrimitiveArray::Long(_) => ReturnKind::Long,
            PrimitiveArray::Float(_) => ReturnKind::Float,
            PrimitiveArray::Double(_) => ReturnKind::Double,
        }
    }

    /// Element count
    pub fn len(&self) -> usize {
        match self {
            PrimitiveArray::Boolean(v) => v.len(),
            PrimitiveArray::Byte(v) => v.len(),
            PrimitiveArray::Char(v) => v.len(),
            PrimitiveArray::Short(v) => v.len(),
            PrimitiveArray::Int(v) => v.len(),
            PrimitiveArray::Long(v) => v.len(),
            PrimitiveArray::Float(v) => v.len(),
            PrimitiveArray::Double(v) => v.len(),
        }
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty array of the given element kind (`None` for void/object)
    pub fn empty(kind: ReturnKind) -> Option<Self> {
        Some(match kind {
            ReturnKind::Boolean => PrimitiveArray::Boolean(Vec::new()),
            ReturnKind::Byte => PrimitiveArray::Byte(Vec::new()),
            ReturnKind::Char => PrimitiveArray::Char(Vec::new()),
            ReturnKind::Short => PrimitiveArray::Short(Vec::new()),
            ReturnKind::Int => PrimitiveArray::Int(Vec::new()),
            ReturnKind::Long => PrimitiveArray::Long(Vec::new()),
            ReturnKind::Float => PrimitiveArray::Float(Vec::new()),
            ReturnKind::Double => PrimitiveArray::Double(Vec::new()),
            ReturnKind::Void | ReturnKind::Object => return None,
        })
    }
}

/// The binary interface of a running VM.
///
/// # Safety
///
/// All methods are `unsafe`: `env` must be the environment of the calling
/// thread, every [`RawRef`] must be live in that environment, and no call may
/// be issued while a foreign exception is pending (except the exception
/// functions themselves).
pub trait NativeInterface: Send + Sync {
    /// Attach the calling thread as a daemon thread (idempotent per thread).
    /// Returns the JNI status code on failure.
    unsafe fn attach_current_thread(&self) -> Result<RawEnv, i32>;

    /// Detach the calling thread
    unsafe fn detach_current_thread(&self) -> i32;

    /// Destroy the VM. No call is valid afterwards.
    unsafe fn destroy_vm(&self) -> i32;

    /// `FindClass` (internal name)
    unsafe fn find_class(&self, env: RawEnv, name: &str) -> RawRef;

    /// `GetObjectClass`
    unsafe fn get_object_class(&self, env: RawEnv, obj: RawRef) -> RawRef;

    /// `IsInstanceOf`
    unsafe fn is_instance_of(&self, env: RawEnv, obj: RawRef, class: RawRef) -> bool;

    /// `GetMethodID` / `GetStaticMethodID`; `None` leaves an exception pending
    unsafe fn get_method_id(
        &self,
        env: RawEnv,
        class: RawRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<RawId>;

    /// `GetFieldID` / `GetStaticFieldID`
    unsafe fn get_field_id(
        &self,
        env: RawEnv,
        class: RawRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<RawId>;

    /// `NewObjectA`
    unsafe fn new_object(&self, env: RawEnv, class: RawRef, ctor: RawId, args: &[JValue]) -> RawRef;

    /// `Call<Kind>MethodA`
    unsafe fn call_method(
        &self,
        env: RawEnv,
        obj: RawRef,
        method: RawId,
        kind: ReturnKind,
        args: &[JValue],
    ) -> JValue;

    /// `CallStatic<Kind>MethodA`
    unsafe fn call_static_method(
        &self,
        env: RawEnv,
        class: RawRef,
        method: RawId,
        kind: ReturnKind,
        args: &[JValue],
    ) -> JValue;

    /// `Get<Kind>Field`
    unsafe fn get_field(&self, env: RawEnv, obj: RawRef, field: RawId, kind: ReturnKind) -> JValue;

    /// `Set<Kind>Field`
    unsafe fn set_field(&self, env: RawEnv, obj: RawRef, field: RawId, value: JValue);

    /// `GetStatic<Kind>Field`
    unsafe fn get_static_field(&self, env: RawEnv, class: RawRef, field: RawId, kind: ReturnKind) -> JValue;

    /// `SetStatic<Kind>Field`
    unsafe fn set_static_field(&self, env: RawEnv, class: RawRef, field: RawId, value: JValue);

    /// `NewString` from UTF-8 text (converted to UTF-16)
    unsafe fn new_string(&self, env: RawEnv, text: &str) -> RawRef;

    /// `GetStringLength` + `GetStringRegion`, decoded from UTF-16
    unsafe fn get_string(&self, env: RawEnv, string: RawRef) -> Option<String>;

    /// `GetArrayLength`
    unsafe fn get_array_length(&self, env: RawEnv, array: RawRef) -> i32;

    /// `NewObjectArray`
    unsafe fn new_object_array(&self, env: RawEnv, len: i32, component: RawRef, init: RawRef) -> RawRef;

    /// `GetObjectArrayElement`
    unsafe fn get_object_array_element(&self, env: RawEnv, array: RawRef, index: i32) -> RawRef;

    /// `SetObjectArrayElement`
    unsafe fn set_object_array_element(&self, env: RawEnv, array: RawRef, index: i32, value: RawRef);

    /// `New<Kind>Array` + `Set<Kind>ArrayRegion`
    unsafe fn new_primitive_array(&self, env: RawEnv, values: &PrimitiveArray) -> RawRef;

    /// `Get<Kind>ArrayRegion` over the whole array
    unsafe fn get_primitive_array(&self, env: RawEnv, array: RawRef, kind: ReturnKind) -> Option<PrimitiveArray>;

    /// `NewGlobalRef`
    unsafe fn new_global_ref(&self, env: RawEnv, obj: RawRef) -> RawRef;

    /// `DeleteGlobalRef`
    unsafe fn delete_global_ref(&self, env: RawEnv, obj: RawRef);

    /// `NewLocalRef` (null if the referent of a weak ref was collected)
    unsafe fn new_local_ref(&self, env: RawEnv, obj: RawRef) -> RawRef;

    /// `DeleteLocalRef`
    unsafe fn delete_local_ref(&self, env: RawEnv, obj: RawRef);

    /// `NewWeakGlobalRef`
    unsafe fn new_weak_global_ref(&self, env: RawEnv, obj: RawRef) -> RawRef;

    /// `DeleteWeakGlobalRef`
    unsafe fn delete_weak_global_ref(&self, env: RawEnv, obj: RawRef);

    /// `PushLocalFrame`; returns the JNI status code
    unsafe fn push_local_frame(&self, env: RawEnv, capacity: i32) -> i32;

    /// `PopLocalFrame(NULL)`
    unsafe fn pop_local_frame(&self, env: RawEnv);

    /// `ExceptionCheck`
    unsafe fn exception_check(&self, env: RawEnv) -> bool;

    /// `ExceptionOccurred`
    unsafe fn exception_occurred(&self, env: RawEnv) -> RawRef;

    /// `ExceptionClear`
    unsafe fn exception_clear(&self, env: RawEnv);
}

/// Creates VM instances for the lifecycle manager
pub trait Launcher: Send + Sync {
    /// Create a VM for the configuration. The calling thread is attached.
    fn launch(&self, config: &Configuration) -> Result<Box<dyn NativeInterface>, StartupError>;
}

impl<L: Launcher + ?Sized> Launcher for Arc<L> {
    fn launch(&self, config: &Configuration) -> Result<Box<dyn NativeInterface>, StartupError> {
        (**self).launch(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_ref() {
        assert!(RawRef::NULL.is_null());
        assert!(!RawRef(8).is_null());
    }

    #[test]
    fn test_primitive_array_kinds() {
        let array = PrimitiveArray::Int(vec![1, 2, 3]);
        assert_eq!(array.kind(), ReturnKind::Int);
        assert_eq!(array.len(), 3);
        assert_eq!(PrimitiveArray::empty(ReturnKind::Double), Some(PrimitiveArray::Double(vec![])));
        assert_eq!(PrimitiveArray::empty(ReturnKind::Object), None);
        assert_eq!(JValue::Long(1).kind(), ReturnKind::Long);
    }
}

//! Raw JNI declarations
//!
//! This crate declares the subset of the Java Native Interface that the bridge
//! consumes:
//! - Primitive JNI types and the `jvalue` argument union
//! - VM creation structures (`JavaVMInitArgs`, `JavaVMOption`, `JavaVMAttachArgs`)
//! - Function-table indices for `JNIEnv` and the invocation interface
//! - Typed access to function-table slots
//! - Cross-platform dynamic library loading (for `libjvm`)
//!
//! Nothing here is safe to call on its own; the `jvm-bridge` crate wraps
//! every entry point behind exception checks and handle bookkeeping.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(non_camel_case_types)]

pub mod index;
pub mod library;

pub use library::{Library, LoadError};

use std::os::raw::{c_char, c_void};

/// JNI `jboolean` (unsigned 8-bit)
pub type jboolean = u8;
/// JNI `jbyte`
pub type jbyte = i8;
/// JNI `jchar` (UTF-16 code unit)
pub type jchar = u16;
/// JNI `jshort`
pub type jshort = i16;
/// JNI `jint`
pub type jint = i32;
/// JNI `jlong`
pub type jlong = i64;
/// JNI `jfloat`
pub type jfloat = f32;
/// JNI `jdouble`
pub type jdouble = f64;
/// JNI `jsize`
pub type jsize = jint;

/// Opaque object reference
pub type jobject = *mut c_void;
/// Class reference
pub type jclass = jobject;
/// String reference
pub type jstring = jobject;
/// Array reference
pub type jarray = jobject;
/// Throwable reference
pub type jthrowable = jobject;
/// Weak global reference
pub type jweak = jobject;
/// Opaque method identifier
pub type jmethodID = *mut c_void;
/// Opaque field identifier
pub type jfieldID = *mut c_void;

/// `JNIEnv*`: pointer to a pointer to the JNI function table
pub type JNIEnv = *mut *const *const c_void;
/// `JavaVM*`: pointer to a pointer to the invocation function table
pub type JavaVM = *mut *const *const c_void;

/// Success
pub const JNI_OK: jint = 0;
/// Unknown error
pub const JNI_ERR: jint = -1;
/// Thread detached from the VM
pub const JNI_EDETACHED: jint = -2;
/// JNI version error
pub const JNI_EVERSION: jint = -3;
/// Not enough memory
pub const JNI_ENOMEM: jint = -4;
/// VM already created
pub const JNI_EEXIST: jint = -5;
/// Invalid arguments
pub const JNI_EINVAL: jint = -6;

/// `JNI_TRUE`
pub const JNI_TRUE: jboolean = 1;
/// `JNI_FALSE`
pub const JNI_FALSE: jboolean = 0;

/// JNI 1.8, the version requested at VM creation and attach
pub const JNI_VERSION_1_8: jint = 0x0001_0008;

/// Name of the VM creation symbol exported by `libjvm`
pub const CREATE_JAVA_VM_SYMBOL: &str = "JNI_CreateJavaVM";

/// JNI argument union
#[repr(C)]
#[derive(Clone, Copy)]
pub union jvalue {
    /// boolean
    pub z: jboolean,
    /// byte
    pub b: jbyte,
    /// char
    pub c: jchar,
    /// short
    pub s: jshort,
    /// int
    pub i: jint,
    /// long
    pub j: jlong,
    /// float
    pub f: jfloat,
    /// double
    pub d: jdouble,
    /// object
    pub l: jobject,
}

/// One `-D`/`-X` style VM option
#[repr(C)]
#[derive(Debug)]
pub struct JavaVMOption {
    /// NUL-terminated option text
    pub option_string: *mut c_char,
    /// Extra info for hooks, unused by the bridge
    pub extra_info: *mut c_void,
}

/// Arguments for `JNI_CreateJavaVM`
#[repr(C)]
#[derive(Debug)]
pub struct JavaVMInitArgs {
    /// Requested JNI version
    pub version: jint,
    /// Number of entries in `options`
    pub n_options: jint,
    /// Option array
    pub options: *mut JavaVMOption,
    /// Ignore unrecognized `-X` options instead of failing
    pub ignore_unrecognized: jboolean,
}

/// Arguments for `AttachCurrentThread[AsDaemon]`
#[repr(C)]
#[derive(Debug)]
pub struct JavaVMAttachArgs {
    /// Requested JNI version
    pub version: jint,
    /// Optional thread name (modified UTF-8)
    pub name: *mut c_char,
    /// Thread group, null for the main group
    pub group: jobject,
}

/// `jint JNI_CreateJavaVM(JavaVM **pvm, void **penv, void *args)`
pub type CreateJavaVmFn =
    unsafe extern "system" fn(*mut JavaVM, *mut *mut c_void, *mut c_void) -> jint;

/// Read a slot of a JNI function table.
///
/// # Safety
///
/// `table_owner` must be a live `JNIEnv*` or `JavaVM*`, `index` must be a valid
/// slot for that table, and `F` must be the exact function pointer type of
/// the slot.
#[inline]
pub unsafe fn table_fn<F: Copy>(table_owner: *mut *const *const c_void, index: usize) -> F {
    let table: *const *const c_void = *table_owner;
    let slot = table.add(index);
    debug_assert_eq!(
        std::mem::size_of::<F>(),
        std::mem::size_of::<*const c_void>()
    );
    std::mem::transmute_copy(&*slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jvalue_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<jvalue>(), 8);
    }

    #[test]
    fn test_table_fn_reads_slot() {
        extern "system" fn answer() -> jint {
            42
        }
        let slots: [*const c_void; 3] = [
            std::ptr::null(),
            std::ptr::null(),
            answer as *const c_void,
        ];
        let table_ptr: *const *const c_void = slots.as_ptr();
        let mut owner = table_ptr;
        let f: extern "system" fn() -> jint =
            unsafe { table_fn(&mut owner as *mut *const *const c_void, 2) };
        assert_eq!(f(), 42);
    }
}

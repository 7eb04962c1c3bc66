//! Scoped call frames

use std::marker::PhantomData;

use super::{ForeignCallGateway, ForeignValue, GlobalRef, OwnedRef, Permit, WeakRef};
use crate::error::{BridgeError, Result};
use crate::handle::{NativeHandle, RefKind};
use crate::native::{JValue, PrimitiveArray, RawEnv, RawId, RawRef};
use crate::signature::ReturnKind;
use std::sync::Arc;

/// A thread-bound scope for native calls.
///
/// Holds a call permit and a pushed local reference frame. Dropping the frame
/// pops it, retires every local handle created in it, and issues any queued
/// releases. Frames close innermost first: dropping a frame while frames
/// opened after it are still alive closes those too, and their handles go
/// stale.
pub struct Frame<'g> {
    gateway: &'g ForeignCallGateway,
    env: RawEnv,
    id: u64,
    _permit: Permit<'g>,
    _not_send: PhantomData<*const ()>,
}

impl<'g> Frame<'g> {
    pub(super) fn open(gateway: &'g ForeignCallGateway, env: RawEnv, permit: Permit<'g>, capacity: i32) -> Result<Self> {
        let rc = unsafe { gateway.native().push_local_frame(env, capacity) };
        if rc != jvm_bridge_sys::JNI_OK {
            return Err(BridgeError::ForeignException {
                class_name: "java.lang.OutOfMemoryError".to_string(),
                message: Some(format!("PushLocalFrame({}) failed with {}", capacity, rc)),
            });
        }
        let id = gateway.handles().open_frame();
        super::attach::enter_frame(gateway.vm_id(), id);
        Ok(Self {
            gateway,
            env,
            id,
            _permit: permit,
            _not_send: PhantomData,
        })
    }

    /// The gateway this frame belongs to
    pub fn gateway(&self) -> &'g ForeignCallGateway {
        self.gateway
    }

    fn raw(&self, handle: NativeHandle) -> Result<RawRef> {
        self.gateway.handles().resolve(handle)
    }

    fn raw_opt(&self, handle: Option<NativeHandle>) -> Result<RawRef> {
        match handle {
            Some(handle) => self.raw(handle),
            None => Ok(RawRef::NULL),
        }
    }

    fn local(&self, raw: RawRef) -> Option<NativeHandle> {
        if raw.is_null() {
            return None;
        }
        let handle = self.gateway.handles().register(raw, RefKind::Local, Some(self.id));
        if self.gateway.handles().resolve(handle).is_err() {
            // closed along with an enclosing frame; the handle is stale
            unsafe { self.gateway.native().delete_local_ref(self.env, raw) };
        }
        Some(handle)
    }

    fn required(&self, raw: RawRef, what: &str) -> Result<NativeHandle> {
        self.check()?;
        self.local(raw)
            .ok_or_else(|| BridgeError::Conversion(format!("{} returned null", what)))
    }

    /// Fail with `ForeignException` if an exception is pending, clearing it
    fn check(&self) -> Result<()> {
        let native = self.gateway.native();
        unsafe {
            if !native.exception_check(self.env) {
                return Ok(());
            }
            let throwable = native.exception_occurred(self.env);
            native.exception_clear(self.env);
            let err = self.describe(throwable);
            native.delete_local_ref(self.env, throwable);
            log::debug!("Foreign exception: {}", err);
            Err(err)
        }
    }

    /// Class name and message of a cleared throwable
    unsafe fn describe(&self, throwable: RawRef) -> BridgeError {
        let native = self.gateway.native();
        let ids = *self.gateway.describe_ids.get_or_init(|| self.resolve_describe_ids());
        let (class_name, message) = match ids {
            Some((get_name, get_message)) => {
                let class = native.get_object_class(self.env, throwable);
                let class_name = self.call_for_string(class, get_name);
                native.delete_local_ref(self.env, class);
                (class_name, self.call_for_string(throwable, get_message))
            }
            None => (None, None),
        };
        BridgeError::ForeignException {
            class_name: class_name.unwrap_or_else(|| "java.lang.Throwable".to_string()),
            message,
        }
    }

    unsafe fn resolve_describe_ids(&self) -> Option<(RawId, RawId)> {
        let native = self.gateway.native();
        let lookup = |class: &str, name: &str| {
            let class_ref = native.find_class(self.env, class);
            let id = if class_ref.is_null() {
                None
            } else {
                native.get_method_id(self.env, class_ref, name, "()Ljava/lang/String;", false)
            };
            if native.exception_check(self.env) {
                native.exception_clear(self.env);
            }
            native.delete_local_ref(self.env, class_ref);
            id
        };
        Some((
            lookup("java/lang/Class", "getName")?,
            lookup("java/lang/Throwable", "getMessage")?,
        ))
    }

    /// Call a `()Ljava/lang/String;` method, swallowing any secondary exception
    unsafe fn call_for_string(&self, target: RawRef, method: RawId) -> Option<String> {
        let native = self.gateway.native();
        if target.is_null() {
            return None;
        }
        let result = native.call_method(self.env, target, method, ReturnKind::Object, &[]);
        if native.exception_check(self.env) {
            native.exception_clear(self.env);
            return None;
        }
        let JValue::Object(string) = result else {
            return None;
        };
        if string.is_null() {
            return None;
        }
        let text = native.get_string(self.env, string);
        native.delete_local_ref(self.env, string);
        text
    }

    fn to_jvalues(&self, args: &[ForeignValue]) -> Result<Vec<JValue>> {
        args.iter()
            .map(|arg| {
                Ok(match *arg {
                    ForeignValue::Void => {
                        return Err(BridgeError::Conversion("void is not an argument".to_string()));
                    }
                    ForeignValue::Boolean(v) => JValue::Boolean(v),
                    ForeignValue::Byte(v) => JValue::Byte(v),
                    ForeignValue::Char(v) => JValue::Char(v),
                    ForeignValue::Short(v) => JValue::Short(v),
                    ForeignValue::Int(v) => JValue::Int(v),
                    ForeignValue::Long(v) => JValue::Long(v),
                    ForeignValue::Float(v) => JValue::Float(v),
                    ForeignValue::Double(v) => JValue::Double(v),
                    ForeignValue::Object(handle) => JValue::Object(self.raw_opt(handle)?),
                })
            })
            .collect()
    }

    fn from_jvalue(&self, value: JValue) -> ForeignValue {
        match value {
            JValue::Void => ForeignValue::Void,
            JValue::Boolean(v) => ForeignValue::Boolean(v),
            JValue::Byte(v) => ForeignValue::Byte(v),
            JValue::Char(v) => ForeignValue::Char(v),
            JValue::Short(v) => ForeignValue::Short(v),
            JValue::Int(v) => ForeignValue::Int(v),
            JValue::Long(v) => ForeignValue::Long(v),
            JValue::Float(v) => ForeignValue::Float(v),
            JValue::Double(v) => ForeignValue::Double(v),
            JValue::Object(raw) => ForeignValue::Object(self.local(raw)),
        }
    }

    fn from_foreign(value: &ForeignValue) -> Option<JValue> {
        Some(match *value {
            ForeignValue::Boolean(v) => JValue::Boolean(v),
            ForeignValue::Byte(v) => JValue::Byte(v),
            ForeignValue::Char(v) => JValue::Char(v),
            ForeignValue::Short(v) => JValue::Short(v),
            ForeignValue::Int(v) => JValue::Int(v),
            ForeignValue::Long(v) => JValue::Long(v),
            ForeignValue::Float(v) => JValue::Float(v),
            ForeignValue::Double(v) => JValue::Double(v),
            ForeignValue::Void | ForeignValue::Object(_) => return None,
        })
    }

    fn field_value(&self, value: ForeignValue) -> Result<JValue> {
        match value {
            ForeignValue::Object(handle) => Ok(JValue::Object(self.raw_opt(handle)?)),
            other => Frame::from_foreign(&other)
                .ok_or_else(|| BridgeError::Conversion("void is not a field value".to_string())),
        }
    }

    /// `FindClass`. `name` is an internal name (`java/lang/String`) or an
    /// array descriptor (`[I`).
    ///
    /// A missing class fails with `ClassNotFound` and leaves nothing pending.
    pub fn find_class(&self, name: &str) -> Result<NativeHandle> {
        let raw = unsafe { self.gateway.native().find_class(self.env, name) };
        let missing = || BridgeError::ClassNotFound(name.replace('/', "."));
        match self.check() {
            Err(e)
                if e.is_foreign("java.lang.NoClassDefFoundError")
                    || e.is_foreign("java.lang.ClassNotFoundException") =>
            {
                Err(missing())
            }
            Err(e) => Err(e),
            Ok(()) => self.local(raw).ok_or_else(missing),
        }
    }

    /// `GetObjectClass`
    pub fn object_class(&self, obj: NativeHandle) -> Result<NativeHandle> {
        let raw = unsafe { self.gateway.native().get_object_class(self.env, self.raw(obj)?) };
        self.required(raw, "GetObjectClass")
    }

    /// `IsInstanceOf`; null is an instance of every class
    pub fn is_instance_of(&self, obj: Option<NativeHandle>, class: NativeHandle) -> Result<bool> {
        let result = unsafe {
            self.gateway
                .native()
                .is_instance_of(self.env, self.raw_opt(obj)?, self.raw(class)?)
        };
        self.check()?;
        Ok(result)
    }

    /// `GetMethodID` / `GetStaticMethodID`. `owner` names the class in errors.
    pub fn method_id(&self, class: NativeHandle, owner: &str, name: &str, descriptor: &str, is_static: bool) -> Result<RawId> {
        let id = unsafe {
            self.gateway
                .native()
                .get_method_id(self.env, self.raw(class)?, name, descriptor, is_static)
        };
        self.member_id(id, owner, name, "java.lang.NoSuchMethodError")
    }

    /// `GetFieldID` / `GetStaticFieldID`
    pub fn field_id(&self, class: NativeHandle, owner: &str, name: &str, descriptor: &str, is_static: bool) -> Result<RawId> {
        let id = unsafe {
            self.gateway
                .native()
                .get_field_id(self.env, self.raw(class)?, name, descriptor, is_static)
        };
        self.member_id(id, owner, name, "java.lang.NoSuchFieldError")
    }

    fn member_id(&self, id: Option<RawId>, owner: &str, name: &str, missing_error: &str) -> Result<RawId> {
        let missing = || BridgeError::MemberNotFound {
            class: owner.to_string(),
            member: name.to_string(),
        };
        match self.check() {
            Err(e) if e.is_foreign(missing_error) => Err(missing()),
            Err(e) => Err(e),
            Ok(()) => id.ok_or_else(missing),
        }
    }

    /// `NewObjectA`
    pub fn new_object(&self, class: NativeHandle, ctor: RawId, args: &[ForeignValue]) -> Result<NativeHandle> {
        let args = self.to_jvalues(args)?;
        let raw = unsafe { self.gateway.native().new_object(self.env, self.raw(class)?, ctor, &args) };
        self.required(raw, "NewObject")
    }

    /// `Call<Kind>MethodA` on an instance
    pub fn call_method(&self, target: NativeHandle, method: RawId, kind: ReturnKind, args: &[ForeignValue]) -> Result<ForeignValue> {
        let args = self.to_jvalues(args)?;
        let result = unsafe {
            self.gateway
                .native()
                .call_method(self.env, self.raw(target)?, method, kind, &args)
        };
        self.check()?;
        Ok(self.from_jvalue(result))
    }

    /// `CallStatic<Kind>MethodA`
    pub fn call_static(&self, class: NativeHandle, method: RawId, kind: ReturnKind, args: &[ForeignValue]) -> Result<ForeignValue> {
        let args = self.to_jvalues(args)?;
        let result = unsafe {
            self.gateway
                .native()
                .call_static_method(self.env, self.raw(class)?, method, kind, &args)
        };
        self.check()?;
        Ok(self.from_jvalue(result))
    }

    /// `Get<Kind>Field`
    pub fn get_field(&self, target: NativeHandle, field: RawId, kind: ReturnKind) -> Result<ForeignValue> {
        let value = unsafe { self.gateway.native().get_field(self.env, self.raw(target)?, field, kind) };
        self.check()?;
        Ok(self.from_jvalue(value))
    }

    /// `Set<Kind>Field`
    pub fn set_field(&self, target: NativeHandle, field: RawId, value: ForeignValue) -> Result<()> {
        let value = self.field_value(value)?;
        unsafe { self.gateway.native().set_field(self.env, self.raw(target)?, field, value) };
        self.check()
    }

    /// `GetStatic<Kind>Field`
    pub fn get_static_field(&self, class: NativeHandle, field: RawId, kind: ReturnKind) -> Result<ForeignValue> {
        let value = unsafe {
            self.gateway
                .native()
                .get_static_field(self.env, self.raw(class)?, field, kind)
        };
        self.check()?;
        Ok(self.from_jvalue(value))
    }

    /// `SetStatic<Kind>Field`
    pub fn set_static_field(&self, class: NativeHandle, field: RawId, value: ForeignValue) -> Result<()> {
        let value = self.field_value(value)?;
        unsafe {
            self.gateway
                .native()
                .set_static_field(self.env, self.raw(class)?, field, value)
        };
        self.check()
    }

    /// `NewString`
    pub fn new_string(&self, text: &str) -> Result<NativeHandle> {
        let raw = unsafe { self.gateway.native().new_string(self.env, text) };
        self.required(raw, "NewString")
    }

    /// Text of a foreign string
    pub fn get_string(&self, string: NativeHandle) -> Result<String> {
        let text = unsafe { self.gateway.native().get_string(self.env, self.raw(string)?) };
        self.check()?;
        text.ok_or_else(|| BridgeError::Conversion("reference is not a string".to_string()))
    }

    /// `GetArrayLength`
    pub fn array_length(&self, array: NativeHandle) -> Result<usize> {
        let len = unsafe { self.gateway.native().get_array_length(self.env, self.raw(array)?) };
        self.check()?;
        usize::try_from(len).map_err(|_| BridgeError::Conversion(format!("invalid array length {}", len)))
    }

    fn array_index(index: usize) -> Result<i32> {
        i32::try_from(index).map_err(|_| BridgeError::Conversion(format!("array index {} out of range", index)))
    }

    /// `GetObjectArrayElement`
    pub fn array_element(&self, array: NativeHandle, index: usize) -> Result<Option<NativeHandle>> {
        let raw = unsafe {
            self.gateway
                .native()
                .get_object_array_element(self.env, self.raw(array)?, Frame::array_index(index)?)
        };
        self.check()?;
        Ok(self.local(raw))
    }

    /// `SetObjectArrayElement`
    pub fn set_array_element(&self, array: NativeHandle, index: usize, value: Option<NativeHandle>) -> Result<()> {
        unsafe {
            self.gateway.native().set_object_array_element(
                self.env,
                self.raw(array)?,
                Frame::array_index(index)?,
                self.raw_opt(value)?,
            )
        };
        self.check()
    }

    /// `NewObjectArray` filled with null
    pub fn new_object_array(&self, len: usize, component: NativeHandle) -> Result<NativeHandle> {
        let raw = unsafe {
            self.gateway.native().new_object_array(
                self.env,
                Frame::array_index(len)?,
                self.raw(component)?,
                RawRef::NULL,
            )
        };
        self.required(raw, "NewObjectArray")
    }

    /// `New<Kind>Array` with the given contents
    pub fn new_primitive_array(&self, values: &PrimitiveArray) -> Result<NativeHandle> {
        let raw = unsafe { self.gateway.native().new_primitive_array(self.env, values) };
        self.required(raw, "NewArray")
    }

    /// Contents of a primitive array
    pub fn primitive_array(&self, array: NativeHandle, kind: ReturnKind) -> Result<PrimitiveArray> {
        let values = unsafe {
            self.gateway
                .native()
                .get_primitive_array(self.env, self.raw(array)?, kind)
        };
        self.check()?;
        values.ok_or_else(|| BridgeError::Conversion(format!("reference is not a {:?} array", kind)))
    }

    /// Binary name of a class object (`Class.getName`)
    pub fn class_name(&self, class: NativeHandle) -> Result<String> {
        let raw = self.raw(class)?;
        let ids = *self
            .gateway
            .describe_ids
            .get_or_init(|| unsafe { self.resolve_describe_ids() });
        let Some((get_name, _)) = ids else {
            return Err(BridgeError::MemberNotFound {
                class: "java.lang.Class".to_string(),
                member: "getName".to_string(),
            });
        };
        let result = unsafe { self.gateway.native().call_method(self.env, raw, get_name, ReturnKind::Object, &[]) };
        self.check()?;
        let name = self.from_jvalue(result).handle();
        match name {
            Some(name) => self.get_string(name),
            None => Err(BridgeError::Conversion("Class.getName returned null".to_string())),
        }
    }

    /// Promote to a global reference owned by the caller
    pub fn promote(&self, handle: NativeHandle) -> Result<GlobalRef> {
        let raw = unsafe { self.gateway.native().new_global_ref(self.env, self.raw(handle)?) };
        if raw.is_null() {
            return Err(BridgeError::StaleHandle);
        }
        let global = self.gateway.handles().register(raw, RefKind::Global, None);
        Ok(self.gateway.new_global(global))
    }

    /// Create a weak global reference
    pub fn promote_weak(&self, handle: NativeHandle) -> Result<WeakRef> {
        let raw = unsafe { self.gateway.native().new_weak_global_ref(self.env, self.raw(handle)?) };
        self.check()?;
        if raw.is_null() {
            return Err(BridgeError::StaleHandle);
        }
        let weak = self.gateway.handles().register(raw, RefKind::Weak, None);
        Ok(WeakRef {
            inner: Arc::new(OwnedRef {
                handle: weak,
                gateway: self.gateway.weak(),
                vm_id: self.gateway.vm_id(),
            }),
        })
    }

    /// A local reference to the referent of a weak reference, `None` once
    /// it was collected
    pub fn upgrade(&self, weak: &WeakRef) -> Result<Option<NativeHandle>> {
        let raw = unsafe { self.gateway.native().new_local_ref(self.env, self.raw(weak.handle())?) };
        self.check()?;
        Ok(self.local(raw))
    }

    /// Release a local handle before the frame closes
    pub fn delete_local(&self, handle: NativeHandle) {
        if handle.kind() != RefKind::Local {
            return;
        }
        if let Some(raw) = self.gateway.handles().remove(handle) {
            unsafe { self.gateway.native().delete_local_ref(self.env, raw) };
        }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let closing = super::attach::leave_frame(self.gateway.vm_id(), self.id);
        if closing.len() > 1 {
            log::warn!("Closing a call frame with {} inner frames still open", closing.len() - 1);
        }
        for id in closing {
            unsafe { self.gateway.native().pop_local_frame(self.env) };
            self.gateway.handles().close_frame(id);
        }
        self.gateway.release_deferred(self.env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::handle::HandleCounts;
    use crate::native::Launcher;
    use crate::sim::{SimLauncher, SimVm};

    fn gateway() -> (Arc<ForeignCallGateway>, SimVm) {
        let launcher = SimLauncher::builder().build().unwrap();
        let native = launcher.launch(&Configuration::default()).unwrap();
        (ForeignCallGateway::new(native), launcher.vm().unwrap())
    }

    #[test]
    fn test_locals_do_not_outlive_frame() {
        let (gateway, vm) = gateway();
        let leaked = {
            let frame = gateway.frame().unwrap();
            frame.new_string("short-lived").unwrap()
        };
        assert_eq!(vm.live_local_refs(), 0);
        let frame = gateway.frame().unwrap();
        assert!(matches!(frame.get_string(leaked), Err(BridgeError::StaleHandle)));
    }

    #[test]
    fn test_outer_frame_drop_closes_inner_frames() {
        let (gateway, vm) = gateway();
        let outer = gateway.frame().unwrap();
        let kept = outer.new_string("outer").unwrap();
        let inner = gateway.frame().unwrap();
        let text = inner.new_string("inner").unwrap();
        drop(outer);

        assert!(matches!(inner.get_string(text), Err(BridgeError::StaleHandle)));
        let late = inner.new_string("late").unwrap();
        assert!(matches!(inner.get_string(late), Err(BridgeError::StaleHandle)));
        drop(inner);

        assert_eq!(vm.live_local_refs(), 0);
        assert_eq!(gateway.handle_counts(), HandleCounts::default());
        assert!(vm.misuse().is_empty(), "{:?}", vm.misuse());

        let frame = gateway.frame().unwrap();
        assert!(matches!(frame.get_string(kept), Err(BridgeError::StaleHandle)));
        let fresh = frame.new_string("fresh").unwrap();
        assert_eq!(frame.get_string(fresh).unwrap(), "fresh");
    }

    #[test]
    fn test_nested_frames_close_in_order() {
        let (gateway, vm) = gateway();
        let outer = gateway.frame().unwrap();
        let kept = outer.new_string("kept").unwrap();
        {
            let inner = gateway.frame().unwrap();
            inner.new_string("scratch").unwrap();
        }
        assert_eq!(outer.get_string(kept).unwrap(), "kept");
        assert_eq!(vm.live_local_refs(), 1);
        drop(outer);
        assert_eq!(vm.live_local_refs(), 0);
        assert!(vm.misuse().is_empty(), "{:?}", vm.misuse());
    }

    #[test]
    fn test_missing_class_leaves_nothing_pending() {
        let (gateway, vm) = gateway();
        let frame = gateway.frame().unwrap();
        let err = frame.find_class("does/not/Exist").unwrap_err();
        assert!(matches!(err, BridgeError::ClassNotFound(ref name) if name == "does.not.Exist"));
        assert_eq!(vm.pending_exceptions(), 0);
        assert!(frame.find_class("java/lang/String").is_ok());
    }

    #[test]
    fn test_foreign_exception_is_described() {
        let (gateway, vm) = gateway();
        let frame = gateway.frame().unwrap();
        let class = frame.find_class("java/lang/Integer").unwrap();
        let parse = frame
            .method_id(class, "java.lang.Integer", "parseInt", "(Ljava/lang/String;)I", true)
            .unwrap();
        let text = frame.new_string("nope").unwrap();
        let err = frame
            .call_static(class, parse, ReturnKind::Int, &[ForeignValue::Object(Some(text))])
            .unwrap_err();
        match err {
            BridgeError::ForeignException { class_name, message } => {
                assert_eq!(class_name, "java.lang.NumberFormatException");
                assert_eq!(message.as_deref(), Some("For input string: \"nope\""));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(vm.pending_exceptions(), 0);
        assert!(vm.misuse().is_empty());
    }

    #[test]
    fn test_missing_member_maps_to_member_not_found() {
        let (gateway, _vm) = gateway();
        let frame = gateway.frame().unwrap();
        let class = frame.find_class("java/lang/String").unwrap();
        let err = frame
            .method_id(class, "java.lang.String", "shout", "()V", false)
            .unwrap_err();
        assert!(matches!(err, BridgeError::MemberNotFound { ref member, .. } if member == "shout"));
        let err = frame.field_id(class, "java.lang.String", "nothing", "I", false).unwrap_err();
        assert!(matches!(err, BridgeError::MemberNotFound { .. }));
    }

    #[test]
    fn test_weak_upgrade_after_collection() {
        let (gateway, vm) = gateway();
        let frame = gateway.frame().unwrap();
        let s = frame.new_string("weakly held").unwrap();
        let weak = frame.promote_weak(s).unwrap();
        assert!(frame.upgrade(&weak).unwrap().is_some());

        frame.delete_local(s);
        drop(frame);
        vm.clear_weak_refs();
        let frame = gateway.frame().unwrap();
        assert!(frame.upgrade(&weak).unwrap().is_none());
    }

    #[test]
    fn test_arrays() {
        let (gateway, _vm) = gateway();
        let frame = gateway.frame().unwrap();
        let ints = frame
            .new_primitive_array(&PrimitiveArray::Int(vec![1, 2, 3]))
            .unwrap();
        assert_eq!(frame.array_length(ints).unwrap(), 3);
        assert_eq!(
            frame.primitive_array(ints, ReturnKind::Int).unwrap(),
            PrimitiveArray::Int(vec![1, 2, 3])
        );

        let string_class = frame.find_class("java/lang/String").unwrap();
        let strings = frame.new_object_array(2, string_class).unwrap();
        let text = frame.new_string("b").unwrap();
        frame.set_array_element(strings, 1, Some(text)).unwrap();
        assert!(frame.array_element(strings, 0).unwrap().is_none());
        let second = frame.array_element(strings, 1).unwrap().unwrap();
        assert_eq!(frame.get_string(second).unwrap(), "b");

        let err = frame.array_element(strings, 5).unwrap_err();
        assert!(err.is_foreign("java.lang.ArrayIndexOutOfBoundsException"));
    }
}

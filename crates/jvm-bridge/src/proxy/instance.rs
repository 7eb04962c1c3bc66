//! Instance proxies

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

use super::{BoundField, BoundMethod, ClassProxy, Member, Resolved};
use crate::convert::HostValue;
use crate::error::{BridgeError, Result};
use crate::gateway::{GlobalRef, WeakRef};
use crate::handle::NativeHandle;
use crate::lifecycle::{VmHandle, VmShared};

struct InstanceInner {
    object: GlobalRef,
    vm: Weak<VmShared>,
    class: OnceCell<ClassProxy>,
    memo: Mutex<FxHashMap<String, Resolved>>,
}

/// A foreign object held through a global reference.
///
/// Clones share the reference; it is released when the last clone drops.
#[derive(Clone)]
pub struct InstanceProxy {
    inner: Arc<InstanceInner>,
}

impl std::fmt::Debug for InstanceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("InstanceProxy");
        s.field("handle", &self.inner.object.handle());
        if let Some(class) = self.inner.class.get() {
            s.field("class", &class.name().binary());
        }
        s.finish()
    }
}

impl InstanceProxy {
    pub(crate) fn new(vm: &VmHandle, object: GlobalRef) -> Self {
        Self::build(vm, object, OnceCell::new())
    }

    pub(crate) fn with_class(vm: &VmHandle, object: GlobalRef, class: ClassProxy) -> Self {
        Self::build(vm, object, OnceCell::with_value(class))
    }

    fn build(vm: &VmHandle, object: GlobalRef, class: OnceCell<ClassProxy>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                object,
                vm: vm.downgrade(),
                class,
                memo: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// The handle of the underlying global reference
    pub fn handle(&self) -> NativeHandle {
        self.inner.object.handle()
    }

    /// The underlying global reference
    pub fn global(&self) -> &GlobalRef {
        &self.inner.object
    }

    /// Proxy of the object's runtime class
    pub fn runtime_class(&self) -> Result<&ClassProxy> {
        self.inner.class.get_or_try_init(|| {
            let vm = VmHandle::upgrade(&self.inner.vm)?;
            let name = {
                let frame = vm.gateway().frame()?;
                let class = frame.object_class(self.handle())?;
                frame.class_name(class)?
            };
            Ok(ClassProxy::new(&vm, vm.find_class(&name)?))
        })
    }

    /// Binary name of the runtime class
    pub fn class_name(&self) -> Result<String> {
        Ok(self.runtime_class()?.name().binary())
    }

    /// Method overload set (instance and static) or field named `name`
    pub fn resolve_member(&self, name: &str) -> Result<Member> {
        if let Some(resolved) = self.inner.memo.lock().get(name) {
            return self.bind(name, resolved.clone());
        }
        let class = self.runtime_class()?.descriptor();
        let overloads = class.overloads(name);
        let resolved = if !overloads.is_empty() {
            Resolved::Methods(overloads)
        } else if let Some(field) = class.field(name) {
            Resolved::Field(Arc::clone(field))
        } else {
            Resolved::NotFound
        };
        self.inner.memo.lock().insert(name.to_string(), resolved.clone());
        self.bind(name, resolved)
    }

    fn bind(&self, name: &str, resolved: Resolved) -> Result<Member> {
        let class = Arc::clone(self.runtime_class()?.descriptor());
        let vm = self.inner.vm.clone();
        Ok(match resolved {
            Resolved::Methods(overloads) => {
                Member::Methods(BoundMethod::new(name, class, overloads, Some(self.clone()), vm))
            }
            Resolved::Field(field) => Member::Field(BoundField::new(class, field, Some(self.clone()), vm)),
            Resolved::Class(c) => Member::Class(c),
            Resolved::Package(p) => Member::Package(p),
            Resolved::NotFound => Member::NotFound,
        })
    }

    /// Call a method with overload resolution
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Methods(method) => method.call(args),
            _ => Err(self.missing(name)?),
        }
    }

    /// Read a field
    pub fn get(&self, name: &str) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Field(field) => field.get(),
            _ => Err(self.missing(name)?),
        }
    }

    /// Assign a field
    pub fn set(&self, name: &str, value: &HostValue) -> Result<()> {
        match self.resolve_member(name)? {
            Member::Field(field) => field.set(value),
            _ => Err(self.missing(name)?),
        }
    }

    fn missing(&self, name: &str) -> Result<BridgeError> {
        Ok(BridgeError::MemberNotFound {
            class: self.class_name()?,
            member: name.to_string(),
        })
    }

    /// Whether both proxies share one global reference
    pub fn same_ref(&self, other: &InstanceProxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.object.ptr_eq(&other.inner.object)
    }

    /// A weak reference that does not keep the object alive
    pub fn downgrade(&self) -> Result<WeakInstance> {
        let vm = VmHandle::upgrade(&self.inner.vm)?;
        let frame = vm.gateway().frame()?;
        let weak = frame.promote_weak(self.handle())?;
        Ok(WeakInstance {
            weak,
            vm: self.inner.vm.clone(),
        })
    }
}

/// Weakly held foreign object
pub struct WeakInstance {
    weak: WeakRef,
    vm: Weak<VmShared>,
}

impl WeakInstance {
    /// A strong proxy, or `None` once the object has been collected
    pub fn upgrade(&self) -> Result<Option<InstanceProxy>> {
        let vm = VmHandle::upgrade(&self.vm)?;
        let frame = vm.gateway().frame()?;
        match frame.upgrade(&self.weak)? {
            Some(local) => Ok(Some(InstanceProxy::new(&vm, frame.promote(local)?))),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakInstance").field(&self.weak.handle()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Modifiers;
    use crate::config::Configuration;
    use crate::lifecycle::LifecycleManager;
    use crate::proxy::Proxy;
    use crate::sim::{ClassBuilder, SimLauncher, SimThrow, SimValue};

    fn counter() -> ClassBuilder {
        ClassBuilder::new("demo/Counter")
            .field("count", "I")
            .field_with("limit", "I", Modifiers::PUBLIC | Modifiers::FINAL)
            .static_field("created", "I", SimValue::Int(0))
            .default_constructor()
            .method("increment", "()I", |heap, this, _| {
                let this = this.ok_or_else(SimThrow::null_pointer)?;
                let next = heap.field(this, "count").as_long().unwrap_or(0) as i32 + 1;
                heap.set_field(this, "count", SimValue::Int(next));
                Ok(SimValue::Int(next))
            })
            .method("add", "(I)I", |heap, this, args| {
                let this = this.ok_or_else(SimThrow::null_pointer)?;
                let next = heap.field(this, "count").as_long().unwrap_or(0) + args[0].as_long().unwrap_or(0);
                heap.set_field(this, "count", SimValue::Int(next as i32));
                Ok(SimValue::Int(next as i32))
            })
            .static_method("describe", "()Ljava/lang/String;", |heap, _, _| Ok(heap.string_value("counter")))
    }

    fn running() -> (LifecycleManager, VmHandle) {
        let launcher = SimLauncher::builder().class(counter()).build().unwrap();
        let manager = LifecycleManager::new(launcher, Configuration::default());
        let vm = manager.start(Configuration::default()).unwrap();
        (manager, vm)
    }

    #[test]
    fn test_instance_methods_and_fields() {
        let (_manager, vm) = running();
        let class = match vm.resolve("demo.Counter").unwrap() {
            Proxy::Class(c) => c,
            other => panic!("expected a class, got {:?}", other),
        };
        let counter = class.new_instance(&[]).unwrap();
        assert_eq!(counter.call("increment", &[]).unwrap(), HostValue::Int(1));
        assert_eq!(counter.call("add", &[HostValue::Int(41)]).unwrap(), HostValue::Int(42));
        assert_eq!(counter.get("count").unwrap(), HostValue::Int(42));
        counter.set("count", &HostValue::Int(5)).unwrap();
        assert_eq!(counter.call("increment", &[]).unwrap(), HostValue::Int(6));
        assert!(matches!(
            counter.set("limit", &HostValue::Int(1)),
            Err(BridgeError::Conversion(_))
        ));
        // statics are reachable through an instance as well
        assert_eq!(counter.call("describe", &[]).unwrap(), HostValue::from("counter"));
        assert_eq!(counter.class_name().unwrap(), "demo.Counter");
    }

    #[test]
    fn test_class_scope_is_static_only() {
        let (_manager, vm) = running();
        let class = vm.resolve("demo.Counter").unwrap();
        let class = class.as_class().unwrap();
        assert_eq!(class.call("describe", &[]).unwrap(), HostValue::from("counter"));
        assert_eq!(class.get("created").unwrap(), HostValue::Int(0));
        class.set("created", &HostValue::Int(3)).unwrap();
        assert_eq!(class.get("created").unwrap(), HostValue::Int(3));
        assert!(matches!(class.resolve_member("increment").unwrap(), Member::NotFound));
        assert!(matches!(class.get("count"), Err(BridgeError::MemberNotFound { .. })));
    }

    #[test]
    fn test_missing_member() {
        let (_manager, vm) = running();
        let counter = vm.resolve("demo.Counter").unwrap().as_class().unwrap().new_instance(&[]).unwrap();
        match counter.call("decrement", &[]).unwrap_err() {
            BridgeError::MemberNotFound { class, member } => {
                assert_eq!(class, "demo.Counter");
                assert_eq!(member, "decrement");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_weak_instance_upgrade() {
        let (_manager, vm) = running();
        let counter = vm.resolve("demo.Counter").unwrap().as_class().unwrap().new_instance(&[]).unwrap();
        let weak = counter.downgrade().unwrap();
        let strong = weak.upgrade().unwrap().unwrap();
        assert_eq!(strong.call("increment", &[]).unwrap(), HostValue::Int(1));
        assert!(!strong.same_ref(&counter));
        assert_eq!(HostValue::Object(counter.clone()), HostValue::Object(counter));
    }
}

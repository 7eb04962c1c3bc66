//! Class proxies

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

use super::{overload, BoundField, BoundMethod, InstanceProxy, Member, Resolved};
use crate::catalog::ClassDescriptor;
use crate::convert::{HostValue, TypeConverter};
use crate::error::{BridgeError, Result};
use crate::lifecycle::{VmHandle, VmShared};
use crate::signature::ClassName;

/// A class in static context: static methods, static fields, nested
/// classes and constructors.
#[derive(Clone)]
pub struct ClassProxy {
    descriptor: Arc<ClassDescriptor>,
    vm: Weak<VmShared>,
    memo: Arc<Mutex<FxHashMap<String, Resolved>>>,
}

impl std::fmt::Debug for ClassProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassProxy").field(&self.descriptor.name().binary()).finish()
    }
}

impl ClassProxy {
    pub(crate) fn new(vm: &VmHandle, descriptor: Arc<ClassDescriptor>) -> Self {
        Self {
            descriptor,
            vm: vm.downgrade(),
            memo: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Cached reflection metadata
    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    /// Qualified class name
    pub fn name(&self) -> &ClassName {
        self.descriptor.name()
    }

    /// Static overload set, static field or nested class named `name`
    pub fn resolve_member(&self, name: &str) -> Result<Member> {
        if let Some(resolved) = self.memo.lock().get(name) {
            return Ok(self.bind(name, resolved.clone()));
        }
        let resolved = self.lookup(name)?;
        self.memo.lock().insert(name.to_string(), resolved.clone());
        Ok(self.bind(name, resolved))
    }

    fn lookup(&self, name: &str) -> Result<Resolved> {
        let statics: Vec<_> = self
            .descriptor
            .overloads(name)
            .into_iter()
            .filter(|m| m.is_static())
            .collect();
        if !statics.is_empty() {
            return Ok(Resolved::Methods(statics));
        }
        if let Some(field) = self.descriptor.field(name).filter(|f| f.is_static()) {
            return Ok(Resolved::Field(Arc::clone(field)));
        }
        let vm = VmHandle::upgrade(&self.vm)?;
        let nested = format!("{}${}", self.descriptor.name().internal(), name);
        match vm.find_class(&nested) {
            Ok(descriptor) => Ok(Resolved::Class(ClassProxy::new(&vm, descriptor))),
            Err(BridgeError::ClassNotFound(_)) => Ok(Resolved::NotFound),
            Err(e) => Err(e),
        }
    }

    fn bind(&self, name: &str, resolved: Resolved) -> Member {
        match resolved {
            Resolved::Methods(overloads) => Member::Methods(BoundMethod::new(
                name,
                Arc::clone(&self.descriptor),
                overloads,
                None,
                self.vm.clone(),
            )),
            Resolved::Field(field) => {
                Member::Field(BoundField::new(Arc::clone(&self.descriptor), field, None, self.vm.clone()))
            }
            Resolved::Class(class) => Member::Class(class),
            Resolved::Package(package) => Member::Package(package),
            Resolved::NotFound => Member::NotFound,
        }
    }

    /// Call a static method
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Methods(method) => method.call(args),
            _ => Err(self.missing(name)),
        }
    }

    /// Read a static field
    pub fn get(&self, name: &str) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Field(field) => field.get(),
            _ => Err(self.missing(name)),
        }
    }

    /// Assign a static field
    pub fn set(&self, name: &str, value: &HostValue) -> Result<()> {
        match self.resolve_member(name)? {
            Member::Field(field) => field.set(value),
            _ => Err(self.missing(name)),
        }
    }

    /// Construct an instance, choosing the constructor like a method overload
    pub fn new_instance(&self, args: &[HostValue]) -> Result<InstanceProxy> {
        let vm = VmHandle::upgrade(&self.vm)?;
        let frame = vm.gateway().frame()?;
        let conv = TypeConverter::new(&frame, &vm);
        let ctor = overload::select(&conv, self.name(), "<init>", self.descriptor.constructors(), args)?;
        let id = self.descriptor.method_id(&frame, &ctor)?;
        let values = conv.arguments(args, ctor.params())?;
        let object = frame.new_object(self.descriptor.class_ref().handle(), id, &values)?;
        let global = frame.promote(object)?;
        Ok(InstanceProxy::with_class(&vm, global, self.clone()))
    }

    fn missing(&self, name: &str) -> BridgeError {
        BridgeError::MemberNotFound {
            class: self.name().binary(),
            member: name.to_string(),
        }
    }
}

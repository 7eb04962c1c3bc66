//! Bound methods and fields

use std::sync::{Arc, Weak};

use super::{overload, InstanceProxy};
use crate::catalog::{ClassDescriptor, FieldDescriptor, MethodDescriptor};
use crate::convert::{HostValue, TypeConverter};
use crate::error::{BridgeError, Result};
use crate::lifecycle::{VmHandle, VmShared};

/// An overload set bound to a receiver, or to its class for statics
#[derive(Debug, Clone)]
pub struct BoundMethod {
    name: Arc<str>,
    class: Arc<ClassDescriptor>,
    overloads: Vec<Arc<MethodDescriptor>>,
    receiver: Option<InstanceProxy>,
    vm: Weak<VmShared>,
}

impl BoundMethod {
    pub(crate) fn new(
        name: &str,
        class: Arc<ClassDescriptor>,
        overloads: Vec<Arc<MethodDescriptor>>,
        receiver: Option<InstanceProxy>,
        vm: Weak<VmShared>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            class,
            overloads,
            receiver,
            vm,
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All overloads of this name, in declaration order
    pub fn overloads(&self) -> &[Arc<MethodDescriptor>] {
        &self.overloads
    }

    /// Select the overload best matching `args` and invoke it
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue> {
        let vm = VmHandle::upgrade(&self.vm)?;
        let frame = vm.gateway().frame()?;
        let conv = TypeConverter::new(&frame, &vm);
        let method = overload::select(&conv, self.class.name(), &self.name, &self.overloads, args)?;
        let id = self.class.method_id(&frame, &method)?;
        let values = conv.arguments(args, method.params())?;
        let kind = method.return_type().return_kind();

        let result = if method.is_static() {
            frame.call_static(self.class.class_ref().handle(), id, kind, &values)?
        } else {
            let receiver = self.receiver.as_ref().ok_or_else(|| {
                BridgeError::Conversion(format!(
                    "{}.{} is an instance method and needs a receiver",
                    self.class.name(),
                    self.name
                ))
            })?;
            frame.call_method(receiver.handle(), id, kind, &values)?
        };
        conv.to_host(result, method.return_type())
    }
}

/// A field bound to a receiver, or to its class for statics
#[derive(Debug, Clone)]
pub struct BoundField {
    class: Arc<ClassDescriptor>,
    field: Arc<FieldDescriptor>,
    receiver: Option<InstanceProxy>,
    vm: Weak<VmShared>,
}

impl BoundField {
    pub(crate) fn new(
        class: Arc<ClassDescriptor>,
        field: Arc<FieldDescriptor>,
        receiver: Option<InstanceProxy>,
        vm: Weak<VmShared>,
    ) -> Self {
        Self {
            class,
            field,
            receiver,
            vm,
        }
    }

    /// Field metadata
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.field
    }

    fn receiver(&self) -> Result<&InstanceProxy> {
        self.receiver.as_ref().ok_or_else(|| {
            BridgeError::Conversion(format!(
                "{}.{} is an instance field and needs a receiver",
                self.class.name(),
                self.field.name()
            ))
        })
    }

    /// Read the current value
    pub fn get(&self) -> Result<HostValue> {
        let vm = VmHandle::upgrade(&self.vm)?;
        let frame = vm.gateway().frame()?;
        let conv = TypeConverter::new(&frame, &vm);
        let id = self.class.field_id(&frame, &self.field)?;
        let kind = self.field.sig().return_kind();
        let value = if self.field.is_static() {
            frame.get_static_field(self.class.class_ref().handle(), id, kind)?
        } else {
            frame.get_field(self.receiver()?.handle(), id, kind)?
        };
        conv.to_host(value, self.field.sig())
    }

    /// Assign a new value. Final fields are rejected.
    pub fn set(&self, value: &HostValue) -> Result<()> {
        if self.field.modifiers().is_final() {
            return Err(BridgeError::Conversion(format!(
                "{}.{} is final",
                self.class.name(),
                self.field.name()
            )));
        }
        let vm = VmHandle::upgrade(&self.vm)?;
        let frame = vm.gateway().frame()?;
        let conv = TypeConverter::new(&frame, &vm);
        let id = self.class.field_id(&frame, &self.field)?;
        let value = conv.to_foreign(value, self.field.sig())?;
        if self.field.is_static() {
            frame.set_static_field(self.class.class_ref().handle(), id, value)
        } else {
            frame.set_field(self.receiver()?.handle(), id, value)
        }
    }
}

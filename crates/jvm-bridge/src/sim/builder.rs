//! Fluent construction of simulated classes

use std::sync::Arc;

use super::heap::{NativeBody, ObjId, SimClass, SimField, SimHeap, SimMethod, SimResult, SimValue};
use crate::catalog::Modifiers;
use crate::error::{BridgeError, Result};
use crate::signature::{MethodSig, TypeSig};

/// Builder for a simulated class.
///
/// Descriptor errors are collected and reported when the launcher is built.
///
/// ```ignore
/// let greeter = ClassBuilder::new("pkg/Greeter")
///     .on_classpath()
///     .static_method("greet", "(Ljava/lang/String;)Ljava/lang/String;", |heap, _, args| {
///         let name = heap.string(args[0])?;
///         Ok(heap.string_value(&format!("Hello, {name}!")))
///     });
/// ```
pub struct ClassBuilder {
    class: SimClass,
    errors: Vec<String>,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`
    pub fn new(name: &str) -> Self {
        let name = name.replace('.', "/");
        let superclass = if name == "java/lang/Object" {
            None
        } else {
            Some("java/lang/Object".to_string())
        };
        Self {
            class: SimClass {
                name,
                superclass,
                interfaces: Vec::new(),
                modifiers: Modifiers::PUBLIC,
                methods: Vec::new(),
                constructors: Vec::new(),
                fields: Vec::new(),
                requires_classpath: false,
            },
            errors: Vec::new(),
        }
    }

    /// A public interface
    pub fn interface(name: &str) -> Self {
        Self::new(name).modifiers(Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT)
    }

    /// Set the superclass
    pub fn extends(mut self, superclass: &str) -> Self {
        self.class.superclass = Some(superclass.replace('.', "/"));
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: &str) -> Self {
        self.class.interfaces.push(interface.replace('.', "/"));
        self
    }

    /// Replace the class modifiers
    pub fn modifiers(mut self, modifiers: u32) -> Self {
        self.class.modifiers = modifiers;
        self
    }

    /// Only loadable when a classpath entry contains the class file
    pub fn on_classpath(mut self) -> Self {
        self.class.requires_classpath = true;
        self
    }

    fn parse(&mut self, name: &str, descriptor: &str) -> Option<MethodSig> {
        match MethodSig::parse(descriptor) {
            Ok(sig) => Some(sig),
            Err(e) => {
                self.errors
                    .push(format!("{}.{}{}: {}", self.class.name, name, descriptor, e));
                None
            }
        }
    }

    fn push_method<F>(mut self, name: &str, descriptor: &str, modifiers: u32, body: Option<F>) -> Self
    where
        F: Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync + 'static,
    {
        if let Some(sig) = self.parse(name, descriptor) {
            self.class.methods.push(SimMethod {
                name: name.to_string(),
                sig,
                descriptor: descriptor.to_string(),
                modifiers,
                body: body.map(|b| Arc::new(b) as NativeBody),
            });
        }
        self
    }

    /// Public instance method
    pub fn method<F>(self, name: &str, descriptor: &str, body: F) -> Self
    where
        F: Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync + 'static,
    {
        self.push_method(name, descriptor, Modifiers::PUBLIC, Some(body))
    }

    /// Public static method
    pub fn static_method<F>(self, name: &str, descriptor: &str, body: F) -> Self
    where
        F: Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync + 'static,
    {
        self.push_method(name, descriptor, Modifiers::PUBLIC | Modifiers::STATIC, Some(body))
    }

    /// Public abstract method without a body
    pub fn abstract_method(self, name: &str, descriptor: &str) -> Self {
        self.push_method::<fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult>(
            name,
            descriptor,
            Modifiers::PUBLIC | Modifiers::ABSTRACT,
            None,
        )
    }

    /// Public constructor; the body initializes the freshly allocated receiver
    pub fn constructor<F>(self, descriptor: &str, body: F) -> Self
    where
        F: Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync + 'static,
    {
        self.constructor_with(descriptor, Modifiers::PUBLIC, body)
    }

    /// Constructor with explicit modifiers
    pub fn constructor_with<F>(mut self, descriptor: &str, modifiers: u32, body: F) -> Self
    where
        F: Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync + 'static,
    {
        if let Some(sig) = self.parse("<init>", descriptor) {
            self.class.constructors.push(SimMethod {
                name: "<init>".to_string(),
                sig,
                descriptor: descriptor.to_string(),
                modifiers,
                body: Some(Arc::new(body)),
            });
        }
        self
    }

    /// Public no-argument constructor that does nothing
    pub fn default_constructor(self) -> Self {
        self.constructor("()V", |_, _, _| Ok(SimValue::Void))
    }

    fn push_field(mut self, name: &str, descriptor: &str, modifiers: u32, initial: Option<SimValue>) -> Self {
        match TypeSig::parse_descriptor(descriptor) {
            Ok(sig) => {
                let initial = initial.unwrap_or_else(|| SimValue::default_for(&sig));
                self.class.fields.push(SimField {
                    name: name.to_string(),
                    sig,
                    modifiers,
                    initial,
                });
            }
            Err(e) => self
                .errors
                .push(format!("{}.{}: {}", self.class.name, name, e)),
        }
        self
    }

    /// Public instance field
    pub fn field(self, name: &str, descriptor: &str) -> Self {
        self.push_field(name, descriptor, Modifiers::PUBLIC, None)
    }

    /// Field with explicit modifiers
    pub fn field_with(self, name: &str, descriptor: &str, modifiers: u32) -> Self {
        self.push_field(name, descriptor, modifiers, None)
    }

    /// Public static field with an initial primitive value
    pub fn static_field(self, name: &str, descriptor: &str, initial: SimValue) -> Self {
        self.push_field(name, descriptor, Modifiers::PUBLIC | Modifiers::STATIC, Some(initial))
    }

    pub(crate) fn finish(self) -> Result<SimClass> {
        if self.errors.is_empty() {
            Ok(self.class)
        } else {
            Err(BridgeError::Conversion(self.errors.join("; ")))
        }
    }

    /// Internal name of the class being built
    pub fn name(&self) -> &str {
        &self.class.name
    }
}

//! Class, method and field descriptors

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::Modifiers;
use crate::error::Result;
use crate::gateway::{Frame, GlobalRef};
use crate::native::RawId;
use crate::signature::{ClassName, MethodSig, TypeSig};

/// A method or constructor
#[derive(Debug)]
pub struct MethodDescriptor {
    pub(crate) name: String,
    pub(crate) sig: MethodSig,
    pub(crate) modifiers: Modifiers,
    pub(crate) overload_set: usize,
    pub(crate) descriptor: String,
    pub(crate) id: OnceCell<RawId>,
}

impl MethodDescriptor {
    pub(crate) fn new(name: String, sig: MethodSig, modifiers: Modifiers, overload_set: usize) -> Self {
        let descriptor = sig.descriptor();
        Self {
            name,
            sig,
            modifiers,
            overload_set,
            descriptor,
            id: OnceCell::new(),
        }
    }

    /// Method name, `<init>` for constructors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types in order
    pub fn params(&self) -> &[TypeSig] {
        &self.sig.params
    }

    /// Return type
    pub fn return_type(&self) -> &TypeSig {
        &self.sig.ret
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Reflective modifiers
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Index of the overload set (methods sharing this name) within the class
    pub fn overload_set(&self) -> usize {
        self.overload_set
    }

    /// JNI descriptor, e.g. `(ILjava/lang/String;)V`
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

/// A field
#[derive(Debug)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) sig: TypeSig,
    pub(crate) modifiers: Modifiers,
    pub(crate) id: OnceCell<RawId>,
}

impl FieldDescriptor {
    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type
    pub fn sig(&self) -> &TypeSig {
        &self.sig
    }

    /// Whether the field is static
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Reflective modifiers
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

/// Everything known about one class.
///
/// Built once per qualified name by the catalog and shared afterwards.
#[derive(Debug)]
pub struct ClassDescriptor {
    pub(crate) name: ClassName,
    pub(crate) class_ref: GlobalRef,
    pub(crate) modifiers: Modifiers,
    pub(crate) superclass: Option<ClassName>,
    pub(crate) methods: Vec<Arc<MethodDescriptor>>,
    pub(crate) overloads: FxHashMap<String, Vec<usize>>,
    pub(crate) fields: Vec<Arc<FieldDescriptor>>,
    pub(crate) field_index: FxHashMap<String, usize>,
    pub(crate) constructors: Vec<Arc<MethodDescriptor>>,
}

impl ClassDescriptor {
    pub(crate) fn new(
        name: ClassName,
        class_ref: GlobalRef,
        modifiers: Modifiers,
        superclass: Option<ClassName>,
        methods: Vec<Arc<MethodDescriptor>>,
        fields: Vec<Arc<FieldDescriptor>>,
        constructors: Vec<Arc<MethodDescriptor>>,
    ) -> Self {
        let mut overloads: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, method) in methods.iter().enumerate() {
            overloads.entry(method.name.clone()).or_default().push(idx);
        }
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.name.clone(), idx))
            .collect();
        Self {
            name,
            class_ref,
            modifiers,
            superclass,
            methods,
            overloads,
            fields,
            field_index,
            constructors,
        }
    }

    /// Qualified name
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Global reference to the class object
    pub fn class_ref(&self) -> &GlobalRef {
        &self.class_ref
    }

    /// Class modifiers
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Direct superclass, `None` for `java.lang.Object` and interfaces
    pub fn superclass(&self) -> Option<&ClassName> {
        self.superclass.as_ref()
    }

    /// Methods in declaration order, declared first, then inherited public ones
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    /// The overload set for a name, in declaration order
    pub fn overloads(&self, name: &str) -> Vec<Arc<MethodDescriptor>> {
        self.overloads
            .get(name)
            .map(|indices| indices.iter().map(|i| self.methods[*i].clone()).collect())
            .unwrap_or_default()
    }

    /// Whether any method has this name
    pub fn has_method(&self, name: &str) -> bool {
        self.overloads.contains_key(name)
    }

    /// Fields, declared first
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.field_index.get(name).map(|i| &self.fields[*i])
    }

    /// Public constructors
    pub fn constructors(&self) -> &[Arc<MethodDescriptor>] {
        &self.constructors
    }

    /// Method id, resolved on first use and cached
    pub fn method_id(&self, frame: &Frame<'_>, method: &MethodDescriptor) -> Result<RawId> {
        method
            .id
            .get_or_try_init(|| {
                frame.method_id(
                    self.class_ref.handle(),
                    &self.name.binary(),
                    &method.name,
                    &method.descriptor,
                    method.is_static() && method.name != "<init>",
                )
            })
            .copied()
    }

    /// Field id, resolved on first use and cached
    pub fn field_id(&self, frame: &Frame<'_>, field: &FieldDescriptor) -> Result<RawId> {
        field
            .id
            .get_or_try_init(|| {
                frame.field_id(
                    self.class_ref.handle(),
                    &self.name.binary(),
                    &field.name,
                    &field.sig.descriptor(),
                    field.is_static(),
                )
            })
            .copied()
    }
}

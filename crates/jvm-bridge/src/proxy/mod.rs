//! Dynamic proxies for foreign packages, classes and instances
//!
//! A proxy resolves member names lazily through [`Proxy::resolve_member`]
//! and memoizes each answer. Proxies only hold a weak back-reference to
//! their VM; once the VM is shut down every call fails with `NotRunning`.

mod class;
mod instance;
mod member;
mod overload;
mod package;

pub use class::ClassProxy;
pub use instance::{InstanceProxy, WeakInstance};
pub use member::{BoundField, BoundMethod};
pub use package::PackageProxy;

use std::sync::Arc;

use crate::catalog::{FieldDescriptor, MethodDescriptor};
use crate::convert::HostValue;
use crate::error::{BridgeError, Result};

/// A foreign namespace, class or object
#[derive(Debug, Clone)]
pub enum Proxy {
    /// A package path such as `java.util`
    Package(PackageProxy),
    /// A class in static context
    Class(ClassProxy),
    /// An object
    Instance(InstanceProxy),
}

/// What a member name resolved to
#[derive(Debug, Clone)]
pub enum Member {
    /// An overload set bound to its receiver (or class, for statics)
    Methods(BoundMethod),
    /// A field bound to its receiver (or class, for statics)
    Field(BoundField),
    /// A nested package
    Package(PackageProxy),
    /// A class, or a nested class of a class
    Class(ClassProxy),
    /// Nothing by that name
    NotFound,
}

/// Memoized, receiver-free form of a [`Member`]
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Methods(Vec<Arc<MethodDescriptor>>),
    Field(Arc<FieldDescriptor>),
    Package(PackageProxy),
    Class(ClassProxy),
    NotFound,
}

impl Proxy {
    /// Resolve a member by name
    pub fn resolve_member(&self, name: &str) -> Result<Member> {
        match self {
            Proxy::Package(p) => p.resolve_member(name),
            Proxy::Class(c) => c.resolve_member(name),
            Proxy::Instance(i) => i.resolve_member(name),
        }
    }

    /// Call a method by name with overload resolution
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Methods(method) => method.call(args),
            _ => Err(self.missing(name)),
        }
    }

    /// Read a field by name
    pub fn get(&self, name: &str) -> Result<HostValue> {
        match self.resolve_member(name)? {
            Member::Field(field) => field.get(),
            _ => Err(self.missing(name)),
        }
    }

    /// Display name of the proxied package, class or object class
    pub fn name(&self) -> String {
        match self {
            Proxy::Package(p) => p.path().to_string(),
            Proxy::Class(c) => c.name().binary(),
            Proxy::Instance(i) => i.class_name().unwrap_or_else(|_| "<detached>".to_string()),
        }
    }

    /// The package proxy, if this is one
    pub fn as_package(&self) -> Option<&PackageProxy> {
        match self {
            Proxy::Package(p) => Some(p),
            _ => None,
        }
    }

    /// The class proxy, if this is one
    pub fn as_class(&self) -> Option<&ClassProxy> {
        match self {
            Proxy::Class(c) => Some(c),
            _ => None,
        }
    }

    /// The instance proxy, if this is one
    pub fn as_instance(&self) -> Option<&InstanceProxy> {
        match self {
            Proxy::Instance(i) => Some(i),
            _ => None,
        }
    }

    fn missing(&self, name: &str) -> BridgeError {
        BridgeError::MemberNotFound {
            class: self.name(),
            member: name.to_string(),
        }
    }
}

impl Member {
    /// Continue a namespace walk: packages and classes become proxies
    pub(crate) fn into_proxy(self, parent: &Proxy, name: &str) -> Result<Proxy> {
        match self {
            Member::Package(p) => Ok(Proxy::Package(p)),
            Member::Class(c) => Ok(Proxy::Class(c)),
            Member::NotFound => Err(parent.missing(name)),
            Member::Methods(_) | Member::Field(_) => Err(BridgeError::InvalidNamespace(format!(
                "{}.{} is a member, not a namespace",
                parent.name(),
                name
            ))),
        }
    }
}

impl From<PackageProxy> for Proxy {
    fn from(p: PackageProxy) -> Self {
        Proxy::Package(p)
    }
}

impl From<ClassProxy> for Proxy {
    fn from(c: ClassProxy) -> Self {
        Proxy::Class(c)
    }
}

impl From<InstanceProxy> for Proxy {
    fn from(i: InstanceProxy) -> Self {
        Proxy::Instance(i)
    }
}

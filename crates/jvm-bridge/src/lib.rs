//! JVM bridge
//!
//! Lets a host scripting environment call into a Java virtual machine
//! through JNI without compile-time class definitions:
//! - VM lifecycle with a drain barrier on shutdown
//! - Opaque, owned handles for every foreign reference
//! - Reflection-driven class metadata, cached per class
//! - Value marshaling driven by declared signatures
//! - Dynamic package, class and instance proxies with overload resolution
//! - Pluggable namespace resolution for `import java.util.ArrayList`-style paths
//!
//! With the `sim` feature, the `sim` module provides an in-process simulated
//! VM behind the same native interface, so everything above it can be
//! exercised without a JDK.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod import;
pub mod lifecycle;
pub mod native;
pub mod proxy;
pub mod signature;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use catalog::{CatalogStats, ClassDescriptor, FieldDescriptor, MethodDescriptor, Modifiers, PackageScan, ReflectionCatalog};
pub use config::Configuration;
pub use convert::{HostValue, TypeConverter};
pub use error::{BridgeError, Result, StartupError};
pub use gateway::{ForeignCallGateway, ForeignValue, Frame, GlobalRef, WeakRef};
pub use handle::{HandleCounts, NativeHandle, RefKind};
pub use import::{ImportRegistry, JavaImporter, NamespaceResolver, Resolution};
pub use lifecycle::{LifecycleManager, Phase, VmHandle};
pub use native::{JniLauncher, Launcher};
pub use proxy::{BoundField, BoundMethod, ClassProxy, InstanceProxy, Member, PackageProxy, Proxy, WeakInstance};
pub use signature::{ClassName, MethodSig, TypeSig};

//! Reflection catalog
//!
//! Discovers class metadata through the VM's own reflection API and caches
//! it per qualified name for the lifetime of the VM. The first lookup of a
//! class runs one reflection pass; every later lookup is a map hit.

mod classpath;
mod descriptor;

pub use classpath::{PackageClasses, PackageScan};
pub use descriptor::{ClassDescriptor, FieldDescriptor, MethodDescriptor};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{BridgeError, Result};
use crate::gateway::{ForeignCallGateway, ForeignValue, Frame};
use crate::handle::NativeHandle;
use crate::native::RawId;
use crate::signature::{ClassName, MethodSig, ReturnKind, TypeSig};

/// Reflective access modifiers (`java.lang.reflect.Modifier` bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(pub u32);

impl Modifiers {
    /// `public`
    pub const PUBLIC: u32 = 0x0001;
    /// `private`
    pub const PRIVATE: u32 = 0x0002;
    /// `protected`
    pub const PROTECTED: u32 = 0x0004;
    /// `static`
    pub const STATIC: u32 = 0x0008;
    /// `final`
    pub const FINAL: u32 = 0x0010;
    /// `interface`
    pub const INTERFACE: u32 = 0x0200;
    /// `abstract`
    pub const ABSTRACT: u32 = 0x0400;

    fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Has `public`
    pub fn is_public(self) -> bool {
        self.has(Self::PUBLIC)
    }

    /// Has `static`
    pub fn is_static(self) -> bool {
        self.has(Self::STATIC)
    }

    /// Has `final`
    pub fn is_final(self) -> bool {
        self.has(Self::FINAL)
    }

    /// Has `abstract`
    pub fn is_abstract(self) -> bool {
        self.has(Self::ABSTRACT)
    }

    /// Has `interface`
    pub fn is_interface(self) -> bool {
        self.has(Self::INTERFACE)
    }
}

/// Catalog counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    /// Classes currently cached
    pub classes: usize,
    /// Lookups answered from the cache, missing classes included
    pub hits: u64,
    /// Reflection passes run
    pub misses: u64,
}

/// Method ids of the reflection API, resolved once per VM
#[derive(Debug)]
struct ReflectIds {
    class_modifiers: RawId,
    class_superclass: RawId,
    class_declared_methods: RawId,
    class_methods: RawId,
    class_declared_fields: RawId,
    class_fields: RawId,
    class_constructors: RawId,
    method_name: RawId,
    method_params: RawId,
    method_return: RawId,
    method_modifiers: RawId,
    ctor_params: RawId,
    ctor_modifiers: RawId,
    field_name: RawId,
    field_type: RawId,
    field_modifiers: RawId,
}

impl ReflectIds {
    fn resolve(frame: &Frame<'_>) -> Result<Self> {
        let class = frame.find_class("java/lang/Class")?;
        let method = frame.find_class("java/lang/reflect/Method")?;
        let ctor = frame.find_class("java/lang/reflect/Constructor")?;
        let field = frame.find_class("java/lang/reflect/Field")?;
        let id = |owner: NativeHandle, owner_name: &str, name: &str, descriptor: &str| {
            frame.method_id(owner, owner_name, name, descriptor, false)
        };
        Ok(Self {
            class_modifiers: id(class, "java.lang.Class", "getModifiers", "()I")?,
            class_superclass: id(class, "java.lang.Class", "getSuperclass", "()Ljava/lang/Class;")?,
            class_declared_methods: id(class, "java.lang.Class", "getDeclaredMethods", "()[Ljava/lang/reflect/Method;")?,
            class_methods: id(class, "java.lang.Class", "getMethods", "()[Ljava/lang/reflect/Method;")?,
            class_declared_fields: id(class, "java.lang.Class", "getDeclaredFields", "()[Ljava/lang/reflect/Field;")?,
            class_fields: id(class, "java.lang.Class", "getFields", "()[Ljava/lang/reflect/Field;")?,
            class_constructors: id(class, "java.lang.Class", "getConstructors", "()[Ljava/lang/reflect/Constructor;")?,
            method_name: id(method, "java.lang.reflect.Method", "getName", "()Ljava/lang/String;")?,
            method_params: id(method, "java.lang.reflect.Method", "getParameterTypes", "()[Ljava/lang/Class;")?,
            method_return: id(method, "java.lang.reflect.Method", "getReturnType", "()Ljava/lang/Class;")?,
            method_modifiers: id(method, "java.lang.reflect.Method", "getModifiers", "()I")?,
            ctor_params: id(ctor, "java.lang.reflect.Constructor", "getParameterTypes", "()[Ljava/lang/Class;")?,
            ctor_modifiers: id(ctor, "java.lang.reflect.Constructor", "getModifiers", "()I")?,
            field_name: id(field, "java.lang.reflect.Field", "getName", "()Ljava/lang/String;")?,
            field_type: id(field, "java.lang.reflect.Field", "getType", "()Ljava/lang/Class;")?,
            field_modifiers: id(field, "java.lang.reflect.Field", "getModifiers", "()I")?,
        })
    }
}

/// Raw member data read from one reflective object
struct MemberInfo {
    name: String,
    sig: MethodSig,
    modifiers: Modifiers,
}

/// Memoized class metadata for one VM
pub struct ReflectionCatalog {
    gateway: Arc<ForeignCallGateway>,
    classpath: Vec<PathBuf>,
    classes: RwLock<FxHashMap<String, Arc<ClassDescriptor>>>,
    missing: RwLock<FxHashSet<String>>,
    /// Serializes reflection passes so a class is built at most once
    build_lock: Mutex<()>,
    ids: OnceCell<ReflectIds>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ReflectionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionCatalog")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ReflectionCatalog {
    /// Create an empty catalog over a gateway and its classpath
    pub fn new(gateway: Arc<ForeignCallGateway>, classpath: Vec<PathBuf>) -> Self {
        Self {
            gateway,
            classpath,
            classes: RwLock::new(FxHashMap::default()),
            missing: RwLock::new(FxHashSet::default()),
            build_lock: Mutex::new(()),
            ids: OnceCell::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Gateway the catalog reflects through
    pub fn gateway(&self) -> &Arc<ForeignCallGateway> {
        &self.gateway
    }

    fn cached(&self, internal: &str) -> Option<Result<Arc<ClassDescriptor>>> {
        if let Some(descriptor) = self.classes.read().get(internal) {
            return Some(Ok(descriptor.clone()));
        }
        if self.missing.read().contains(internal) {
            return Some(Err(BridgeError::ClassNotFound(internal.replace('/', "."))));
        }
        None
    }

    /// Descriptor for a class, in dotted or slashed spelling.
    ///
    /// Fails with `ClassNotFound` if the VM has no such class.
    pub fn find_class(&self, name: &str) -> Result<Arc<ClassDescriptor>> {
        let name = ClassName::new(name)?;
        if let Some(found) = self.cached(name.internal()) {
            log::trace!("Catalog hit for {}", name);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }

        let _building = self.build_lock.lock();
        if let Some(found) = self.cached(name.internal()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("Resolving class {}", name);
        match self.build(&name) {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                self.classes
                    .write()
                    .insert(name.internal().to_string(), descriptor.clone());
                Ok(descriptor)
            }
            Err(BridgeError::ClassNotFound(missing)) => {
                self.missing.write().insert(name.internal().to_string());
                Err(BridgeError::ClassNotFound(missing))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a class is cached, without resolving it
    pub fn is_cached(&self, name: &str) -> bool {
        ClassName::new(name)
            .map(|n| self.classes.read().contains_key(n.internal()))
            .unwrap_or(false)
    }

    /// Classes directly in a package, from the configured classpath
    pub fn discover_package_classes(&self, package: &str) -> Result<PackageScan> {
        PackageScan::new(self.classpath.clone(), package)
    }

    /// Current counters
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            classes: self.classes.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached descriptor
    pub fn clear(&self) {
        self.classes.write().clear();
        self.missing.write().clear();
    }

    fn build(&self, name: &ClassName) -> Result<ClassDescriptor> {
        let frame = self.gateway.frame()?;
        let class = frame.find_class(name.internal())?;
        let ids = self.ids.get_or_try_init(|| ReflectIds::resolve(&frame))?;

        let modifiers = Modifiers(int_of(frame.call_method(class, ids.class_modifiers, ReturnKind::Int, &[])?)?);
        let superclass = match frame
            .call_method(class, ids.class_superclass, ReturnKind::Object, &[])?
            .handle()
        {
            Some(superclass) => Some(ClassName::new(&frame.class_name(superclass)?)?),
            None => None,
        };

        let mut methods: Vec<Arc<MethodDescriptor>> = Vec::new();
        let mut seen: FxHashSet<(String, String)> = FxHashSet::default();
        let mut sets: FxHashMap<String, usize> = FxHashMap::default();
        for getter in [ids.class_declared_methods, ids.class_methods] {
            for info in self.members(&frame, class, getter, |inner, member| {
                read_method(inner, ids, member)
            })? {
                if !seen.insert((info.name.clone(), info.sig.param_descriptor())) {
                    continue;
                }
                let next_set = sets.len();
                let overload_set = *sets.entry(info.name.clone()).or_insert(next_set);
                methods.push(Arc::new(MethodDescriptor::new(info.name, info.sig, info.modifiers, overload_set)));
            }
        }

        let mut fields: Vec<Arc<FieldDescriptor>> = Vec::new();
        for getter in [ids.class_declared_fields, ids.class_fields] {
            for (field_name, sig, modifiers) in self.members(&frame, class, getter, |inner, member| {
                read_field(inner, ids, member)
            })? {
                if fields.iter().any(|f| f.name == field_name) {
                    continue;
                }
                fields.push(Arc::new(FieldDescriptor {
                    name: field_name,
                    sig,
                    modifiers,
                    id: OnceCell::new(),
                }));
            }
        }

        let constructors = self
            .members(&frame, class, ids.class_constructors, |inner, member| {
                Ok(MemberInfo {
                    name: "<init>".to_string(),
                    sig: MethodSig::new(type_list(inner, member, ids.ctor_params)?, TypeSig::Void),
                    modifiers: Modifiers(int_of(inner.call_method(member, ids.ctor_modifiers, ReturnKind::Int, &[])?)?),
                })
            })?
            .into_iter()
            .map(|info| Arc::new(MethodDescriptor::new(info.name, info.sig, info.modifiers, 0)))
            .collect();

        let class_ref = frame.promote(class)?;
        log::debug!(
            "Resolved {}: {} methods, {} fields",
            name,
            methods.len(),
            fields.len()
        );
        Ok(ClassDescriptor::new(
            name.clone(),
            class_ref,
            modifiers,
            superclass,
            methods,
            fields,
            constructors,
        ))
    }

    /// Read every element of a reflective array, each in its own frame so
    /// local references stay bounded
    fn members<T>(
        &self,
        frame: &Frame<'_>,
        class: NativeHandle,
        getter: RawId,
        read: impl Fn(&Frame<'_>, NativeHandle) -> Result<T>,
    ) -> Result<Vec<T>> {
        let Some(array) = frame.call_method(class, getter, ReturnKind::Object, &[])?.handle() else {
            return Ok(Vec::new());
        };
        let len = frame.array_length(array)?;
        let mut out = Vec::with_capacity(len);
        for index in 0..len {
            let inner = self.gateway.frame()?;
            let Some(member) = inner.array_element(array, index)? else {
                continue;
            };
            out.push(read(&inner, member)?);
        }
        Ok(out)
    }
}

fn int_of(value: ForeignValue) -> Result<u32> {
    match value {
        ForeignValue::Int(v) => Ok(v as u32),
        other => Err(BridgeError::Conversion(format!("expected int, got {:?}", other))),
    }
}

fn string_of(frame: &Frame<'_>, value: ForeignValue) -> Result<String> {
    match value.handle() {
        Some(handle) => frame.get_string(handle),
        None => Err(BridgeError::Conversion("unexpected null name".to_string())),
    }
}

fn type_of(frame: &Frame<'_>, class: Option<NativeHandle>) -> Result<TypeSig> {
    match class {
        Some(class) => TypeSig::from_java_name(&frame.class_name(class)?),
        None => Err(BridgeError::Conversion("unexpected null type".to_string())),
    }
}

fn type_list(frame: &Frame<'_>, member: NativeHandle, getter: RawId) -> Result<Vec<TypeSig>> {
    let Some(array) = frame.call_method(member, getter, ReturnKind::Object, &[])?.handle() else {
        return Ok(Vec::new());
    };
    (0..frame.array_length(array)?)
        .map(|i| type_of(frame, frame.array_element(array, i)?))
        .collect()
}

fn read_method(frame: &Frame<'_>, ids: &ReflectIds, method: NativeHandle) -> Result<MemberInfo> {
    let name = string_of(frame, frame.call_method(method, ids.method_name, ReturnKind::Object, &[])?)?;
    let params = type_list(frame, method, ids.method_params)?;
    let ret = type_of(
        frame,
        frame
            .call_method(method, ids.method_return, ReturnKind::Object, &[])?
            .handle(),
    )?;
    let modifiers = Modifiers(int_of(frame.call_method(method, ids.method_modifiers, ReturnKind::Int, &[])?)?);
    Ok(MemberInfo {
        name,
        sig: MethodSig::new(params, ret),
        modifiers,
    })
}

fn read_field(frame: &Frame<'_>, ids: &ReflectIds, field: NativeHandle) -> Result<(String, TypeSig, Modifiers)> {
    let name = string_of(frame, frame.call_method(field, ids.field_name, ReturnKind::Object, &[])?)?;
    let sig = type_of(
        frame,
        frame
            .call_method(field, ids.field_type, ReturnKind::Object, &[])?
            .handle(),
    )?;
    let modifiers = Modifiers(int_of(frame.call_method(field, ids.field_modifiers, ReturnKind::Int, &[])?)?);
    Ok((name, sig, modifiers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::native::Launcher;
    use crate::sim::{ClassBuilder, SimLauncher, SimThrow, SimValue, SimVm};

    fn catalog(builder: crate::sim::SimLauncherBuilder) -> (ReflectionCatalog, SimVm) {
        let launcher = builder.build().unwrap();
        let native = launcher.launch(&Configuration::default()).unwrap();
        let gateway = ForeignCallGateway::new(native);
        (ReflectionCatalog::new(gateway, Vec::new()), launcher.vm().unwrap())
    }

    #[test]
    fn test_second_lookup_is_a_cache_hit() {
        let (catalog, vm) = catalog(SimLauncher::builder());
        let first = catalog.find_class("java.lang.String").unwrap();
        let reflection_after_first = vm.stats().reflection_calls;
        let second = catalog.find_class("java/lang/String").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(vm.stats().reflection_calls, reflection_after_first);
        assert_eq!(catalog.stats().misses, 1);
        assert_eq!(catalog.stats().hits, 1);
        assert!(catalog.is_cached("java.lang.String"));
    }

    #[test]
    fn test_overload_sets_and_inherited_methods() {
        let (catalog, _vm) = catalog(SimLauncher::builder());
        let string = catalog.find_class("java.lang.String").unwrap();

        let value_of = string.overloads("valueOf");
        assert!(value_of.len() >= 4);
        assert!(value_of.iter().all(|m| m.is_static()));
        assert!(value_of.windows(2).all(|w| w[0].overload_set() == w[1].overload_set()));

        // declared override comes first, the inherited duplicate is dropped
        let to_string = string.overloads("toString");
        assert_eq!(to_string.len(), 1);
        assert!(string.has_method("hashCode"));
        assert_eq!(string.superclass().map(|s| s.binary()), Some("java.lang.Object".to_string()));
    }

    #[test]
    fn test_fields_and_constructors() {
        let builder = SimLauncher::builder().class(
            ClassBuilder::new("demo/Point")
                .default_constructor()
                .constructor("(II)V", |heap, this, args| {
                    let this = this.ok_or_else(SimThrow::null_pointer)?;
                    heap.set_field(this, "x", args[0]);
                    heap.set_field(this, "y", args[1]);
                    Ok(SimValue::Void)
                })
                .field("x", "I")
                .field("y", "I")
                .static_field("ORIGIN_X", "I", SimValue::Int(0)),
        );
        let (catalog, _vm) = catalog(builder);
        let point = catalog.find_class("demo.Point").unwrap();
        assert_eq!(point.constructors().len(), 2);
        assert_eq!(point.field("x").map(|f| f.sig().clone()), Some(TypeSig::Int));
        assert!(point.field("ORIGIN_X").map_or(false, |f| f.is_static()));
        assert!(point.field("z").is_none());
    }

    #[test]
    fn test_missing_class_is_cached_negative() {
        let (catalog, vm) = catalog(SimLauncher::builder());
        assert!(matches!(
            catalog.find_class("does/not/Exist"),
            Err(BridgeError::ClassNotFound(ref n)) if n == "does.not.Exist"
        ));
        let lookups = vm.stats().find_class_calls;
        assert!(catalog.find_class("does.not.Exist").is_err());
        assert_eq!(vm.stats().find_class_calls, lookups);
        assert_eq!(vm.pending_exceptions(), 0);
    }

    #[test]
    fn test_method_ids_are_cached() {
        let (catalog, _vm) = catalog(SimLauncher::builder());
        let string = catalog.find_class("java.lang.String").unwrap();
        let length = string.overloads("length").remove(0);
        let frame = catalog.gateway().frame().unwrap();
        let first = string.method_id(&frame, &length).unwrap();
        assert_eq!(string.method_id(&frame, &length).unwrap(), first);
        assert!(length.id.get().is_some());
    }
}

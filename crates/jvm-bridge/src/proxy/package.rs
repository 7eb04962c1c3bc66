//! Package proxies

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

use super::{ClassProxy, Member, Resolved};
use crate::catalog::PackageScan;
use crate::error::{BridgeError, Result};
use crate::lifecycle::{VmHandle, VmShared};

/// A foreign package path. Members are subpackages or classes.
#[derive(Clone)]
pub struct PackageProxy {
    path: Arc<str>,
    vm: Weak<VmShared>,
    memo: Arc<Mutex<FxHashMap<String, Resolved>>>,
}

impl std::fmt::Debug for PackageProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PackageProxy").field(&self.path).finish()
    }
}

impl PackageProxy {
    pub(crate) fn new(vm: &VmHandle, path: &str) -> Self {
        Self {
            path: Arc::from(path),
            vm: vm.downgrade(),
            memo: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Dotted package path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A class if the joined path names one, otherwise a subpackage
    pub fn resolve_member(&self, name: &str) -> Result<Member> {
        if let Some(resolved) = self.memo.lock().get(name) {
            return Ok(self.bind(resolved.clone()));
        }
        let vm = VmHandle::upgrade(&self.vm)?;
        let joined = format!("{}.{}", self.path, name);
        let resolved = match vm.find_class(&joined) {
            Ok(descriptor) => Resolved::Class(ClassProxy::new(&vm, descriptor)),
            Err(BridgeError::ClassNotFound(_)) => Resolved::Package(PackageProxy::new(&vm, &joined)),
            Err(e) => return Err(e),
        };
        self.memo.lock().insert(name.to_string(), resolved.clone());
        Ok(self.bind(resolved))
    }

    fn bind(&self, resolved: Resolved) -> Member {
        match resolved {
            Resolved::Package(p) => Member::Package(p),
            Resolved::Class(c) => Member::Class(c),
            _ => Member::NotFound,
        }
    }

    /// Classes directly in this package, from the classpath
    pub fn classes(&self) -> Result<PackageScan> {
        VmHandle::upgrade(&self.vm)?.discover_package_classes(&self.path)
    }
}

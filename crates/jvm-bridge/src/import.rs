//! Namespace import resolution
//!
//! The host environment asks an [`ImportRegistry`] to resolve dotted import
//! paths. Each registered [`NamespaceResolver`] either claims the path and
//! answers with a proxy, or declines it and lets the next resolver try:
//! - Reserved JVM prefixes: `java.util.ArrayList`, `javax.crypto`, `jdk.net`
//! - User prefixes registered on a [`JavaImporter`]: `com.example.Greeter`

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::Result;
use crate::lifecycle::LifecycleManager;
use crate::proxy::Proxy;

/// Prefixes the JVM importer always handles
pub const RESERVED_PREFIXES: &[&str] = &["java", "javax", "jdk"];

/// Outcome of offering a path to a resolver
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The resolver owns the path and produced a proxy
    Resolved(Proxy),
    /// Not this resolver's namespace
    Declined,
}

/// A pluggable handler for dotted import paths
pub trait NamespaceResolver: Send + Sync {
    /// Resolve `path`, or decline it without side effects
    fn resolve(&self, path: &str) -> Result<Resolution>;
}

/// Resolves JVM namespaces, starting the VM on first use
pub struct JavaImporter {
    manager: Arc<LifecycleManager>,
    prefixes: Vec<String>,
}

impl JavaImporter {
    /// Importer for the reserved prefixes
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        Self {
            manager,
            prefixes: RESERVED_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Also claim `prefix`. Classes outside the JDK are only found through
    /// the configured classpath.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if self.manager.configuration().classpath.is_empty() {
            log::warn!("Import prefix '{}' registered with an empty classpath", prefix);
        }
        self.prefixes.push(prefix.trim_end_matches('.').to_string());
        self
    }

    /// Prefixes claimed by this importer
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `path` falls under one of the claimed prefixes
    pub fn handles(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

impl NamespaceResolver for JavaImporter {
    fn resolve(&self, path: &str) -> Result<Resolution> {
        if !self.handles(path) {
            return Ok(Resolution::Declined);
        }
        log::debug!("Importing {}", path);
        let vm = self.manager.ensure_started()?;
        Ok(Resolution::Resolved(vm.resolve(path)?))
    }
}

/// Ordered set of namespace resolvers
#[derive(Default)]
pub struct ImportRegistry {
    resolvers: RwLock<Vec<Arc<dyn NamespaceResolver>>>,
}

impl ImportRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver; earlier registrations are tried first
    pub fn register(&self, resolver: Arc<dyn NamespaceResolver>) {
        self.resolvers.write().push(resolver);
    }

    /// Number of registered resolvers
    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }

    /// The first resolver to claim `path` decides.
    ///
    /// `Ok(None)` means every resolver declined.
    pub fn resolve(&self, path: &str) -> Result<Option<Proxy>> {
        let resolvers = self.resolvers.read().clone();
        for resolver in resolvers {
            if let Resolution::Resolved(proxy) = resolver.resolve(path)? {
                return Ok(Some(proxy));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::error::BridgeError;
    use crate::lifecycle::Phase;
    use crate::sim::SimLauncher;

    fn manager() -> Arc<LifecycleManager> {
        Arc::new(LifecycleManager::new(
            SimLauncher::builder().build().unwrap(),
            Configuration::default(),
        ))
    }

    #[test]
    fn test_prefix_matching() {
        let importer = JavaImporter::new(manager()).with_prefix("org.example.");
        assert!(importer.handles("java"));
        assert!(importer.handles("java.util.ArrayList"));
        assert!(importer.handles("org.example.Tool"));
        assert!(!importer.handles("javascript.Thing"));
        assert!(!importer.handles("org.exampleother"));
        assert!(!importer.handles("numpy"));
    }

    #[test]
    fn test_declined_paths_do_not_start_the_vm() {
        let manager = manager();
        let registry = ImportRegistry::new();
        registry.register(Arc::new(JavaImporter::new(manager.clone())));
        assert!(registry.resolve("os.path").unwrap().is_none());
        assert_eq!(manager.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_reserved_path_auto_starts() {
        let manager = manager();
        let registry = ImportRegistry::new();
        registry.register(Arc::new(JavaImporter::new(manager.clone())));
        let proxy = registry.resolve("java.lang.Math").unwrap().unwrap();
        assert_eq!(manager.phase(), Phase::Running);
        assert_eq!(proxy.name(), "java.lang.Math");
        let package = registry.resolve("java.util").unwrap().unwrap();
        assert_eq!(package.as_package().unwrap().path(), "java.util");
    }

    #[test]
    fn test_registration_order() {
        struct Fixed;
        impl NamespaceResolver for Fixed {
            fn resolve(&self, _path: &str) -> Result<Resolution> {
                Err(BridgeError::InvalidNamespace("fixed".to_string()))
            }
        }

        let registry = ImportRegistry::new();
        registry.register(Arc::new(JavaImporter::new(manager())));
        registry.register(Arc::new(Fixed));
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("java.lang.Math").unwrap().is_some());
        assert!(matches!(
            registry.resolve("anything.else"),
            Err(BridgeError::InvalidNamespace(_))
        ));
    }
}

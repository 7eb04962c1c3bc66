//! VM configuration
//!
//! The bridge consumes a [`Configuration`] but never reads configuration files
//! itself; embedders deserialize it from wherever they keep their settings
//! (the serde field names use kebab-case, e.g. `java-version`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::StartupError;

/// Java version used when none is declared
pub const DEFAULT_JAVA_VERSION: &str = "17";

/// Resolved VM configuration. Immutable once the VM starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Java version selector, used to locate `libjvm`
    pub java_version: String,

    /// Ordered classpath entries (archives or directories)
    pub classpath: Vec<PathBuf>,

    /// Dependency declarations by source (advisory, unused by the bridge)
    pub deps: BTreeMap<String, Vec<String>>,

    /// Explicit JDK home; overrides `JAVA_HOME` and the version search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_home: Option<PathBuf>,

    /// Extra options passed verbatim to the VM (`-Xmx512m`, `-Dkey=value`)
    pub jvm_options: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            java_version: DEFAULT_JAVA_VERSION.to_string(),
            classpath: Vec::new(),
            deps: BTreeMap::new(),
            java_home: None,
            jvm_options: Vec::new(),
        }
    }
}

impl Configuration {
    /// Configuration for the given Java version with an empty classpath
    pub fn new(java_version: impl Into<String>) -> Self {
        Self {
            java_version: java_version.into(),
            ..Default::default()
        }
    }

    /// Append a classpath entry
    pub fn with_classpath_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.classpath.push(entry.into());
        self
    }

    /// Set an explicit JDK home
    pub fn with_java_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(home.into());
        self
    }

    /// Append a raw VM option
    pub fn with_jvm_option(mut self, option: impl Into<String>) -> Self {
        self.jvm_options.push(option.into());
        self
    }

    /// Record a dependency declaration (e.g. source `maven`,
    /// coordinate `org.apache.commons:commons-lang3:3.12.0`)
    pub fn with_dependency(mut self, source: impl Into<String>, coordinate: impl Into<String>) -> Self {
        self.deps
            .entry(source.into())
            .or_default()
            .push(coordinate.into());
        self
    }

    /// Check the configuration before launch.
    ///
    /// Missing classpath entries only warn; the VM tolerates them.
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.java_version.trim().is_empty() {
            return Err(StartupError::InvalidConfiguration(
                "java-version must not be empty".to_string(),
            ));
        }
        for entry in &self.classpath {
            if entry.as_os_str().is_empty() {
                return Err(StartupError::InvalidConfiguration(
                    "classpath entries must not be empty".to_string(),
                ));
            }
            if !entry.exists() {
                log::warn!("Classpath entry does not exist: {}", entry.display());
            }
        }
        if self.jvm_options.iter().any(|o| o.starts_with("-Djava.class.path=")) {
            return Err(StartupError::InvalidConfiguration(
                "set the classpath through `classpath`, not a -Djava.class.path option".to_string(),
            ));
        }
        Ok(())
    }

    /// Classpath joined with the platform separator (`:` or `;`)
    pub fn classpath_string(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        self.classpath
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// The full option list handed to the VM at creation
    pub fn vm_options(&self) -> Vec<String> {
        let mut options = Vec::with_capacity(self.jvm_options.len() + 1);
        if !self.classpath.is_empty() {
            options.push(format!("-Djava.class.path={}", self.classpath_string()));
        }
        options.extend(self.jvm_options.iter().cloned());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.java_version, "17");
        assert!(config.classpath.is_empty());
        assert!(config.vm_options().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vm_options_put_classpath_first() {
        let config = Configuration::new("21")
            .with_classpath_entry("a.jar")
            .with_classpath_entry("classes")
            .with_jvm_option("-Xmx256m");
        let options = config.vm_options();
        assert_eq!(options.len(), 2);
        assert!(options[0].starts_with("-Djava.class.path=a.jar"));
        assert!(options[0].ends_with("classes"));
        assert_eq!(options[1], "-Xmx256m");
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let config = Configuration::new("  ");
        assert!(matches!(
            config.validate(),
            Err(StartupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_classpath_option() {
        let config = Configuration::default().with_jvm_option("-Djava.class.path=x.jar");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dependencies_are_grouped_by_source() {
        let config = Configuration::default()
            .with_dependency("maven", "a:b:1")
            .with_dependency("maven", "c:d:2");
        assert_eq!(config.deps["maven"], vec!["a:b:1", "c:d:2"]);
    }
}

//! `libjvm` discovery
//!
//! Search order: the configured `java_home`, then `JAVA_HOME`, then the
//! well-known install directories of the common distributions for the
//! configured Java version.

use std::path::{Path, PathBuf};

use crate::config::Configuration;
use crate::error::StartupError;

#[cfg(target_os = "windows")]
const LIBJVM_IN_HOME: &[&str] = &["bin/server/jvm.dll", "jre/bin/server/jvm.dll"];

#[cfg(target_os = "macos")]
const LIBJVM_IN_HOME: &[&str] = &[
    "lib/server/libjvm.dylib",
    "Contents/Home/lib/server/libjvm.dylib",
    "jre/lib/server/libjvm.dylib",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBJVM_IN_HOME: &[&str] = &["lib/server/libjvm.so", "jre/lib/server/libjvm.so"];

/// Candidate `libjvm` paths inside a JDK home
pub fn home_candidates(home: &Path) -> Vec<PathBuf> {
    LIBJVM_IN_HOME.iter().map(|rel| home.join(rel)).collect()
}

/// Well-known install locations for a Java version on this platform
pub fn well_known_candidates(version: &str) -> Vec<PathBuf> {
    platform_candidates(version)
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

#[cfg(target_os = "windows")]
fn platform_candidates(version: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for root in ["C:\\Program Files", "C:\\Program Files (x86)"] {
        paths.push(format!("{root}\\Java\\jdk-{version}\\bin\\server\\jvm.dll"));
        paths.push(format!("{root}\\Eclipse Adoptium\\jdk-{version}\\bin\\server\\jvm.dll"));
        paths.push(format!("{root}\\Amazon Corretto\\jdk{version}\\bin\\server\\jvm.dll"));
        paths.push(format!("{root}\\Microsoft\\jdk-{version}\\bin\\server\\jvm.dll"));
        paths.push(format!("{root}\\Zulu\\zulu-{version}\\bin\\server\\jvm.dll"));
        paths.push(format!("{root}\\OpenJDK\\jdk-{version}\\bin\\server\\jvm.dll"));
    }
    paths.push(format!(
        "C:\\hostedtoolcache\\windows\\Java_Temurin-Hotspot_jdk\\{version}\\x64\\bin\\server\\jvm.dll"
    ));
    paths
}

#[cfg(target_os = "macos")]
fn platform_candidates(version: &str) -> Vec<String> {
    let mut paths = vec![format!(
        "/opt/homebrew/opt/openjdk@{version}/libexec/openjdk.jdk/Contents/Home/lib/server/libjvm.dylib"
    )];
    for vendor in ["jdk", "temurin", "amazon-corretto", "zulu", "openjdk"] {
        paths.push(format!(
            "/Library/Java/JavaVirtualMachines/{vendor}-{version}.jdk/Contents/Home/lib/server/libjvm.dylib"
        ));
    }
    paths.push(format!(
        "/Users/runner/hostedtoolcache/Java_Temurin-Hotspot_jdk/{version}/arm64/Contents/Home/lib/server/libjvm.dylib"
    ));
    paths
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_candidates(version: &str) -> Vec<String> {
    let dirs = [
        format!("java-{version}-openjdk"),
        format!("java-{version}-openjdk-amd64"),
        format!("java-{version}-openjdk-arm64"),
        format!("java-{version}"),
        format!("temurin-{version}-jdk"),
        format!("temurin-{version}-jdk-amd64"),
        format!("amazon-corretto-{version}-jdk"),
        format!("amazon-corretto-{version}-jdk-amd64"),
        format!("zulu-{version}-jdk"),
        format!("zulu-{version}-jdk-amd64"),
        format!("openjdk-{version}-jdk"),
        format!("openjdk-{version}-jdk-amd64"),
    ];
    dirs.iter()
        .map(|dir| format!("/usr/lib/jvm/{dir}/lib/server/libjvm.so"))
        .collect()
}

/// Every path probed for the configuration, in search order
pub fn search_path(config: &Configuration, java_home_env: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = &config.java_home {
        candidates.extend(home_candidates(home));
    }
    if let Some(home) = java_home_env {
        candidates.extend(home_candidates(home));
    }
    candidates.extend(well_known_candidates(&config.java_version));
    candidates
}

/// Locate `libjvm` for the configuration.
pub fn find_libjvm(config: &Configuration) -> Result<PathBuf, StartupError> {
    let env_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
    let searched = search_path(config, env_home.as_deref());
    match searched.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(StartupError::LibraryNotFound {
            version: config.java_version.clone(),
            searched,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_home_wins() {
        let home = tempfile::tempdir().unwrap();
        let lib = home.path().join(LIBJVM_IN_HOME[0]);
        fs::create_dir_all(lib.parent().unwrap()).unwrap();
        fs::write(&lib, b"").unwrap();

        let config = Configuration::new("17").with_java_home(home.path());
        assert_eq!(find_libjvm(&config).unwrap(), lib);
    }

    #[test]
    fn test_search_order() {
        let config = Configuration::new("21").with_java_home("/explicit");
        let searched = search_path(&config, Some(Path::new("/env")));
        assert!(searched[0].starts_with("/explicit"));
        let env_pos = searched.iter().position(|p| p.starts_with("/env")).unwrap();
        assert!(env_pos >= LIBJVM_IN_HOME.len());
        assert!(searched
            .iter()
            .skip(env_pos)
            .any(|p| p.to_string_lossy().contains("21")));
    }

    #[test]
    fn test_missing_library_reports_candidates() {
        let config = Configuration::new("0-missing").with_java_home("/nonexistent/jdk");
        match search_path(&config, None).iter().find(|p| p.is_file()) {
            None => {}
            Some(p) => panic!("unexpected libjvm at {}", p.display()),
        }
        let err = StartupError::LibraryNotFound {
            version: config.java_version.clone(),
            searched: search_path(&config, None),
        };
        assert!(err.to_string().contains("0-missing"));
    }
}

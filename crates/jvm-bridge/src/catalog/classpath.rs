//! Package discovery over classpath entries
//!
//! Lists the classes that sit directly in a package, from both directory
//! trees and `.jar`/`.zip` archives. Nested classes (`Outer$Inner`),
//! `package-info` and `module-info` are skipped.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::vec;

use crate::error::{BridgeError, Result};

/// A restartable scan of one package across the classpath
#[derive(Debug, Clone)]
pub struct PackageScan {
    entries: Vec<PathBuf>,
    /// Internal package path, `java/util`
    package: String,
}

impl PackageScan {
    pub(crate) fn new(entries: Vec<PathBuf>, package: &str) -> Result<Self> {
        let package = package.trim().replace('.', "/");
        if package.is_empty()
            || package.starts_with('/')
            || package.ends_with('/')
            || package.contains("//")
        {
            return Err(BridgeError::InvalidNamespace(package));
        }
        Ok(Self { entries, package })
    }

    /// Package in binary spelling
    pub fn package(&self) -> String {
        self.package.replace('/', ".")
    }

    /// A fresh lazy pass over the classpath
    pub fn iter(&self) -> PackageClasses {
        PackageClasses {
            entries: self.entries.clone().into_iter(),
            current: Vec::new().into_iter(),
            package: self.package.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a PackageScan {
    type Item = String;
    type IntoIter = PackageClasses;

    fn into_iter(self) -> PackageClasses {
        self.iter()
    }
}

/// Qualified class names of one package; classpath entries are opened one
/// at a time as the iterator advances
#[derive(Debug)]
pub struct PackageClasses {
    entries: vec::IntoIter<PathBuf>,
    current: vec::IntoIter<String>,
    package: String,
}

impl Iterator for PackageClasses {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(name) = self.current.next() {
                return Some(name);
            }
            let entry = self.entries.next()?;
            self.current = list_entry(&entry, &self.package).into_iter();
        }
    }
}

fn list_entry(entry: &Path, package: &str) -> Vec<String> {
    let listed = if entry.is_dir() {
        list_directory(entry, package)
    } else {
        list_archive(entry, package)
    };
    match listed {
        Ok(names) => names,
        Err(e) => {
            log::warn!("Skipping classpath entry {}: {}", entry.display(), e);
            Vec::new()
        }
    }
}

/// Simple class name of an entry directly in the package, if it is a class
/// that can be imported
fn class_file_name(file_name: &str) -> Option<&str> {
    let simple = file_name.strip_suffix(".class")?;
    if simple.is_empty() || simple.contains('$') || simple == "package-info" || simple == "module-info" {
        return None;
    }
    Some(simple)
}

fn qualified(package: &str, simple: &str) -> String {
    format!("{}.{}", package.replace('/', "."), simple)
}

fn list_directory(root: &Path, package: &str) -> std::io::Result<Vec<String>> {
    let dir = root.join(package);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(simple) = file_name.to_str().and_then(class_file_name) {
            names.push(qualified(package, simple));
        }
    }
    Ok(names)
}

fn list_archive(path: &Path, package: &str) -> std::io::Result<Vec<String>> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let prefix = format!("{}/", package);
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let Some(rest) = entry.name().strip_prefix(&prefix) else {
            continue;
        };
        if rest.contains('/') {
            continue;
        }
        if let Some(simple) = class_file_name(rest) {
            names.push(qualified(package, simple));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_jar(path: &Path, entries: &[&str]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for entry in entries {
            zip.start_file(*entry, options).unwrap();
            zip.write_all(b"\xca\xfe\xba\xbe").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_archive_listing_keeps_direct_members() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                "pkg/Greeter.class",
                "pkg/Greeter$Inner.class",
                "pkg/package-info.class",
                "pkg/sub/Deep.class",
                "pkg/README.txt",
                "other/Thing.class",
                "pkg/Util.class",
            ],
        );

        let scan = PackageScan::new(vec![jar], "pkg").unwrap();
        let names: Vec<String> = scan.iter().collect();
        assert_eq!(names, vec!["pkg.Greeter".to_string(), "pkg.Util".to_string()]);
    }

    #[test]
    fn test_scan_is_restartable_and_spans_entries() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        fs::create_dir_all(classes.join("a/b")).unwrap();
        fs::write(classes.join("a/b/One.class"), b"").unwrap();
        fs::write(classes.join("a/b/module-info.class"), b"").unwrap();
        let jar = dir.path().join("two.jar");
        write_jar(&jar, &["a/b/Two.class"]);

        let scan = PackageScan::new(vec![classes, jar, dir.path().join("missing.jar")], "a.b").unwrap();
        let first: Vec<String> = scan.iter().collect();
        assert_eq!(first, vec!["a.b.One".to_string(), "a.b.Two".to_string()]);
        let second: Vec<String> = (&scan).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_package() {
        assert!(matches!(PackageScan::new(Vec::new(), ""), Err(BridgeError::InvalidNamespace(_))));
        assert!(PackageScan::new(Vec::new(), "a..b").is_err());
    }
}

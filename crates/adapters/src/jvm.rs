// SPDX-License-Identifier: MIT

//! Java runtime discovery for launching the annotator backend services.

use std::path::{Path, PathBuf};
use std::process::Command;

const COMMON_JAVA_PATHS: &[&str] = &[
    "/usr/bin/java",
    "/usr/local/bin/java",
    "/opt/java/bin/java",
    "/usr/lib/jvm/default/bin/java",
    "/usr/lib/jvm/java-11-openjdk-amd64/bin/java",
    "/usr/lib/jvm/java-8-openjdk-amd64/bin/java",
];

/// Locate a usable `java` executable: an explicit override, then
/// `JAVA_HOME`, then a handful of common install locations, then `$PATH`.
pub fn find_java(configured_java_home: Option<&Path>) -> Option<PathBuf> {
    if let Some(home) = configured_java_home.map(PathBuf::from).or_else(java_home_env) {
        let candidate = home.join("bin").join("java");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    for candidate in COMMON_JAVA_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    which_java()
}

fn java_home_env() -> Option<PathBuf> {
    std::env::var_os("JAVA_HOME").map(PathBuf::from)
}

fn which_java() -> Option<PathBuf> {
    let output = Command::new("which").arg("java").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn prefers_configured_java_home_when_binary_exists() {
        let dir = tempdir().expect("tempdir");
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).expect("mkdir");
        let java = bin_dir.join("java");
        std::fs::write(&java, "#!/bin/sh\n").expect("write");
        let found = find_java(Some(dir.path()));
        assert_eq!(found, Some(java));
    }

    #[test]
    fn falls_through_when_configured_home_has_no_binary() {
        let dir = tempdir().expect("tempdir");
        // No bin/java under this empty directory, so resolution must fall
        // through to the common-paths/PATH search rather than returning a
        // nonexistent candidate.
        let found = find_java(Some(dir.path()));
        assert_ne!(found, Some(dir.path().join("bin").join("java")));
    }
}

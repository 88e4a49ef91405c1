// SPDX-License-Identifier: MIT

//! Rewrites install-path variables inside the annotator's shipped control
//! scripts so they point at wherever this machine actually installed it,
//! rather than the path baked in at package build time.

use crate::error::AdapterError;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn basedir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^BASEDIR=.*$").expect("constant regex pattern is valid"))
}

#[allow(clippy::expect_used)]
fn java_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^JAVA=.*$").expect("constant regex pattern is valid"))
}

/// Patch `BASEDIR=` and `JAVA=` assignments in a control script's contents
/// to the resolved install root and Java binary, leaving everything else
/// untouched.
pub fn patch_script_contents(contents: &str, install_root: &Path, java_path: &Path) -> String {
    let patched = basedir_re().replace(contents, format!("BASEDIR={}", install_root.display()));
    java_re()
        .replace(&patched, format!("JAVA={}", java_path.display()))
        .into_owned()
}

/// Read `script_path`, patch it in place, and mark it executable.
pub fn patch_script_file(script_path: &Path, install_root: &Path, java_path: &Path) -> Result<(), AdapterError> {
    let contents = std::fs::read_to_string(script_path)?;
    let patched = patch_script_contents(&contents, install_root, java_path);
    std::fs::write(script_path, patched)?;
    make_executable(script_path)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), AdapterError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), AdapterError> {
    Ok(())
}

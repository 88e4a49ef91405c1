//! Shared fixtures for the black-box CLI specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};

pub fn annobatch() -> Command {
    // `annobatch` is a separate workspace package with no lib target, so
    // Cargo can't set `CARGO_BIN_EXE_annobatch` for this integration test
    // via a normal dependency edge; locate it relative to this test
    // binary's own path instead (both live under the same profile dir).
    let exe = std::env::current_exe().expect("current exe");
    let profile_dir = exe.parent().and_then(Path::parent).expect("profile dir");
    let bin_name = if cfg!(windows) { "annobatch.exe" } else { "annobatch" };
    Command::new(profile_dir.join(bin_name))
}

/// Write an executable fake driver script that, given `<input> <output>`,
/// copies the input's byte count into a sentinel-terminated CSV. Stands in
/// for the real annotator binary so tests don't depend on a JVM.
pub fn write_fake_driver(dir: &Path, behavior: DriverBehavior) -> PathBuf {
    let path = dir.join("fake_driver.sh");
    let body = match behavior {
        DriverBehavior::Succeed => {
            "#!/bin/sh\nprintf 'concept\\nfound_one\\nMETA_BATCH_END\\n' > \"$2\"\n".to_string()
        }
        DriverBehavior::Fail => "#!/bin/sh\nexit 1\n".to_string(),
        DriverBehavior::SleepSeconds(secs) => {
            format!("#!/bin/sh\nsleep {secs}\nprintf 'concept\\nfound_one\\nMETA_BATCH_END\\n' > \"$2\"\n")
        }
        DriverBehavior::MissingSentinel => "#!/bin/sh\nprintf 'concept\\nfound_one\\n' > \"$2\"\n".to_string(),
        DriverBehavior::FailOnceThenSucceed => {
            "#!/bin/sh\nmarker=\"$2.attempted\"\nif [ -f \"$marker\" ]; then\n  printf 'concept\\nfound_one\\nMETA_BATCH_END\\n' > \"$2\"\nelse\n  touch \"$marker\"\n  exit 1\nfi\n".to_string()
        }
    };
    std::fs::write(&path, body).expect("write driver");
    make_executable(&path);
    path
}

pub enum DriverBehavior {
    Succeed,
    Fail,
    SleepSeconds(u64),
    MissingSentinel,
    /// Fails the first time it's invoked for a given output path, then
    /// succeeds on every subsequent invocation — for exercising retry
    /// recovery.
    FailOnceThenSucceed,
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

pub fn write_input_file(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write input");
}

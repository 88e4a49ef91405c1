// SPDX-License-Identifier: MIT

//! One-shot annotator subprocess invocation with a hard wall-clock timeout.

use crate::error::AdapterError;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Default per-file timeout when the caller doesn't override it.
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace period between SIGTERM and SIGKILL when a subprocess overruns its
/// timeout, matching the supervisor's own terminate protocol.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Run a subprocess command with a timeout. On expiry the child is sent
/// SIGTERM, given [`KILL_GRACE`] to exit, then SIGKILL'd and reaped so no
/// orphaned annotator process survives a timed-out file.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, AdapterError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    let mut child = cmd.spawn()?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let mut stdout = Vec::new();
            if let Some(mut pipe) = child.stdout.take() {
                let _ = pipe.read_to_end(&mut stdout).await;
            }
            let mut stderr = Vec::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_end(&mut stderr).await;
            }
            Ok(Output { status, stdout, stderr })
        }
        Ok(Err(io_err)) => Err(AdapterError::ProcessFailed {
            description: description.to_string(),
            message: io_err.to_string(),
        }),
        Err(_elapsed) => {
            if let Some(pid) = child.id() {
                let _ = crate::process_control::terminate(pid, KILL_GRACE).await;
            }
            let _ = child.wait().await;
            Err(AdapterError::Timeout {
                description: description.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

/// Invoke the annotator driver script on a single input file, writing its
/// output to `output_path`. The caller supplies the interpreter/script pair
/// (e.g. a configured `scripts_dir`/wrapper) so this stays test-friendly.
pub async fn annotate_file(
    driver: &Path,
    input_path: &Path,
    output_path: &Path,
    timeout: Duration,
) -> Result<Output, AdapterError> {
    let mut cmd = Command::new(driver);
    cmd.arg(input_path).arg(output_path);
    run_with_timeout(cmd, timeout, &format!("annotate {}", input_path.display())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_elapses_for_slow_command() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await;
        assert!(matches!(result, Err(AdapterError::Timeout { .. })));
    }

    #[tokio::test]
    async fn missing_binary_surfaces_as_process_failed() {
        let cmd = Command::new("/nonexistent/binary-that-does-not-exist");
        let result = run_with_timeout(cmd, Duration::from_secs(1), "missing").await;
        assert!(matches!(result, Err(AdapterError::ProcessFailed { .. })));
    }
}

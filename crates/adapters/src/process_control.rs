// SPDX-License-Identifier: MIT

//! Process termination: SIGTERM first, then SIGKILL if the process is
//! still alive after a grace period. Mirrors the original port guard's
//! terminate-then-kill behavior.

use crate::error::AdapterError;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;

/// Send SIGTERM to `pid`, wait up to `grace`, then SIGKILL if it's still
/// running. Succeeds if the process is already gone at any point.
pub async fn terminate(pid: u32, grace: Duration) -> Result<(), AdapterError> {
    let target = Pid::from_raw(pid as i32);

    match signal::kill(target, Signal::SIGTERM) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => return Ok(()),
        Err(e) => {
            return Err(AdapterError::ProcessFailed {
                description: format!("SIGTERM pid {pid}"),
                message: e.to_string(),
            })
        }
    }

    tokio::time::sleep(grace).await;

    if !is_alive(pid) {
        return Ok(());
    }

    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(AdapterError::ProcessFailed {
            description: format!("SIGKILL pid {pid}"),
            message: e.to_string(),
        }),
    }
}

pub fn is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

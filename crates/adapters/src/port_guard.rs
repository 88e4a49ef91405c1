// SPDX-License-Identifier: MIT

//! Port availability checks and eviction of stale processes squatting on
//! the annotator service ports.
//!
//! Grounded on the original port guard's approach: check whether a TCP port
//! is bindable, identify whichever process owns it when it isn't, decide
//! whether that process looks like an abandoned annotator instance, and if
//! so terminate it before retrying.

use crate::error::AdapterError;
use annobatch_core::ServiceName;
use std::net::TcpListener;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, System};
use tracing::{info, warn};

/// A process found bound to a port we need.
#[derive(Debug, Clone)]
pub struct BlockingProcess {
    pub pid: u32,
    pub name: String,
    pub started_at_ms: u64,
}

/// A process counts as stale (safe to evict without asking) once it has
/// been running this long with no sign of productive use.
const STALE_AGE: Duration = Duration::from_secs(86_400);

pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Look up the process currently bound to `port`, if any, using the kernel's
/// TCP socket table cross-referenced against the running process list.
pub fn find_blocking_process(system: &System, port: u16) -> Option<BlockingProcess> {
    let pid = pid_for_port(port)?;
    let process = system.process(Pid::from_u32(pid))?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let started_at_ms = process.start_time().saturating_mul(1000);
    let _ = now_ms;
    Some(BlockingProcess {
        pid,
        name: process.name().to_string_lossy().into_owned(),
        started_at_ms,
    })
}

/// Whether `process` looks like an abandoned annotator instance: its
/// process name matches one of `service`'s known indicators, or it has been
/// running long enough that it's almost certainly orphaned.
pub fn is_stale(process: &BlockingProcess, service: ServiceName, now_ms: u64) -> bool {
    let name_lower = process.name.to_lowercase();
    let matches_indicator = service
        .indicator_names()
        .iter()
        .any(|indicator| name_lower.contains(indicator));
    let age_ms = now_ms.saturating_sub(process.started_at_ms);
    matches_indicator || age_ms >= STALE_AGE.as_millis() as u64
}

/// Poll `port` until it becomes available or `timeout` elapses, evicting a
/// stale blocking process if one is found along the way.
pub async fn ensure_port_available(
    service: ServiceName,
    timeout: Duration,
    now_ms: impl Fn() -> u64,
) -> Result<(), AdapterError> {
    let port = service.default_port();
    let deadline = tokio::time::Instant::now() + timeout;
    let mut system = System::new_all();

    loop {
        if is_port_available(port) {
            return Ok(());
        }

        system.refresh_all();
        if let Some(blocker) = find_blocking_process(&system, port) {
            if is_stale(&blocker, service, now_ms()) {
                warn!(port, pid = blocker.pid, name = %blocker.name, "evicting stale process on service port");
                crate::process_control::terminate(blocker.pid, Duration::from_secs(2)).await?;
            } else {
                info!(port, pid = blocker.pid, name = %blocker.name, "port occupied by a live, non-stale process");
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return match find_blocking_process(&system, port) {
                Some(blocker) => Err(AdapterError::PortStillBlocked {
                    port,
                    pid: blocker.pid,
                    process_name: blocker.name,
                }),
                None => Err(AdapterError::Timeout {
                    description: format!("waiting for port {port} to free up"),
                    timeout_secs: timeout.as_secs(),
                }),
            };
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(target_os = "linux")]
fn pid_for_port(port: u16) -> Option<u32> {
    let inode = tcp_table_inode_for_port(port)?;
    inode_owner_pid(inode)
}

#[cfg(not(target_os = "linux"))]
fn pid_for_port(_port: u16) -> Option<u32> {
    None
}

#[cfg(target_os = "linux")]
fn tcp_table_inode_for_port(port: u16) -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/net/tcp").ok()?;
    let target_hex = format!("{port:04X}");
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let local_addr = fields.first()?;
        let Some((_, port_hex)) = local_addr.split_once(':') else {
            continue;
        };
        if port_hex.eq_ignore_ascii_case(&target_hex) {
            let inode: u64 = fields.get(9)?.parse().ok()?;
            if inode != 0 {
                return Some(inode);
            }
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn inode_owner_pid(target_inode: u64) -> Option<u32> {
    let target = format!("socket:[{target_inode}]");
    for entry in std::fs::read_dir("/proc").ok()? {
        let entry = entry.ok()?;
        let pid: u32 = entry.file_name().to_string_lossy().parse().ok()?;
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };
        for fd in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd.path()) {
                if link.to_string_lossy() == target {
                    return Some(pid);
                }
            }
        }
    }
    None
}

// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{description} timed out after {timeout_secs}s")]
    Timeout { description: String, timeout_secs: u64 },

    #[error("{description} failed: {message}")]
    ProcessFailed { description: String, message: String },

    #[error("port {port} still occupied by pid {pid} ({process_name}) after eviction attempt")]
    PortStillBlocked { port: u16, pid: u32, process_name: String },

    #[error("JAVA_HOME could not be resolved: {0}")]
    JavaHomeNotFound(String),
}

// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize/deserialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to acquire exclusive lock on {path} within {timeout_ms}ms")]
    LockTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("no record for file {0}")]
    UnknownFile(String),
}
